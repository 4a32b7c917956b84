pub mod health;
pub mod rest;
pub mod semantic;
