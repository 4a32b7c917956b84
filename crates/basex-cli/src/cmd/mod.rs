pub mod route;
pub mod serve;
