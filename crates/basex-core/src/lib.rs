//! Core of basexservice: the Schema.org action model, routing of actions to
//! handlers, and the BaseX REST and object-store clients the handlers use.
//!
//! Everything here is synchronous. The HTTP layer runs [`handlers::execute`]
//! on a blocking thread.

pub mod action;
pub mod basex;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod object_store;

pub use action::{ActionStatus, SemanticAction};
pub use config::{GatewayConfig, ObjectStoreConfig};
pub use error::{GatewayError, Result};
pub use handlers::{execute, ActionContext};
pub use object_store::{GatewayObjectStore, ObjectStore};
