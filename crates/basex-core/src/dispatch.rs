use std::fmt;

use crate::action::{ActionKind, CreateKind, DeleteKind, SemanticAction};
use crate::error::{GatewayError, Result};

/// The handler routine an action is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Transform,
    Query,
    Upload,
    CreateDatabase,
    DeleteDocument,
    DeleteDatabase,
}

impl Handler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handler::Transform => "transform",
            Handler::Query => "query",
            Handler::Upload => "upload",
            Handler::CreateDatabase => "create-database",
            Handler::DeleteDocument => "delete-document",
            Handler::DeleteDatabase => "delete-database",
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionKind> for Handler {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Transform => Handler::Transform,
            ActionKind::Search => Handler::Query,
            ActionKind::Create(CreateKind::Document) | ActionKind::Upload => Handler::Upload,
            ActionKind::Create(CreateKind::Database) => Handler::CreateDatabase,
            ActionKind::Delete(DeleteKind::Document) => Handler::DeleteDocument,
            ActionKind::Delete(DeleteKind::Database) => Handler::DeleteDatabase,
        }
    }
}

/// Pick the handler for a parsed action.
pub fn route(action: &SemanticAction) -> Result<Handler> {
    action
        .kind
        .map(Handler::from)
        .ok_or_else(|| GatewayError::UnsupportedActionType(action.type_name.clone()))
}
