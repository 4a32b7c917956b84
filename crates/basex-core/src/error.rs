use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed action: {0}")]
    MalformedAction(String),

    #[error("unsupported action type: {0}")]
    UnsupportedActionType(String),

    #[error("missing database target: {0}")]
    MissingTarget(String),

    #[error("missing database credentials: {0}")]
    MissingCredentials(String),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// The BaseX REST API rejected the request, or could not be reached.
    /// Transport failures carry no status.
    #[error("{}", downstream_message(*status, message))]
    Downstream {
        status: Option<u16>,
        message: String,
    },

    #[error("object store: {0}")]
    ObjectStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Errors raised before a handler runs. These are reported as HTTP 400
    /// rather than as a failed action.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            GatewayError::MalformedAction(_) | GatewayError::UnsupportedActionType(_)
        )
    }

    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn downstream_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("BaseX returned status {code}: {message}"),
        None => format!("BaseX request failed: {message}"),
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_error_keeps_status_and_body() {
        let err = GatewayError::Downstream {
            status: Some(400),
            message: "Database 'docs' already exists.".into(),
        };
        assert_eq!(
            err.to_string(),
            "BaseX returned status 400: Database 'docs' already exists."
        );
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = GatewayError::Downstream {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "BaseX request failed: connection refused");
    }

    #[test]
    fn request_errors_are_classified() {
        assert!(GatewayError::MalformedAction("x".into()).is_request_error());
        assert!(GatewayError::UnsupportedActionType("InvalidAction".into()).is_request_error());
        assert!(!GatewayError::MissingTarget("target".into()).is_request_error());
        assert!(!GatewayError::MissingField("query".into()).is_request_error());
    }
}
