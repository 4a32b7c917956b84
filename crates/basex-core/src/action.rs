//! The normalised form of an inbound Schema.org JSON-LD action.
//!
//! Parsing only checks the envelope (`@type` must be a string). Everything
//! else stays raw JSON in [`SemanticAction::properties`] until a handler asks
//! for a specific field through [`SemanticAction::node`] or
//! [`SemanticAction::text`], which is where shape errors surface.

use chrono::Utc;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// `@type` values that identify a database sub-document.
pub const DATABASE_KINDS: &[&str] = &["Database", "DataCatalog", "XMLDatabase"];

/// `@type` values that identify a document sub-document.
pub const DOCUMENT_KINDS: &[&str] = &[
    "DigitalDocument",
    "TextDigitalDocument",
    "MediaObject",
    "Dataset",
    "SoftwareSourceCode",
];

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub enum ActionStatus {
    #[serde(rename = "CompletedActionStatus")]
    Completed,
    #[serde(rename = "FailedActionStatus")]
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Completed => "CompletedActionStatus",
            ActionStatus::Failed => "FailedActionStatus",
        }
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// What a `CreateAction` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateKind {
    /// An `object` is present: store it as a document.
    Document,
    /// No `object`: create the database named by `result`.
    Database,
}

/// What a `DeleteAction` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    Document,
    Database,
}

/// The action's `@type`, refined by its embedded object where the type alone
/// is ambiguous. Resolved once while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Transform,
    Search,
    Create(CreateKind),
    Delete(DeleteKind),
    Upload,
}

impl ActionKind {
    /// Returns `None` for types this service does not handle.
    pub fn classify(type_name: &str, properties: &Map<String, Value>) -> Option<Self> {
        let object = properties.get("object").filter(|v| !v.is_null());
        match type_name {
            "UpdateAction" | "TransformAction" => Some(ActionKind::Transform),
            "SearchAction" => Some(ActionKind::Search),
            "CreateAction" => Some(match object {
                Some(_) => ActionKind::Create(CreateKind::Document),
                None => ActionKind::Create(CreateKind::Database),
            }),
            "DeleteAction" => {
                let is_document = object
                    .and_then(Value::as_object)
                    .is_some_and(|map| Node::new(map).is_kind(DOCUMENT_KINDS));
                Some(ActionKind::Delete(if is_document {
                    DeleteKind::Document
                } else {
                    DeleteKind::Database
                }))
            }
            "UploadAction" => Some(ActionKind::Upload),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Node: read-only view over a JSON-LD sub-document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Node<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// True when any of the node's `@type` values is in `kinds`.
    pub fn is_kind(&self, kinds: &[&str]) -> bool {
        match self.map.get("@type") {
            Some(Value::String(s)) => kinds.contains(&s.as_str()),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|t| kinds.contains(&t)),
            _ => false,
        }
    }

    /// A non-blank string field.
    pub fn str(&self, field: &str) -> Option<&'a str> {
        self.map
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// A non-blank string from `additionalProperty`, which is either a plain
    /// map or a list of `PropertyValue` entries (`{"name": .., "value": ..}`).
    pub fn additional(&self, key: &str) -> Option<&'a str> {
        let value = match self.map.get("additionalProperty")? {
            Value::Object(map) => map.get(key)?,
            Value::Array(entries) => entries
                .iter()
                .filter_map(Value::as_object)
                .find(|entry| entry.get("name").and_then(Value::as_str) == Some(key))?
                .get("value")?,
            _ => return None,
        };
        value.as_str().filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// SemanticAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticAction {
    /// The `@type` discriminator, verbatim.
    pub type_name: String,
    /// Echoed back unchanged so callers can correlate responses.
    pub identifier: Option<String>,
    /// Every other top-level field, as received.
    pub properties: Map<String, Value>,
    /// `None` when `type_name` is not a supported action type.
    pub kind: Option<ActionKind>,
    pub status: Option<ActionStatus>,
}

impl SemanticAction {
    /// Decode a request body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedAction(format!("body is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut properties) = value else {
            return Err(GatewayError::MalformedAction(
                "action must be a JSON object".into(),
            ));
        };

        let type_name = match properties.remove("@type") {
            Some(Value::String(t)) if !t.trim().is_empty() => t,
            Some(Value::String(_)) => {
                return Err(GatewayError::MalformedAction("@type is empty".into()))
            }
            Some(_) => {
                return Err(GatewayError::MalformedAction(
                    "@type must be a string".into(),
                ))
            }
            None => return Err(GatewayError::MalformedAction("missing @type".into())),
        };

        // Only a string identifier is lifted out; anything else is echoed as-is.
        let identifier = match properties.remove("identifier") {
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                properties.insert("identifier".into(), other);
                None
            }
            None => None,
        };

        // The response carries exactly one status, set by the handler.
        properties.remove("actionStatus");

        let kind = ActionKind::classify(&type_name, &properties);
        Ok(Self {
            type_name,
            identifier,
            properties,
            kind,
            status: None,
        })
    }

    /// The named property as a sub-document. `Ok(None)` when absent or null.
    pub fn node(&self, name: &str) -> Result<Option<Node<'_>>> {
        match self.properties.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Node::new(map))),
            Some(_) => Err(GatewayError::invalid_field(name, "expected a JSON object")),
        }
    }

    /// The named property as non-blank text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Mark the action completed, attaching `result` when there is one.
    pub fn complete(&mut self, result: Option<Value>) {
        if let Some(result) = result {
            self.properties.insert("result".into(), result);
        }
        self.properties
            .insert("endTime".into(), Value::String(Utc::now().to_rfc3339()));
        self.status = Some(ActionStatus::Completed);
    }

    /// Mark the action failed. `message` names the phase that failed.
    pub fn fail(&mut self, message: &str, cause: &GatewayError) {
        self.properties.insert(
            "error".into(),
            serde_json::json!({
                "@type": "Thing",
                "name": message,
                "description": format!("{message}: {cause}"),
            }),
        );
        self.status = Some(ActionStatus::Failed);
    }

    pub fn to_value(&self) -> Value {
        // Serialising a map of JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for SemanticAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@type", &self.type_name)?;
        if let Some(id) = &self.identifier {
            map.serialize_entry("identifier", id)?;
        }
        for (key, value) in &self.properties {
            map.serialize_entry(key, value)?;
        }
        if let Some(status) = &self.status {
            map.serialize_entry("actionStatus", status)?;
        }
        map.end()
    }
}
