//! Plain REST shapes that are rewritten into JSON-LD actions and run through
//! the same path as the semantic endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use basex_core::SemanticAction;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::routes::semantic::run_action;
use crate::state::AppState;

/// How to reach the BaseX server. Every field is optional; omitted ones are
/// left out of the generated database node.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(flatten)]
    pub connection: Connection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    #[serde(default)]
    pub xslt: Option<String>,
    #[serde(default)]
    pub xslt_path: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(flatten)]
    pub connection: Connection,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseRequest {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub connection: Connection,
}

/// POST /v1/api/queries: run an XQuery as a `SearchAction`.
pub async fn execute_query(
    State(app): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(AppError::rejected)?;
    if body.query.trim().is_empty() {
        return Err(AppError::bad_request("query is required"));
    }
    let action = json!({
        "@context": "https://schema.org",
        "@type": "SearchAction",
        "query": body.query,
        "object": database_node(body.database.as_deref(), &body.connection),
    });
    forward(&app, action).await
}

/// POST /v1/api/transforms: stage a stylesheet as a `TransformAction`.
pub async fn execute_transform(
    State(app): State<AppState>,
    body: Result<Json<TransformRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(AppError::rejected)?;
    let xslt = non_blank(&body.xslt);
    let xslt_path = non_blank(&body.xslt_path);
    if xslt.is_none() && xslt_path.is_none() {
        return Err(AppError::bad_request("xslt or xsltPath is required"));
    }

    let mut stylesheet = Map::new();
    stylesheet.insert("@type".into(), json!("XSLTStylesheet"));
    if let Some(text) = xslt {
        stylesheet.insert("text".into(), json!(text));
    }
    if let Some(path) = xslt_path {
        stylesheet.insert("contentUrl".into(), json!(path));
    }

    let action = json!({
        "@context": "https://schema.org",
        "@type": "TransformAction",
        "instrument": stylesheet,
        "object": database_node(body.database.as_deref(), &body.connection),
    });
    forward(&app, action).await
}

/// POST /v1/api/databases: create a database via `CreateAction.result`.
pub async fn create_database(
    State(app): State<AppState>,
    body: Result<Json<DatabaseRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(AppError::rejected)?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    let action = json!({
        "@context": "https://schema.org",
        "@type": "CreateAction",
        "result": database_node(Some(name), &body.connection),
    });
    forward(&app, action).await
}

/// DELETE /v1/api/databases/{name}: drop a database via `DeleteAction`.
///
/// Connection details come from the query string.
pub async fn delete_database(
    State(app): State<AppState>,
    Path(name): Path<String>,
    Query(connection): Query<Connection>,
) -> Result<Json<Value>, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("database name is required"));
    }
    let action = json!({
        "@context": "https://schema.org",
        "@type": "DeleteAction",
        "object": database_node(Some(name), &connection),
    });
    forward(&app, action).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn forward(app: &AppState, action: Value) -> Result<Json<Value>, AppError> {
    let action = SemanticAction::from_value(action)?;
    Ok(Json(run_action(app, action).await?))
}

fn database_node(name: Option<&str>, connection: &Connection) -> Value {
    let mut node = Map::new();
    node.insert("@type".into(), json!("Database"));
    let fields = [
        ("identifier", name.filter(|s| !s.trim().is_empty())),
        ("url", non_blank(&connection.base_url)),
        ("username", non_blank(&connection.username)),
        ("password", non_blank(&connection.password)),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            node.insert(key.into(), json!(value));
        }
    }
    Value::Object(node)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
