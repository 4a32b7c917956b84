use axum::Json;
use serde_json::{json, Value};

pub const SERVICE_ID: &str = "basexservice";

/// GET /health: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_ID,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /v1/api/docs: machine-readable service description.
pub async fn docs() -> Json<Value> {
    Json(json!({
        "id": SERVICE_ID,
        "name": "BaseX XML Database Service",
        "description": "XML database with XQuery and XSLT support behind Schema.org actions",
        "version": "v1",
        "capabilities": ["xml-database", "xquery", "xslt", "xml-storage"],
        "endpoints": [
            endpoint("POST", "/v1/api/semantic/action", "Execute a Schema.org action (SearchAction, TransformAction, CreateAction, DeleteAction, UploadAction)"),
            endpoint("POST", "/v1/api/queries", "Run an XQuery against a database"),
            endpoint("POST", "/v1/api/transforms", "Stage an XSLT stylesheet in a database"),
            endpoint("POST", "/v1/api/databases", "Create a database"),
            endpoint("DELETE", "/v1/api/databases/{name}", "Delete a database"),
            endpoint("GET", "/health", "Health check"),
        ],
    }))
}

fn endpoint(method: &str, path: &str, description: &str) -> Value {
    json!({ "method": method, "path": path, "description": description })
}
