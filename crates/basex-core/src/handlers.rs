//! The five handler routines behind the dispatcher.
//!
//! Each one reads the sub-documents it needs, resolves the database
//! credentials, then makes its BaseX call(s). Any failure ends the routine; it
//! is recorded on the action as `FailedActionStatus` together with the phase
//! that failed, and the action is still returned to the caller.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::action::{Node, SemanticAction, DATABASE_KINDS};
use crate::basex::BaseXClient;
use crate::config::GatewayConfig;
use crate::credentials;
use crate::dispatch::{self, Handler};
use crate::error::{GatewayError, Result};
use crate::object_store::{BucketOverrides, ObjectLocation, ObjectStore, StagedObject};

/// What a handler needs besides the action itself.
pub struct ActionContext<'a> {
    pub config: &'a GatewayConfig,
    pub object_store: &'a dyn ObjectStore,
}

/// Route `action` and run its handler.
///
/// Returns `Err` only when the action cannot be routed. Handler failures are
/// reported on the returned action.
pub fn execute(mut action: SemanticAction, ctx: &ActionContext<'_>) -> Result<SemanticAction> {
    let handler = dispatch::route(&action)?;
    tracing::debug!(action_type = %action.type_name, %handler, "dispatching action");

    let outcome = match handler {
        Handler::Transform => transform(&action),
        Handler::Query => query(&action),
        Handler::Upload => upload(&action, ctx),
        Handler::CreateDatabase => create_database(&action),
        Handler::DeleteDocument => delete_document(&action),
        Handler::DeleteDatabase => delete_database(&action),
    };

    match outcome {
        Ok(result) => {
            action.complete(result);
            tracing::info!(
                action_type = %action.type_name,
                identifier = action.identifier.as_deref().unwrap_or(""),
                %handler,
                "action completed"
            );
        }
        Err(Failure { phase, cause }) => {
            tracing::warn!(
                action_type = %action.type_name,
                identifier = action.identifier.as_deref().unwrap_or(""),
                %handler,
                error = %cause,
                "{phase}"
            );
            action.fail(phase, &cause);
        }
    }
    Ok(action)
}

// ---------------------------------------------------------------------------
// Failure bookkeeping
// ---------------------------------------------------------------------------

struct Failure {
    phase: &'static str,
    cause: GatewayError,
}

type Outcome = std::result::Result<Option<Value>, Failure>;

trait Phase<T> {
    fn phase(self, phase: &'static str) -> std::result::Result<T, Failure>;
}

impl<T> Phase<T> for Result<T> {
    fn phase(self, phase: &'static str) -> std::result::Result<T, Failure> {
        self.map_err(|cause| Failure { phase, cause })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn transform(action: &SemanticAction) -> Outcome {
    let instrument = required_node(action, "instrument").phase("Failed to extract XSLT stylesheet")?;
    let (target, field) =
        find_database(action, &["target", "object"]).phase("Failed to extract XML database")?;
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to extract XML database")?;
    let stylesheet = Stylesheet::resolve(instrument).phase("XSLT stylesheet path required")?;

    let (resource, body) = stylesheet.load().phase("Failed to read XSLT")?;
    let client = BaseXClient::new(creds).phase("Failed to upload XSLT")?;
    client
        .put_resource(db, &resource, body)
        .phase("Failed to upload XSLT")?;

    // Staging only; the transformation itself is not triggered here.
    Ok(None)
}

fn query(action: &SemanticAction) -> Outcome {
    let text = query_text(action).phase("Query is required")?;
    let (target, field) =
        find_database(action, &["target", "object"]).phase("Failed to extract database")?;
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to extract database")?;

    let client = BaseXClient::new(creds).phase("Failed to execute query")?;
    let output = client.execute_query(db, text).phase("Failed to execute query")?;

    Ok(Some(json!({
        "@type": "Dataset",
        "format": "application/xml",
        "output": output,
    })))
}

fn upload(action: &SemanticAction, ctx: &ActionContext<'_>) -> Outcome {
    let document = required_node(action, "object").phase("Failed to extract XML document")?;
    let (target, field) =
        find_database(action, &["target", "result"]).phase("Failed to extract database")?;
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to extract database")?;

    let location = document
        .str("contentUrl")
        .ok_or_else(|| GatewayError::MissingField("object.contentUrl".into()))
        .phase("Document contentUrl is required")?;
    let resource = action
        .text("targetUrl")
        .or_else(|| document.str("identifier"))
        .ok_or_else(|| GatewayError::MissingField("targetUrl".into()))
        .phase("Target path is required")?;

    // Held until the end of this function; dropping it removes the local copy
    // whichever way the upload goes.
    let staged = if ObjectLocation::is_remote(location) {
        let remote = ObjectLocation::parse(location).phase("Failed to download from S3")?;
        let staged = StagedObject::fetch(
            ctx.object_store,
            &remote,
            document.str("encodingFormat"),
            &BucketOverrides::from_node(document),
            ctx.config.staging_dir.as_deref(),
        )
        .phase("Failed to download from S3")?;
        Some(staged)
    } else {
        None
    };
    let local = staged
        .as_ref()
        .map(|s| s.path().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(location));

    let client = BaseXClient::new(creds).phase("Failed to upload file")?;
    client
        .upload_resource(db, &local, resource)
        .phase("Failed to upload file")?;
    Ok(None)
}

fn create_database(action: &SemanticAction) -> Outcome {
    let (target, field) =
        find_database(action, &["result", "target"]).phase("Database result is required")?;
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to parse database")?;

    let client = BaseXClient::new(creds).phase("Failed to create database")?;
    client.create_database(db).phase("Failed to create database")?;
    Ok(None)
}

fn delete_document(action: &SemanticAction) -> Outcome {
    let document = required_node(action, "object").phase("Failed to extract XML document")?;
    let (target, field) =
        find_database(action, &["target", "result"]).phase("Failed to extract database")?;
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to extract database")?;

    let path = document
        .str("identifier")
        .or_else(|| document.str("contentUrl"))
        .ok_or_else(|| GatewayError::MissingField("object.identifier".into()))
        .phase("Document identifier or contentUrl is required")?;

    let client = BaseXClient::new(creds).phase("Failed to delete document")?;
    client
        .delete_resource(db, path)
        .phase("Failed to delete document")?;
    Ok(None)
}

fn delete_database(action: &SemanticAction) -> Outcome {
    // A database-typed `object` wins, but only when it names the database.
    let named_object = action
        .node("object")
        .phase("Database object or result is required")?
        .filter(|o| o.is_kind(DATABASE_KINDS) && o.str("identifier").is_some());
    let (target, field) = match named_object {
        Some(object) => (object, "object"),
        None => find_database(action, &["result", "target"])
            .phase("Database object or result is required")?,
    };
    let creds = credentials::extract(Some(target), field)
        .phase("Failed to extract database credentials")?;
    let db = credentials::database_name(Some(target), field).phase("Failed to parse database")?;

    let client = BaseXClient::new(creds).phase("Failed to delete database")?;
    client.delete_database(db).phase("Failed to delete database")?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

fn required_node<'a>(action: &'a SemanticAction, name: &str) -> Result<Node<'a>> {
    action
        .node(name)?
        .ok_or_else(|| GatewayError::MissingField(name.to_string()))
}

/// The first of `fields` that is present. `object` only counts when its
/// `@type` is a database kind, since it usually names a document.
fn find_database<'a>(
    action: &'a SemanticAction,
    fields: &[&'static str],
) -> Result<(Node<'a>, &'static str)> {
    for &field in fields {
        let Some(node) = action.node(field)? else {
            continue;
        };
        if field == "object" && !node.is_kind(DATABASE_KINDS) {
            continue;
        }
        return Ok((node, field));
    }
    let first = fields.first().copied().unwrap_or("target");
    Err(GatewayError::MissingTarget(first.to_string()))
}

/// `query` as text, or as an object carrying `query` or `text`.
fn query_text(action: &SemanticAction) -> Result<&str> {
    let text = match action.properties.get("query") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Object(map)) => {
            let node = Node::new(map);
            node.str("query").or_else(|| node.str("text"))
        }
        _ => None,
    };
    text.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::MissingField("query".into()))
}

enum Stylesheet<'a> {
    File(&'a str),
    Inline { name: String, text: &'a str },
}

impl<'a> Stylesheet<'a> {
    /// `contentUrl`, then `codeRepository`, then inline `text`.
    fn resolve(instrument: Node<'a>) -> Result<Self> {
        if let Some(path) = instrument
            .str("contentUrl")
            .or_else(|| instrument.str("codeRepository"))
        {
            return Ok(Stylesheet::File(path));
        }
        if let Some(text) = instrument.str("text") {
            let name = match instrument.str("identifier") {
                Some(id) if id.ends_with(".xsl") || id.ends_with(".xslt") => id.to_string(),
                Some(id) => format!("{id}.xsl"),
                None => "stylesheet.xsl".to_string(),
            };
            return Ok(Stylesheet::Inline { name, text });
        }
        Err(GatewayError::MissingField("instrument.contentUrl".into()))
    }

    /// Resource name and bytes to stage.
    fn load(self) -> Result<(String, Vec<u8>)> {
        match self {
            Stylesheet::File(path) => {
                let name = Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        GatewayError::invalid_field("instrument.contentUrl", "no file name")
                    })?;
                let body = std::fs::read(path).map_err(|e| {
                    GatewayError::Io(std::io::Error::new(
                        e.kind(),
                        format!("cannot read {path}: {e}"),
                    ))
                })?;
                Ok((name, body))
            }
            Stylesheet::Inline { name, text } => Ok((name, text.as_bytes().to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionStatus;
    use crate::object_store::FetchRequest;
    use mockito::Matcher;
    use std::sync::Mutex;

    struct FakeStore {
        fetched: Mutex<Vec<(String, PathBuf)>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                fetched: Mutex::new(Vec::new()),
            }
        }
    }

    impl ObjectStore for FakeStore {
        fn fetch(&self, request: &FetchRequest<'_>) -> Result<()> {
            self.fetched.lock().unwrap().push((
                request.location.key.clone(),
                request.destination.to_path_buf(),
            ));
            std::fs::write(request.destination, "<from-bucket/>")?;
            Ok(())
        }
    }

    fn run(value: Value, store: &dyn ObjectStore, config: &GatewayConfig) -> Value {
        let action = SemanticAction::from_value(value).unwrap();
        let ctx = ActionContext {
            config,
            object_store: store,
        };
        execute(action, &ctx).unwrap().to_value()
    }

    fn run_default(value: Value) -> Value {
        run(value, &FakeStore::new(), &GatewayConfig::default())
    }

    fn target(server: &mockito::Server, db: &str) -> Value {
        json!({
            "@type": "DataCatalog",
            "identifier": db,
            "url": server.url(),
            "additionalProperty": {"username": "admin", "password": "s3cr3t"}
        })
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let action = SemanticAction::from_value(json!({"@type": "InvalidAction"})).unwrap();
        let config = GatewayConfig::default();
        let store = FakeStore::new();
        let ctx = ActionContext {
            config: &config,
            object_store: &store,
        };
        let err = execute(action, &ctx).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedActionType(_)));
    }

    #[test]
    fn search_without_target_fails_naming_target() {
        let out = run_default(json!({
            "@type": "SearchAction",
            "identifier": "q-1",
            "query": "1 + 1"
        }));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["identifier"], "q-1");
        let description = out["error"]["description"].as_str().unwrap();
        assert!(description.contains("missing database target: target"));
    }

    #[test]
    fn search_without_query_fails() {
        let out = run_default(json!({"@type": "SearchAction", "query": "  "}));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["error"]["name"], "Query is required");
    }

    #[test]
    fn search_attaches_raw_result() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/rest/docs")
            .match_body(Matcher::Regex("CDATA\\[count\\(//item\\)\\]".into()))
            .with_status(200)
            .with_body("3")
            .create();

        let out = run_default(json!({
            "@type": "SearchAction",
            "query": {"@type": "SearchQuery", "text": "count(//item)"},
            "target": target(&server, "docs")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
        assert_eq!(out["result"]["@type"], "Dataset");
        assert_eq!(out["result"]["output"], "3");
    }

    #[test]
    fn search_uses_database_object() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/rest/docs").with_status(200).create();

        let mut database = target(&server, "docs");
        database["@type"] = json!("Database");
        let out = run_default(json!({
            "@type": "SearchAction",
            "query": "/",
            "object": database
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn create_database_twice_surfaces_second_failure() {
        let mut server = mockito::Server::new();
        let action = json!({
            "@type": "CreateAction",
            "identifier": "create-docs",
            "result": target(&server, "docs")
        });

        let created = server.mock("PUT", "/rest/docs").with_status(201).create();
        let first = run_default(action.clone());
        created.assert();
        created.remove();

        server
            .mock("PUT", "/rest/docs")
            .with_status(400)
            .with_body("Database 'docs' already exists.")
            .create();
        let second = run_default(action);

        assert_eq!(first["actionStatus"], "CompletedActionStatus");
        assert_eq!(second["actionStatus"], "FailedActionStatus");
        let description = second["error"]["description"].as_str().unwrap();
        assert!(description.starts_with("Failed to create database"));
        assert!(description.contains("Database 'docs' already exists."));
    }

    #[test]
    fn create_database_without_result_fails() {
        let out = run_default(json!({"@type": "CreateAction"}));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["error"]["name"], "Database result is required");
    }

    #[test]
    fn unreachable_database_is_failed_action() {
        let out = run_default(json!({
            "@type": "CreateAction",
            "result": {"identifier": "docs", "url": "http://127.0.0.1:1"}
        }));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert!(out["error"]["description"]
            .as_str()
            .unwrap()
            .contains("BaseX request failed"));
    }

    #[test]
    fn upload_local_file_to_target_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("doc.xml");
        std::fs::write(&file, "<doc/>").unwrap();

        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/docs/incoming/doc.xml")
            .match_body(Matcher::Exact("<doc/>".into()))
            .with_status(201)
            .create();

        let out = run_default(json!({
            "@type": "UploadAction",
            "object": {"@type": "Dataset", "identifier": "doc", "contentUrl": file},
            "target": target(&server, "docs"),
            "targetUrl": "incoming/doc.xml"
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn create_with_object_uploads_under_identifier() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("doc.xml");
        std::fs::write(&file, "<doc/>").unwrap();

        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/docs/doc-1")
            .with_status(201)
            .create();

        let out = run_default(json!({
            "@type": "CreateAction",
            "object": {"@type": "DigitalDocument", "identifier": "doc-1", "contentUrl": file},
            "target": target(&server, "docs")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn upload_from_bucket_stages_then_cleans_up() {
        let staging = tempfile::TempDir::new().unwrap();
        let config = GatewayConfig::default().with_staging_dir(staging.path());
        let store = FakeStore::new();

        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/docs/report.xsl")
            .match_body(Matcher::Exact("<from-bucket/>".into()))
            .with_status(201)
            .create();

        let out = run(
            json!({
                "@type": "UploadAction",
                "object": {
                    "@type": "MediaObject",
                    "contentUrl": "s3://bucket/key.xsl",
                    "encodingFormat": "text/xsl"
                },
                "target": target(&server, "docs"),
                "targetUrl": "report.xsl"
            }),
            &store,
            &config,
        );
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");

        let fetched = store.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].0, "key.xsl");
        assert!(!fetched[0].1.exists());
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_upload_from_bucket_still_cleans_up() {
        let staging = tempfile::TempDir::new().unwrap();
        let config = GatewayConfig::default().with_staging_dir(staging.path());
        let store = FakeStore::new();

        let mut server = mockito::Server::new();
        server
            .mock("PUT", "/rest/docs/key.xsl")
            .with_status(500)
            .with_body("disk full")
            .create();

        let out = run(
            json!({
                "@type": "UploadAction",
                "object": {"@type": "MediaObject", "identifier": "key.xsl", "contentUrl": "s3://bucket/key.xsl"},
                "target": target(&server, "docs")
            }),
            &store,
            &config,
        );
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["error"]["name"], "Failed to upload file");

        let fetched = store.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(!fetched[0].1.exists());
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn malformed_bucket_reference_fails_without_fetch() {
        let store = FakeStore::new();
        let out = run(
            json!({
                "@type": "UploadAction",
                "object": {"identifier": "x", "contentUrl": "s3://bucket"},
                "target": {"identifier": "docs", "url": "http://127.0.0.1:1"}
            }),
            &store,
            &GatewayConfig::default(),
        );
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["error"]["name"], "Failed to download from S3");
        assert!(store.fetched.lock().unwrap().is_empty());
    }

    #[test]
    fn transform_falls_back_to_code_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let xsl = dir.path().join("cluster.xsl");
        std::fs::write(&xsl, "<xsl:stylesheet/>").unwrap();

        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/docs/cluster.xsl")
            .match_body(Matcher::Exact("<xsl:stylesheet/>".into()))
            .with_status(201)
            .create();

        let out = run_default(json!({
            "@type": "UpdateAction",
            "instrument": {
                "@type": "SoftwareSourceCode",
                "contentUrl": "",
                "codeRepository": xsl
            },
            "target": target(&server, "docs")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
        assert!(out.get("result").is_none());
    }

    #[test]
    fn transform_stages_inline_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/rest/docs/summary.xsl")
            .match_body(Matcher::Exact("<xsl:stylesheet/>".into()))
            .with_status(201)
            .create();

        let out = run_default(json!({
            "@type": "TransformAction",
            "instrument": {"identifier": "summary", "text": "<xsl:stylesheet/>"},
            "target": target(&server, "docs")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn transform_without_location_fails() {
        let server = mockito::Server::new();
        let out = run_default(json!({
            "@type": "TransformAction",
            "instrument": {"@type": "SoftwareSourceCode"},
            "target": target(&server, "docs")
        }));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["error"]["name"], "XSLT stylesheet path required");
    }

    #[test]
    fn delete_document_uses_identifier() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/rest/docs/reports/a.xml")
            .with_status(200)
            .create();

        let out = run_default(json!({
            "@type": "DeleteAction",
            "object": {"@type": "DigitalDocument", "identifier": "reports/a.xml"},
            "target": target(&server, "docs")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn delete_database_from_object() {
        let mut server = mockito::Server::new();
        let mock = server.mock("DELETE", "/rest/old").with_status(200).create();

        let mut database = target(&server, "old");
        database["@type"] = json!("Database");
        let out = run_default(json!({"@type": "DeleteAction", "object": database}));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn delete_database_falls_back_to_result() {
        let mut server = mockito::Server::new();
        let mock = server.mock("DELETE", "/rest/old").with_status(200).create();

        let out = run_default(json!({
            "@type": "DeleteAction",
            "object": {"@type": "Database"},
            "result": target(&server, "old")
        }));
        mock.assert();
        assert_eq!(out["actionStatus"], "CompletedActionStatus");
    }

    #[test]
    fn delete_without_database_fails() {
        let out = run_default(json!({"@type": "DeleteAction", "identifier": "d-1"}));
        assert_eq!(out["actionStatus"], "FailedActionStatus");
        assert_eq!(out["identifier"], "d-1");
        assert_eq!(
            out["error"]["name"],
            "Database object or result is required"
        );
    }

    #[test]
    fn every_handled_action_has_exactly_one_status() {
        let cases = [
            json!({"@type": "UpdateAction"}),
            json!({"@type": "TransformAction"}),
            json!({"@type": "SearchAction"}),
            json!({"@type": "CreateAction"}),
            json!({"@type": "CreateAction", "object": {}}),
            json!({"@type": "DeleteAction"}),
            json!({"@type": "DeleteAction", "object": {"@type": "DigitalDocument"}}),
            json!({"@type": "UploadAction"}),
        ];
        for case in cases {
            let out = run_default(case.clone());
            let status = out["actionStatus"].as_str().unwrap();
            assert!(
                status == ActionStatus::Completed.as_str()
                    || status == ActionStatus::Failed.as_str(),
                "{case}"
            );
            if status == ActionStatus::Failed.as_str() {
                assert!(!out["error"]["description"].as_str().unwrap().is_empty());
            }
        }
    }
}
