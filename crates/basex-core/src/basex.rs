//! Client for the BaseX REST interface (`{base}/rest/...`).
//!
//! Every call is a single blocking request with basic authentication. No
//! retries, no timeout beyond the transport default. A status of 400 or above
//! and a transport failure both come back as [`GatewayError::Downstream`].

use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::credentials::DatabaseCredentials;
use crate::error::{GatewayError, Result};

const XML: &str = "application/xml";

pub struct BaseXClient {
    http: Client,
    credentials: DatabaseCredentials,
}

impl BaseXClient {
    pub fn new(credentials: DatabaseCredentials) -> Result<Self> {
        let http = Client::builder().build().map_err(transport)?;
        Ok(Self { http, credentials })
    }

    /// `PUT {base}/rest/{name}` with an empty body.
    pub fn create_database(&self, name: &str) -> Result<()> {
        let url = self.url(name, None);
        tracing::debug!(%url, "creating database");
        self.send(self.http.put(&url)).map(drop)
    }

    /// `DELETE {base}/rest/{name}`.
    pub fn delete_database(&self, name: &str) -> Result<()> {
        let url = self.url(name, None);
        tracing::debug!(%url, "deleting database");
        self.send(self.http.delete(&url)).map(drop)
    }

    /// `DELETE {base}/rest/{db}/{resource}`.
    pub fn delete_resource(&self, db: &str, resource: &str) -> Result<()> {
        let url = self.url(db, Some(resource));
        tracing::debug!(%url, "deleting resource");
        self.send(self.http.delete(&url)).map(drop)
    }

    /// `PUT {base}/rest/{db}/{resource}` with `body` sent as-is.
    pub fn put_resource(&self, db: &str, resource: &str, body: Vec<u8>) -> Result<()> {
        let url = self.url(db, Some(resource));
        tracing::debug!(%url, bytes = body.len(), "storing resource");
        self.send(self.http.put(&url).header(CONTENT_TYPE, XML).body(body))
            .map(drop)
    }

    /// Read `local` and store it as `{db}/{resource}`.
    ///
    /// A file holding a JSON document with a string `result` (the saved
    /// response of an earlier action) is unwrapped: only that string is
    /// uploaded.
    pub fn upload_resource(&self, db: &str, local: &Path, resource: &str) -> Result<()> {
        let content = std::fs::read(local).map_err(|e| {
            GatewayError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot read {}: {e}", local.display()),
            ))
        })?;
        self.put_resource(db, resource, unwrap_embedded_result(content))
    }

    /// Run `query` with `db` as the context database and return the raw
    /// response body.
    pub fn execute_query(&self, db: &str, query: &str) -> Result<String> {
        let url = self.url(db, None);
        tracing::debug!(%url, "executing query");
        self.send(
            self.http
                .post(&url)
                .header(CONTENT_TYPE, XML)
                .body(query_envelope(query)),
        )
    }

    fn url(&self, db: &str, resource: Option<&str>) -> String {
        let db = db.trim_matches('/');
        match resource {
            Some(resource) => format!(
                "{}/rest/{db}/{}",
                self.credentials.base_url,
                resource.trim_start_matches('/')
            ),
            None => format!("{}/rest/{db}", self.credentials.base_url),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().map_err(transport)?;
        if status.as_u16() >= 400 {
            return Err(GatewayError::Downstream {
                status: Some(status.as_u16()),
                message: body,
            });
        }
        Ok(body)
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    GatewayError::Downstream {
        status: None,
        message: err.to_string(),
    }
}

/// Wrap query text in the BaseX REST query document.
pub fn query_envelope(query: &str) -> String {
    // `]]>` would close the CDATA section early; split it across two sections.
    let text = query.replace("]]>", "]]]]><![CDATA[>");
    format!(r#"<query xmlns="http://basex.org/rest"><text><![CDATA[{text}]]></text></query>"#)
}

/// If `content` is JSON with a string `result`, return that string's bytes.
pub fn unwrap_embedded_result(content: Vec<u8>) -> Vec<u8> {
    match serde_json::from_slice::<Value>(&content) {
        Ok(Value::Object(mut map)) => match map.remove("result") {
            Some(Value::String(result)) => {
                tracing::debug!(
                    from = content.len(),
                    to = result.len(),
                    "unwrapped embedded result"
                );
                result.into_bytes()
            }
            _ => content,
        },
        _ => content,
    }
}
