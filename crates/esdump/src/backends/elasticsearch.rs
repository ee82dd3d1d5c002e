//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on esdump...*
//!
//! 🎬 COLD OPEN: INT. SERVER ROOM, 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. One engineer, alone,
//! stares at an index whose mapping was wrong since 2019. "I'll just migrate it,"
//! they whispered. "It'll be fast," they said. "Elasticsearch scales
//! horizontally," someone lied, once, at a conference.
//!
//! 🚀 This module is the HTTP half of the migration: one shared client wrapper
//! ([`EsClient`]) plus the [`ElasticsearchSource`] and [`ElasticsearchSink`]
//! built on top of it.
//!
//! ## Knowledge Graph 🧠
//! - Auth: basic auth from the endpoint URL's userinfo, if any. That's the whole menu.
//! - Typed vs typeless: searches, bulk actions and mapping puts carry the type when
//!   the endpoint spelled one out, or when the cluster still has mapping types
//!   (anything before 7.x, asked once via `GET /`). Otherwise the typeless API is used.
//! - Every non-2xx answer becomes `DumpError::Status` with the body attached.
//!   Every network failure becomes `DumpError::Transport`. No retries.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

mod elasticsearch_sink;
mod elasticsearch_source;

pub use elasticsearch_sink::ElasticsearchSink;
pub use elasticsearch_source::{ElasticsearchScroll, ElasticsearchSource};

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{DumpError, Result};
use crate::planner::Window;
use crate::planner::dates::format_bound;

/// 🔒 Characters that must not appear raw inside one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 📡 A `reqwest::Client` that knows which cluster, which index, and which password.
///
/// Cheap to clone: the inner client is reference counted, so the source can hand a
/// copy to every scroll cursor it opens. Clones share the cluster's typed-ness answer.
#[derive(Debug, Clone)]
pub(crate) struct EsClient {
    client: reqwest::Client,
    endpoint: Endpoint,
    mapping_types: Arc<OnceCell<bool>>,
}

impl EsClient {
    /// 🚀 10 second connect timeout, because if ES can't handshake in 10 seconds,
    /// it's not having a good time and neither are we. Responses may be gzipped.
    pub(crate) fn new(endpoint: Endpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .map_err(|e| DumpError::transport("building the http client", e))?;
        Ok(Self {
            client,
            endpoint,
            mapping_types: Arc::new(OnceCell::new()),
        })
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// 📦 `/{index}`, percent-encoded.
    pub(crate) fn index_path(&self) -> String {
        format!("/{}", segment(&self.endpoint.index_name))
    }

    /// 📦 `/{index}/{type}` on typed clusters, `/{index}` everywhere else.
    pub(crate) async fn search_path(&self) -> Result<String> {
        Ok(match self.doc_type().await? {
            Some(doc_type) => format!("{}/{}", self.index_path(), segment(&doc_type)),
            None => self.index_path(),
        })
    }

    /// 🏷️ `Some(type)` when the endpoint spelled one out or the cluster still has
    /// mapping types. The type defaults to the index name.
    pub(crate) async fn doc_type(&self) -> Result<Option<String>> {
        let typed = self.uses_mapping_types().await?;
        Ok(typed.then(|| self.endpoint.type_name.clone()))
    }

    /// 🔎 Asked once per client, then remembered.
    pub(crate) async fn uses_mapping_types(&self) -> Result<bool> {
        if self.endpoint.explicit_type {
            return Ok(true);
        }
        self.mapping_types
            .get_or_try_init(|| self.detect_mapping_types())
            .await
            .copied()
    }

    /// 📡 `GET /` and read `version.number`. Only a network failure is an error;
    /// an answer we can't read means typeless.
    async fn detect_mapping_types(&self) -> Result<bool> {
        let request = self
            .request(Method::GET, "/")
            .timeout(Duration::from_secs(10));
        let response = self.send("reading the cluster version", request).await?;
        if !response.status().is_success() {
            warn!(
                "⚠️ {} answered HTTP {} to GET /; assuming a typeless cluster",
                self.endpoint,
                response.status()
            );
            return Ok(false);
        }
        let info = match response.json::<Value>().await {
            Ok(info) => info,
            Err(e) => {
                warn!("⚠️ unreadable cluster info from {}: {e}; assuming a typeless cluster", self.endpoint);
                return Ok(false);
            }
        };
        let typed = cluster_has_mapping_types(&info);
        debug!(
            "🏷️ {} runs version {}: mapping types {}",
            self.endpoint,
            info["version"]["number"],
            if typed { "on" } else { "off" }
        );
        Ok(typed)
    }

    /// 🔧 A request builder with the base URL and auth already applied.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint.base_url(), path);
        trace!("📡 {method} {url}");
        let request = self.client.request(method, url);
        match self.endpoint.credentials {
            Some(ref credentials) => {
                request.basic_auth(&credentials.username, credentials.password.as_ref())
            }
            None => request,
        }
    }

    /// 📡 Send, and turn a network failure into `Transport`. Any status is returned as-is.
    pub(crate) async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| DumpError::transport(operation, e))
    }

    /// 📡 Send, insist on 2xx, and parse the JSON body.
    pub(crate) async fn send_json(&self, operation: &str, request: RequestBuilder) -> Result<Value> {
        let response = self.send(operation, request).await?;
        let response = ensure_success(operation, response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| DumpError::transport(operation, e))
    }
}

/// 💀 Non-2xx → `Status`, with whatever the cluster had to say about it.
pub(crate) async fn ensure_success(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // -- the body is context, not a requirement; an unreadable one is just empty
    let body = response.text().await.unwrap_or_default();
    Err(DumpError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// 🎯 `start <= field < end`, both bounds in UTC with an explicit format so the
/// cluster never guesses.
pub(crate) fn range_query(date_field: &str, window: &Window) -> Value {
    json!({
        "range": {
            date_field: {
                "gte": format_bound(&window.start),
                "lt": format_bound(&window.end),
                "format": "strict_date_optional_time",
            }
        }
    })
}

/// 🏷️ Elasticsearch before 7.x addresses documents by type. OpenSearch never does.
fn cluster_has_mapping_types(info: &Value) -> bool {
    if info["version"]["distribution"].as_str() == Some("opensearch") {
        return false;
    }
    info["version"]["number"]
        .as_str()
        .and_then(|number| number.split('.').next())
        .and_then(|major| major.parse::<u32>().ok())
        .is_some_and(|major| major < 7)
}

pub(crate) fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}
