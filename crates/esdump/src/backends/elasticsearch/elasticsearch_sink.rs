use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::backends::Sink;
use crate::backends::common_config::CommonSinkConfig;
use crate::backends::elasticsearch::{EsClient, ensure_success, segment};
use crate::common::Hit;
use crate::endpoint::Endpoint;
use crate::error::{DumpError, Result};
use crate::transforms::elasticsearch::{BulkTarget, ElasticsearchBulk};

/// 📡 The write side of the Elasticsearch backend.
///
/// `bulk_upsert` renders `index` actions (create-or-replace by `_id`) and splits
/// them into bodies no larger than `max_request_size_bytes`. A 2xx answer that
/// says `"errors": true` is still a failure; we count the casualties and bail.
///
/// 🚰 Think of this as the drain at the end of a data pipeline. The last stop.
/// Knock knock. Who's there? HTTP POST. HTTP POST who? HTTP POST your NDJSON
/// and hope the cluster's in a good mood.
#[derive(Debug)]
pub struct ElasticsearchSink {
    client: EsClient,
    config: CommonSinkConfig,
    index: String,
}

impl ElasticsearchSink {
    pub fn new(endpoint: Endpoint, config: CommonSinkConfig) -> Result<Self> {
        let client = EsClient::new(endpoint)?;
        Ok(Self {
            index: client.endpoint().index_name.clone(),
            client,
            config,
        })
    }

    /// 🎯 Where the bulk actions point, `_type` included on typed clusters.
    async fn bulk_target(&self) -> Result<BulkTarget> {
        Ok(BulkTarget {
            index: self.index.clone(),
            doc_type: self.client.doc_type().await?,
        })
    }

    /// 📡 Fires one `_bulk` POST and reads the per-item verdicts.
    async fn submit_bulk_request(&self, body: String) -> Result<()> {
        trace!("📡 sending {} bytes to /_bulk", body.len());
        let request = self
            .client
            .request(Method::POST, "/_bulk")
            // ⚠️ application/x-ndjson, not application/json. The cluster notices.
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let answer = self.client.send_json("bulk upserting documents", request).await?;
        match bulk_failures(&answer) {
            Some(rejected) => Err(rejected),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    /// 🏗️ HEAD, and PUT only on 404. Losing a creation race to someone else is still a win.
    async fn create_index_if_absent(&mut self) -> Result<bool> {
        let index_path = self.client.index_path();
        let head = self
            .client
            .request(Method::HEAD, &index_path)
            .timeout(self.config.metadata_timeout);
        let response = self.client.send("checking the destination index", head).await?;
        match response.status().as_u16() {
            200..=299 => {
                debug!("✅ destination index '{}' already exists", self.index);
                return Ok(false);
            }
            404 => {}
            _ => {
                return ensure_success("checking the destination index", response)
                    .await
                    .map(|_| false);
            }
        }

        let put = self
            .client
            .request(Method::PUT, &index_path)
            .timeout(self.config.metadata_timeout);
        let response = self.client.send("creating the destination index", put).await?;
        if response.status().is_success() {
            info!("🏗️ created destination index '{}'", self.index);
            return Ok(true);
        }
        match ensure_success("creating the destination index", response).await {
            Err(DumpError::Status { ref body, .. }) if body.contains("resource_already_exists_exception") => {
                debug!("🏁 somebody else created '{}' first; fine by us", self.index);
                Ok(false)
            }
            Err(e) => Err(e),
            Ok(_) => Ok(true),
        }
    }

    async fn put_mapping(&mut self, mapping: Value) -> Result<()> {
        let path = match self.client.doc_type().await? {
            Some(doc_type) => format!("{}/_mapping/{}", self.client.index_path(), segment(&doc_type)),
            None => format!("{}/_mapping", self.client.index_path()),
        };
        let request = self
            .client
            .request(Method::PUT, &path)
            .timeout(self.config.metadata_timeout)
            .json(&mapping);
        self.client.send_json("applying the destination mapping", request).await?;
        info!("🗺️ mapping applied to '{}'", self.index);
        Ok(())
    }

    async fn bulk_upsert(&mut self, hits: &[Hit]) -> Result<()> {
        if hits.is_empty() {
            return Ok(());
        }
        let target = self.bulk_target().await?;
        let bodies =
            ElasticsearchBulk::render_bodies(hits, &target, self.config.max_request_size_bytes)?;
        debug!("📦 {} hit(s) in {} bulk request(s)", hits.len(), bodies.len());
        for body in bodies {
            self.submit_bulk_request(body).await?;
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let request = self
            .client
            .request(Method::POST, &format!("{}/_refresh", self.client.index_path()))
            .timeout(self.config.metadata_timeout);
        self.client.send_json("refreshing the destination index", request).await?;
        Ok(())
    }
}

/// 💀 `Some(BulkRejected)` when the bulk answer flagged any item as failed.
fn bulk_failures(answer: &Value) -> Option<DumpError> {
    if !answer["errors"].as_bool().unwrap_or(false) {
        return None;
    }
    let failed: Vec<&Value> = answer["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object()?.values().next())
                .filter(|verdict| !verdict["error"].is_null())
                .collect()
        })
        .unwrap_or_default();
    let first_reason = failed
        .first()
        .map(|verdict| match verdict["error"]["reason"].as_str() {
            Some(reason) => reason.to_string(),
            None => verdict["error"].to_string(),
        })
        .unwrap_or_else(|| "the cluster said errors=true and nothing else".to_string());
    Some(DumpError::BulkRejected {
        failed: failed.len().max(1),
        first_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sink_for(server: &MockServer, path: &str) -> Result<ElasticsearchSink> {
        let endpoint = Endpoint::resolve(&format!("{}{path}", server.uri()))?;
        ElasticsearchSink::new(endpoint, CommonSinkConfig::default())
    }

    fn hit(id: &str) -> Hit {
        Hit::new(id, json!({"title": id}).as_object().cloned().expect("💀 object"))
    }

    #[tokio::test]
    async fn the_one_where_a_missing_index_gets_created() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        assert!(sink.create_index_if_absent().await?);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_existing_index_is_left_alone() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        assert!(!sink.create_index_if_absent().await?);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_losing_the_creation_race_is_fine() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "resource_already_exists_exception"}
            })))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        assert!(!sink.create_index_if_absent().await?);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_typed_mappings_go_to_the_typed_door() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/new/_mapping/doc"))
            .and(body_partial_json(json!({"properties": {"title": {"type": "text"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new/doc").await?;
        sink.put_mapping(json!({"properties": {"title": {"type": "text"}}}))
            .await
    }

    #[tokio::test]
    async fn the_one_where_a_six_dot_x_index_url_still_names_its_type() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"version": {"number": "6.8.12"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test_dumpmapping/_mapping/test_dumpmapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test_dumpmapping/_mapping"))
            .respond_with(ResponseTemplate::new(400).set_body_string("mapping type is missing"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(body_string_contains(r#""_type":"test_dumpmapping""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": false, "items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/test_dumpmapping").await?;
        sink.put_mapping(json!({"properties": {"title": {"type": "text"}}}))
            .await?;
        sink.bulk_upsert(&[hit("a")]).await
    }

    #[tokio::test]
    async fn the_one_where_bulk_sends_ndjson_and_likes_the_answer() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("content-type", "application/x-ndjson"))
            .and(body_string_contains(r#""_id":"a""#))
            .and(body_string_contains(r#""_index":"new""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": false, "items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        sink.bulk_upsert(&[hit("a"), hit("b")]).await
    }

    #[tokio::test]
    async fn the_one_where_partial_bulk_failure_is_still_failure() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": true,
                "items": [
                    {"index": {"_id": "a", "status": 201}},
                    {"index": {"_id": "b", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "failed to parse [title]"}}}
                ]
            })))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        let err = sink
            .bulk_upsert(&[hit("a"), hit("b")])
            .await
            .expect_err("💀 should be rejected");
        assert!(matches!(
            err,
            DumpError::BulkRejected { failed: 1, ref first_reason } if first_reason == "failed to parse [title]"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nothing_to_send_sends_nothing() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server, "/new").await?;
        sink.bulk_upsert(&[]).await
    }
}
