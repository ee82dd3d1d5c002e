use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::backends::common_config::{CommonSourceConfig, es_time_value};
use crate::backends::elasticsearch::{EsClient, range_query};
use crate::backends::{PageCursor, PageRequest, Pages, SortOrder, Source};
use crate::common::Hit;
use crate::endpoint::Endpoint;
use crate::error::{DumpError, Result};
use crate::planner::Window;

/// 📦 The read side of the Elasticsearch backend.
///
/// Metadata calls (count, sorted lookups, get mapping) carry the configured
/// timeout. Page fetches do not; a slow page is still a page.
#[derive(Debug)]
pub struct ElasticsearchSource {
    client: EsClient,
    config: CommonSourceConfig,
}

impl ElasticsearchSource {
    pub fn new(endpoint: Endpoint, config: CommonSourceConfig) -> Result<Self> {
        Ok(Self {
            client: EsClient::new(endpoint)?,
            config,
        })
    }

    async fn search_url_path(&self) -> Result<String> {
        Ok(format!("{}/_search", self.client.search_path().await?))
    }
}

#[async_trait]
impl Source for ElasticsearchSource {
    async fn count(&mut self, date_field: &str, window: &Window) -> Result<u64> {
        let path = format!("{}/_count", self.client.search_path().await?);
        let request = self
            .client
            .request(Method::POST, &path)
            .timeout(self.config.metadata_timeout)
            .json(&json!({ "query": range_query(date_field, window) }));
        let answer = self.client.send_json("counting documents", request).await?;
        answer["count"].as_u64().ok_or_else(|| DumpError::Status {
            operation: "counting documents".to_string(),
            status: 200,
            body: format!("no numeric 'count' in {answer}"),
        })
    }

    async fn sorted_first(&mut self, date_field: &str, order: SortOrder) -> Result<Option<Hit>> {
        let body = json!({
            "size": 1,
            "query": { "exists": { "field": date_field } },
            "sort": [ { date_field: { "order": order.as_str() } } ],
        });
        let path = self.search_url_path().await?;
        let request = self
            .client
            .request(Method::POST, &path)
            .timeout(self.config.metadata_timeout)
            .json(&body);
        let operation = format!("finding the {} '{date_field}'", order.as_str());
        let answer = self.client.send_json(&operation, request).await?;
        Ok(hits_of(&answer).into_iter().next())
    }

    /// 📄 Opens a scroll. The first page rides along with the scroll id.
    async fn paginate(&mut self, request: &PageRequest<'_>) -> Result<PageCursor> {
        let keep_alive = es_time_value(self.config.scroll_keep_alive);
        let mut body = Map::new();
        body.insert("size".into(), json!(request.page_size.max(1)));
        body.insert("query".into(), range_query(request.date_field, &request.window));
        // -- 🚀 _doc order: the cheapest order there is, and order doesn't matter for upserts
        body.insert("sort".into(), json!(["_doc"]));
        if let Some(filter) = request.projection.source_filter() {
            body.insert("_source".into(), filter);
        }

        let path = format!("{}?scroll={keep_alive}", self.search_url_path().await?);
        let http = self.client.request(Method::POST, &path).json(&body);
        let answer = self.client.send_json("opening a scroll", http).await?;
        let scroll_id = answer["_scroll_id"].as_str().map(str::to_string);
        let first_page = hits_of(&answer);
        debug!(
            "📄 scroll opened for {} with {} hit(s) on the first page",
            request.window,
            first_page.len()
        );

        Ok(PageCursor::Elasticsearch(ElasticsearchScroll {
            client: self.client.clone(),
            keep_alive,
            scroll_id,
            first_page: Some(first_page),
            exhausted: false,
        }))
    }

    async fn get_mapping(&mut self) -> Result<Value> {
        let request = self
            .client
            .request(Method::GET, &format!("{}/_mapping", self.client.index_path()))
            .timeout(self.config.metadata_timeout);
        self.client.send_json("reading the source mapping", request).await
    }
}

/// 📄 A live scroll context. Drain with `next_page`, then `close` it so the
/// cluster can forget about us sooner than the keep-alive would.
#[derive(Debug)]
pub struct ElasticsearchScroll {
    client: EsClient,
    keep_alive: String,
    scroll_id: Option<String>,
    first_page: Option<Vec<Hit>>,
    exhausted: bool,
}

#[async_trait]
impl Pages for ElasticsearchScroll {
    async fn next_page(&mut self) -> Result<Option<Vec<Hit>>> {
        if let Some(page) = self.first_page.take() {
            return Ok(self.keep_if_not_empty(page));
        }
        if self.exhausted {
            return Ok(None);
        }
        let Some(scroll_id) = self.scroll_id.clone() else {
            self.exhausted = true;
            return Ok(None);
        };

        let request = self
            .client
            .request(Method::POST, "/_search/scroll")
            .json(&json!({ "scroll": self.keep_alive, "scroll_id": scroll_id }));
        let answer = self.client.send_json("fetching the next scroll page", request).await?;
        // -- 🔄 the id may rotate between pages; always keep the newest
        if let Some(next_id) = answer["_scroll_id"].as_str() {
            self.scroll_id = Some(next_id.to_string());
        }
        Ok(self.keep_if_not_empty(hits_of(&answer)))
    }

    /// 🗑️ Best effort. A scroll we fail to clear expires on its own.
    async fn close(&mut self) -> Result<()> {
        self.exhausted = true;
        let Some(scroll_id) = self.scroll_id.take() else {
            return Ok(());
        };
        let request = self
            .client
            .request(Method::DELETE, "/_search/scroll")
            .json(&json!({ "scroll_id": [scroll_id] }));
        match self.client.send("clearing the scroll", request).await {
            Ok(response) if response.status().is_success() || response.status().as_u16() == 404 => {}
            Ok(response) => warn!("⚠️ clearing the scroll answered HTTP {}", response.status()),
            Err(e) => warn!("⚠️ could not clear the scroll: {e}"),
        }
        Ok(())
    }
}

impl ElasticsearchScroll {
    fn keep_if_not_empty(&mut self, page: Vec<Hit>) -> Option<Vec<Hit>> {
        if page.is_empty() {
            self.exhausted = true;
            None
        } else {
            Some(page)
        }
    }
}

/// 🔎 `hits.hits[*]` → `Hit`s. Anything without an `_id` is skipped.
fn hits_of(answer: &Value) -> Vec<Hit> {
    answer["hits"]["hits"]
        .as_array()
        .map(|raw| raw.iter().filter_map(Hit::from_search_hit).collect())
        .unwrap_or_default()
}
