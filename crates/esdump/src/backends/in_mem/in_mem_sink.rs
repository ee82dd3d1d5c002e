use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::backends::Sink;
use crate::common::Hit;
use crate::error::Result;

/// 🔒 Everything the sink has been told, in one lockable box.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InMemorySinkState {
    pub created: bool,
    /// 🗺️ every mapping ever put, in order
    pub mappings: Vec<Value>,
    /// 📦 upsert-by-id: the last write wins, same as `_bulk` with `index` actions
    pub docs: BTreeMap<String, Map<String, Value>>,
    pub bulk_calls: usize,
    pub refreshes: usize,
}

/// 📦 A sink that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// supervisor. The `Arc` means every clone shares the same state. Communist data,
/// but in a good way. The borrow checker approved. Barely. It had notes.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    pub(crate) state: Arc<tokio::sync::Mutex<InMemorySinkState>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📸 A copy of everything received so far.
    pub async fn snapshot(&self) -> InMemorySinkState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn create_index_if_absent(&mut self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let created_now = !state.created;
        state.created = true;
        Ok(created_now)
    }

    async fn put_mapping(&mut self, mapping: Value) -> Result<()> {
        self.state.lock().await.mappings.push(mapping);
        Ok(())
    }

    /// 📡 Lock, upsert, done. Like a fax machine but for JSON. 🦆
    async fn bulk_upsert(&mut self, hits: &[Hit]) -> Result<()> {
        // -- 🔒 The Mutex is load-bearing. Do not remove. I know it looks optional. It isn't.
        let mut state = self.state.lock().await;
        state.bulk_calls += 1;
        for hit in hits {
            state.docs.insert(hit.id.clone(), hit.source.clone());
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.state.lock().await.refreshes += 1;
        Ok(())
    }
}
