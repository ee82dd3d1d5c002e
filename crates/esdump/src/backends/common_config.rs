//! 📦 **Common Backend Configs** — the shared knobs of source and sink.
//!
//! 🧠 Knowledge graph:
//! - `CommonSourceConfig`: how long metadata calls may take, how long a scroll
//!   context stays alive between pages.
//! - `CommonSinkConfig`: how long metadata calls may take, how big one `_bulk`
//!   body may grow before it gets split.
//! - Built from `RuntimeConfig` in `app_config`; the `Default` impls match its defaults.
//!
//! ⚠️ These live in `backends` (not `app_config`) so the backends never import upward.

use std::time::Duration;

/// 📦 Shared source-side knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonSourceConfig {
    /// ⏱️ ceiling for count / sorted-first / get-mapping calls
    pub metadata_timeout: Duration,
    /// 🔄 scroll context keep-alive between page fetches
    pub scroll_keep_alive: Duration,
}

impl Default for CommonSourceConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(10),
            scroll_keep_alive: Duration::from_secs(60),
        }
    }
}

/// 🚰 Shared sink-side knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonSinkConfig {
    /// ⏱️ ceiling for index-exists / create / put-mapping / refresh calls
    pub metadata_timeout: Duration,
    /// 📦 flush threshold for one `_bulk` body, in bytes
    pub max_request_size_bytes: usize,
}

// 🚰 10MB, the same limit as your email attachment policy. Coincidence? Absolutely yes.
pub(crate) const DEFAULT_MAX_REQUEST_SIZE_BYTES: usize = 10 * 1024 * 1024;

impl Default for CommonSinkConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(10),
            max_request_size_bytes: DEFAULT_MAX_REQUEST_SIZE_BYTES,
        }
    }
}

/// ⏳ Render a keep-alive the way Elasticsearch likes it (`60s`, `1500ms`).
pub(crate) fn es_time_value(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs().max(1))
    } else {
        format!("{}ms", duration.as_millis())
    }
}
