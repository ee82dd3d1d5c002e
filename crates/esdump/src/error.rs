//! 💀 The error taxonomy — every way a migration can go sideways, with a name tag on each.
//!
//! Every variant is fatal for the run. There is no retry, no checkpoint, no second act.
//! The library hands these up as values; the binary decides the exit status. 🦆

use thiserror::Error;

/// 📦 Crate-wide result alias. One less generic to type, one more coffee to drink.
pub type Result<T> = std::result::Result<T, DumpError>;

/// 💀 Everything that can abort a run, sorted by whose fault it is.
#[derive(Debug, Error)]
pub enum DumpError {
    /// 🔧 Bad input, caught before a single byte left the process.
    #[error("💀 configuration error: {0}")]
    Configuration(String),

    /// 📡 The network, the cluster, or a timeout said no.
    #[error("💀 transport error while {operation}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// 📡 The cluster answered, but not with a 2xx.
    #[error("💀 {operation} failed with HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// 🗺️ The mapping payload is not shaped like a mapping payload.
    #[error("💀 schema error: {0}")]
    Schema(String),

    /// 🕳️ The planned time range has nothing in it.
    #[error("💀 empty time range: {0}")]
    EmptyRange(String),

    /// 📅 A document carried a date we could not read.
    #[error("💀 could not parse date value '{value}' of field '{field}'")]
    DateParse { field: String, value: String },

    /// 📦 `_bulk` came back 2xx but some items were rejected.
    #[error("💀 bulk upsert rejected {failed} document(s); first reason: {first_reason}")]
    BulkRejected { failed: usize, first_reason: String },
}

impl DumpError {
    /// 🔧 Shorthand for the most common complaint.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        DumpError::Configuration(msg.into())
    }

    pub(crate) fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        DumpError::Transport {
            operation: operation.into(),
            source,
        }
    }

    /// 📡 True when the failure smells like "the server is not there at all".
    pub fn is_connection_failure(&self) -> bool {
        match self {
            DumpError::Transport { source, .. } => source.is_connect() || source.is_timeout(),
            _ => false,
        }
    }
}
