//! 🔄 Transforms — what happens to a document between the read and the write.
//!
//! Two stops on this line:
//! - [`projection`]: field include/exclude, applied once per document.
//! - [`elasticsearch`]: `Hit` → `_bulk` NDJSON action pair for the upsert.
//!
//! Neither one does I/O. Neither one has feelings. Both are easy to test. 🦆

pub mod elasticsearch;
pub mod projection;

pub use projection::Projection;
