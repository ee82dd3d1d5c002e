//! # Previously, on esdump...
//!
//! 🎬 The data was trapped. Stranded between two indices like a traveler stuck
//! in a connecting airport with no WiFi and a dead phone. Someone had to move it.
//! Someone had to write a cluster so small it lives entirely in RAM, gone the
//! moment you blink.
//!
//! That someone was this module.
//!
//! `in_mem` provides an in-memory [`Source`](crate::backends::Source) and
//! [`Sink`](crate::backends::Sink) that honor the same contracts as the real
//! cluster: half-open date ranges, sorted single-document lookups, paginated
//! reads, upsert-by-`_id`. The planner, the walker and the migrator are all
//! tested against these two, so nobody has to start a JVM to run `cargo test`.
//!
//! ⚠️ This is NOT for production. This is for tests. If you're deploying this
//! to prod, please also deploy a therapist.

mod in_mem_sink;
mod in_mem_source;

pub use in_mem_sink::{InMemorySink, InMemorySinkState};
pub use in_mem_source::{InMemoryPages, InMemorySource};
