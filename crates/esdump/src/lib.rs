//! 🚚 esdump — move an Elasticsearch index's mapping and documents to another index,
//! one time window at a time.
//!
//! 🧠 Knowledge graph:
//! - [`app_config`]: figment layers → [`app_config::AppConfig`] → validated [`app_config::MigrationConfig`]
//! - [`endpoint`]: connection urls → [`endpoint::Endpoint`]
//! - [`planner`]: the `[start, end)` range, discovered when the user didn't say
//! - [`supervisors`]: mapping migrator + window walker, dispatched by migration kind
//! - [`backends`]: Elasticsearch over HTTP, or in memory for tests
//! - [`transforms`]: projection and bulk rendering
//! - [`progress`]: bars, tables, or silence

pub mod app_config;
pub mod backends;
pub mod common;
pub mod endpoint;
pub mod error;
pub mod planner;
pub mod progress;
pub mod supervisors;
pub mod transforms;

use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{ElasticsearchSink, ElasticsearchSource, SinkBackend, SourceBackend};
use crate::progress::{ProgressMetrics, ProgressReporter, SilentProgress};
use crate::supervisors::{RunSummary, Supervisor};

pub use error::{DumpError, Result};

/// 🚀 Resolve the configuration, wire up both clusters, run every requested phase.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    let config = app_config.resolve()?;
    info!(
        "🚀 {} → {} ({:?}, {:?})",
        config.source, config.destination, config.kind, config.direction
    );

    let mut source = SourceBackend::Elasticsearch(ElasticsearchSource::new(
        config.source.clone(),
        config.source_config.clone(),
    )?);
    let mut sink = SinkBackend::Elasticsearch(ElasticsearchSink::new(
        config.destination.clone(),
        config.sink_config.clone(),
    )?);
    let mut progress: Box<dyn ProgressReporter> = if config.show_progress {
        Box::new(ProgressMetrics::new(config.source.to_string()))
    } else {
        Box::new(SilentProgress)
    };

    let summary = Supervisor::new(config)
        .run(&mut source, &mut sink, progress.as_mut())
        .await?;
    info!(
        "🏁 done: mapping migrated = {}, {} document(s) in {} window(s)",
        summary.mapping_migrated, summary.walk.documents, summary.walk.windows
    );
    Ok(summary)
}
