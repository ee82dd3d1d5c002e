//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where documents sat in the wrong index..."
//! 🎬 "One supervisor dared to move them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent.
//! It decides which phases run and in what order, then gets out of the way:
//!
//! - `mapping` → [`MappingMigrator`] only
//! - `data` → plan the range, count it, [`WindowWalker`] it, refresh
//! - both → mapping first, then data
//!
//! Everything after the first error is skipped. The error goes up, untouched.

pub mod mapping_migrator;
pub mod window_walker;

use tracing::{info, warn};

use crate::app_config::MigrationConfig;
use crate::backends::{Sink, Source};
use crate::error::{DumpError, Result};
use crate::planner::{PlanRequest, TimeRange, plan_time_range};
use crate::progress::ProgressReporter;
pub use mapping_migrator::MappingMigrator;
pub use window_walker::{WalkSummary, WindowWalker, Windows};

/// 📊 What a run actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub mapping_migrated: bool,
    /// 🗓️ `None` when no data phase ran, or the source had nothing to migrate
    pub range: Option<TimeRange>,
    pub walk: WalkSummary,
}

/// 📦 The Supervisor: because even a sequential walk needs someone hovering over it
/// asking "is it done yet?"
#[derive(Debug, Clone)]
pub struct Supervisor {
    config: MigrationConfig,
}

impl Supervisor {
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// 🚀 Run every phase the configuration asked for.
    pub async fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RunSummary>
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let mut summary = RunSummary::default();

        if self.config.kind.includes_mapping() {
            info!(
                "🗺️ migrating mapping {} → {}",
                self.config.source, self.config.destination
            );
            MappingMigrator::new(&self.config.source.index_name, &self.config.source.type_name)
                .migrate(source, sink)
                .await?;
            summary.mapping_migrated = true;
        }

        if self.config.kind.includes_data() {
            let (range, walk) = self.migrate_data(source, sink, progress).await?;
            summary.range = range;
            summary.walk = walk;
        }

        Ok(summary)
    }

    async fn migrate_data<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<(Option<TimeRange>, WalkSummary)>
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let date_field = self
            .config
            .date_field
            .as_deref()
            .ok_or_else(|| DumpError::config("a date field is required to migrate data"))?;
        info!(
            "🚚 migrating data {} → {} by '{date_field}'",
            self.config.source, self.config.destination
        );

        let request = PlanRequest {
            date_field,
            start: self.config.start,
            end: self.config.end,
            zone: self.config.zone,
        };
        let Some(range) = plan_time_range(&request, source).await? else {
            warn!("🕳️ nothing to migrate: the source has no '{date_field}' values");
            return Ok((None, WalkSummary::default()));
        };

        let total = source.count(date_field, &range.as_window()).await?;
        info!("🔢 {total} document(s) in {range}");
        progress.begin(total);

        let walker = WindowWalker {
            date_field,
            window_size: self.config.window_size,
            page_size: self.config.page_size,
            direction: self.config.direction,
            projection: &self.config.projection,
        };
        let walked = walker.walk(range, source, sink, progress).await;
        progress.finish();
        let walk = walked?;

        if self.config.refresh {
            sink.refresh().await?;
        }
        Ok((Some(range), walk))
    }
}
