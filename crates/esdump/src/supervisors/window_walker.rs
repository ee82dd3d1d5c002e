//! 🚶 Window Walker — the heart of the migration.
//!
//! 🎬 *[a time range walks into a bar. the bartender cuts it into 24-hour slices.]*
//!
//! The planned `[start, end)` range is cut into windows of at most `window_size`,
//! lazily, one at a time. Each window is read in full (every page of the scroll,
//! projected by the source) and upserted before the cursor moves on. Ascending walks march from
//! `start` to `end`, descending walks from `end` back to `start`.
//!
//! ## Knowledge Graph 🧠
//! - The windows partition the range exactly: no gaps, no overlaps, and the last
//!   window lands precisely on the opposite boundary. The last one may be short.
//! - An empty window still advances the cursor and still reports (zero docs).
//! - Strictly sequential. One window fully read, fully written, then the next.
//! - Any read or write failure aborts the walk. Windows already written stay written;
//!   upsert-by-`_id` makes the rerun safe.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::app_config::Direction;
use crate::backends::{PageRequest, Pages, Sink, Source};
use crate::common::HitBatch;
use crate::error::{DumpError, Result};
use crate::planner::{TimeRange, Window};
use crate::progress::ProgressReporter;
use crate::transforms::Projection;

/// 🪟 The lazy window sequence over one [`TimeRange`].
///
/// State is a single cursor. Arithmetic that would overflow the calendar clamps
/// to the range boundary, so the sequence always terminates.
#[derive(Debug, Clone)]
pub struct Windows {
    range: TimeRange,
    step: TimeDelta,
    direction: Direction,
    cursor: DateTime<Utc>,
}

impl Windows {
    /// 💀 `Configuration` when `step` is not strictly positive.
    pub fn new(range: TimeRange, step: TimeDelta, direction: Direction) -> Result<Self> {
        if step <= TimeDelta::zero() {
            return Err(DumpError::config(format!("window size should be positive, got {step}")));
        }
        let cursor = match direction {
            Direction::Ascending => range.start(),
            Direction::Descending => range.end(),
        };
        Ok(Self {
            range,
            step,
            direction,
            cursor,
        })
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        match self.direction {
            Direction::Ascending => {
                if self.cursor >= self.range.end() {
                    return None;
                }
                let end = self
                    .cursor
                    .checked_add_signed(self.step)
                    .map_or(self.range.end(), |e| e.min(self.range.end()));
                let window = Window {
                    start: self.cursor,
                    end,
                };
                self.cursor = end;
                Some(window)
            }
            Direction::Descending => {
                if self.cursor <= self.range.start() {
                    return None;
                }
                let start = self
                    .cursor
                    .checked_sub_signed(self.step)
                    .map_or(self.range.start(), |s| s.max(self.range.start()));
                let window = Window {
                    start,
                    end: self.cursor,
                };
                self.cursor = start;
                Some(window)
            }
        }
    }
}

/// 📊 What one walk did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub windows: u64,
    pub documents: u64,
}

/// 🚶 Reads, projects and writes one window at a time.
#[derive(Debug, Clone)]
pub struct WindowWalker<'a> {
    pub date_field: &'a str,
    pub window_size: TimeDelta,
    pub page_size: usize,
    pub direction: Direction,
    pub projection: &'a Projection,
}

impl WindowWalker<'_> {
    /// 🚀 Walk every window of `range`, in order, until the opposite boundary.
    pub async fn walk<S, K>(
        &self,
        range: TimeRange,
        source: &mut S,
        sink: &mut K,
        progress: &mut dyn ProgressReporter,
    ) -> Result<WalkSummary>
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let mut summary = WalkSummary::default();
        for window in Windows::new(range, self.window_size, self.direction)? {
            let batch = self.read_window(window, source).await?;
            sink.bulk_upsert(&batch.hits).await?;

            let docs = batch.len() as u64;
            debug!("🪟 window {window}: {docs} doc(s) upserted");
            summary.windows += 1;
            summary.documents += docs;
            progress.window_done(&window, docs);
        }
        info!(
            "✅ walked {} window(s), {} document(s) migrated",
            summary.windows, summary.documents
        );
        Ok(summary)
    }

    /// 📄 Drain every page of one window.
    async fn read_window<S>(&self, window: Window, source: &mut S) -> Result<HitBatch>
    where
        S: Source + ?Sized,
    {
        let request = PageRequest {
            date_field: self.date_field,
            window,
            page_size: self.page_size,
            projection: self.projection,
        };
        let mut cursor = source.paginate(&request).await?;
        let mut batch = HitBatch::default();
        loop {
            match cursor.next_page().await {
                // -- pages arrive already projected by the source
                Ok(Some(page)) => batch.extend(page),
                Ok(None) => break,
                Err(e) => {
                    // -- the read error is the one worth reporting
                    if let Err(close_err) = cursor.close().await {
                        debug!("🗑️ could not close the cursor after a failed read: {close_err}");
                    }
                    return Err(e);
                }
            }
        }
        cursor.close().await?;
        Ok(batch)
    }
}
