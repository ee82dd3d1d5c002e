//! 📊 progress.rs: "Are we there yet?" Every migration, every time, forever.
//!
//! 🚀 The walker tells a [`ProgressReporter`] how many documents each window
//! carried. What the reporter does with that is its own business:
//! [`ProgressMetrics`] draws a bar and a table so comfy it has lumbar support,
//! [`SilentProgress`] does nothing at all, with great conviction.
//!
//! ⚠️  Warning: Watching this progress bar will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::planner::Window;

/// 📡 The "n documents processed" signal. Called from one thread of control only.
pub trait ProgressReporter: Send {
    /// 🏁 The whole range holds `total_docs` documents, according to `count`.
    fn begin(&mut self, total_docs: u64);
    /// 🪟 One window is written. `docs` may be zero; empty windows still count.
    fn window_done(&mut self, window: &Window, docs: u64);
    fn finish(&mut self);
}

/// 🤫 For `--progress false`, CI logs, and people who find bars stressful.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn begin(&mut self, _total_docs: u64) {}
    fn window_done(&mut self, _window: &Window, _docs: u64) {}
    fn finish(&mut self) {}
}

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 docs" → "1,000,000 docs". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    // -- 🧵 pre-allocate like we know what we're doing (we do, we read the book)
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 The brains behind the progress display. Tracks docs, windows, rates, and your sanity.
///
/// Uses a sliding 5-second window for the docs/s rate so spikes don't scare you.
/// (Your heart rate is not our responsibility.)
///
/// # Ancient Proverb
/// "He who runs a migration without a progress bar, migrates alone and in darkness."
pub struct ProgressMetrics {
    /// 🏷️ what are we even migrating? shown on the first line
    source_name: String,
    /// 📏 `count` of the whole range. 0 until `begin`, and 0 is also a legit answer.
    total_docs: u64,
    /// 📄 documents written so far, each one a tiny victory
    done_docs: u64,
    windows_done: u64,
    /// 🪟 the last window that finished, for the "where are we" line
    last_window: Option<Window>,
    progress_bar: ProgressBar,
    /// 🔄 sliding window of (timestamp, docs) for rate calculation
    rate_samples: VecDeque<(Instant, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_docs", &self.total_docs)
            .field("done_docs", &self.done_docs)
            .field("windows_done", &self.windows_done)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 The bar starts hidden-length; `begin` tells it how long the road is.
    pub fn new(source_name: String) -> Self {
        let progress_bar = ProgressBar::new(0);
        // -- 🐛 the template is a literal; if it ever fails to parse we keep indicatif's default look
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
            progress_bar.set_style(style.progress_chars("=>-"));
        }
        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        // -- 🔄 seed the rate window with t=0 so we don't divide by zero like animals
        rate_samples.push_back((start_time, 0u64));

        Self {
            source_name,
            total_docs: 0,
            done_docs: 0,
            windows_done: 0,
            last_window: None,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 📈 docs/s over the last 5 seconds.
    fn docs_per_sec(&mut self) -> f64 {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.done_docs));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_docs)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    self.done_docs.saturating_sub(oldest_docs) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    fn percent(&self) -> f64 {
        if self.total_docs > 0 {
            (self.done_docs as f64 / self.total_docs as f64 * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    /// 🎨 Render the table into the bar's message.
    ///
    /// ```text
    /// source: <name>
    ///   <docs/s>          <done / total docs>
    ///   <windows walked>  <%>
    ///   <elapsed>         <remaining>
    ///   window: <last window>
    /// | [=====>----------]
    /// ```
    fn render(&self, docs_per_sec: f64) {
        let percent = self.percent();
        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 && percent < 100.0 {
            // 🔮 linear extrapolation: the future looks like the past
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            format_duration(Duration::from_secs_f64(
                (total_estimated - elapsed.as_secs_f64()).max(0.0),
            ))
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Docs/s", format_number(docs_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} Docs",
                format_number(self.done_docs),
                format_number(self.total_docs)
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} windows", format_number(self.windows_done)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", percent)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} remaining", remaining)).set_alignment(CellAlignment::Right),
        ]);

        let window_line = match self.last_window {
            Some(ref window) => format!("\nwindow: {window}"),
            None => String::new(),
        };
        self.progress_bar
            .set_message(format!("source: {}\n{}{}", self.source_name, table, window_line));
    }
}

impl ProgressReporter for ProgressMetrics {
    fn begin(&mut self, total_docs: u64) {
        self.total_docs = total_docs;
        self.progress_bar.set_length(total_docs);
        self.render(0.0);
    }

    fn window_done(&mut self, window: &Window, docs: u64) {
        self.done_docs += docs;
        self.windows_done += 1;
        self.last_window = Some(*window);
        let rate = self.docs_per_sec();
        self.render(rate);
        // -- 📏 count is a snapshot; writes that land mid-run can push us past it
        if self.done_docs > self.total_docs {
            self.progress_bar.set_length(self.done_docs);
        }
        self.progress_bar.set_position(self.done_docs);
    }

    /// ✅ Ring the bell. We made it.
    fn finish(&mut self) {
        self.progress_bar.finish();
    }
}
