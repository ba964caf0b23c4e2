//! Rank-local performance accounting (spec §9: "a process-wide clock for
//! performance accounting can be replaced by explicit context passed through
//! the orchestrator... all timing goes into a rank-local diagnostics bag").
//!
//! Grounded in the teacher's `performance_data.rs` (`Timer` wrapping
//! `std::time::Instant`, a named-category run-time accumulator), stripped of
//! its bevy `Resource`/YAML-report machinery: this is a plain struct the
//! orchestrator owns and passes by `&mut` reference, not a global.

use std::time::{Duration, Instant};

use log::info;

/// One named timing category's accumulated samples, mirroring the teacher's
/// `Result::RunTimes` variant without the `serde_yaml` report encoding.
#[derive(Debug, Default)]
struct Category {
    samples: Vec<Duration>,
}

impl Category {
    fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    fn average(&self) -> Duration {
        if self.samples.is_empty() {
            Duration::ZERO
        } else {
            self.total() / self.samples.len() as u32
        }
    }
}

/// A rank-local bag of named timing categories (`derivatives`, `overlap`,
/// `migration`, `gather`, ...), owned by the orchestrator for the lifetime
/// of one run and never shared across ranks.
#[derive(Debug, Default)]
pub struct Diagnostics {
    categories: Vec<(String, Category)>,
}

/// An open timing span; dropping it without passing it to
/// [`Diagnostics::record`] simply discards the sample, matching the
/// teacher's `Timer::elapsed_time` being read explicitly rather than on
/// drop.
pub struct Span {
    category: String,
    started_at: Instant,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `category`. Pass the result to [`Diagnostics::record`]
    /// once the timed section completes.
    pub fn start(&self, category: &str) -> Span {
        Span { category: category.to_string(), started_at: Instant::now() }
    }

    fn category_mut(&mut self, name: &str) -> &mut Category {
        if let Some(index) = self.categories.iter().position(|(n, _)| n == name) {
            &mut self.categories[index].1
        } else {
            self.categories.push((name.to_string(), Category::default()));
            &mut self.categories.last_mut().unwrap().1
        }
    }

    /// Records `span`'s elapsed time under its category.
    pub fn record(&mut self, span: Span) {
        let elapsed = span.started_at.elapsed();
        self.category_mut(&span.category).samples.push(elapsed);
    }

    /// Logs `category: total=.. average=.. samples=..` for every recorded
    /// category, at `info` level, for one rank's end-of-run summary.
    pub fn log_summary(&self, rank: i32) {
        for (name, category) in &self.categories {
            info!(
                "rank {rank} diagnostics: {name} total={:?} average={:?} samples={}",
                category.total(),
                category.average(),
                category.samples.len()
            );
        }
    }
}

impl Span {
    /// Returns the elapsed time without recording it anywhere, for callers
    /// that only want to log a single measurement inline.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
