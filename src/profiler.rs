//! Tick timing for the controller, behind the `profile` feature.
//!
//! The controller's budget is per tick: one maintenance pass plus one
//! decision per living agent. Wall time folds into one bucket per
//! [`Stage`], so a stress run can show where the tick went:
//!
//! ```bash
//! cargo test --release --features profile -- --nocapture
//! ```

use std::fmt::Write;
use std::time::Duration;

/// The controller work buckets that get timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Stage {
    /// `update_controller`: episode-reset check, reservation sweep,
    /// economy tick, hybrid-role application.
    Maintenance = 0,
    /// `decide_action`: the whole per-agent pipeline, pathfinding included.
    Decide = 1,
}

impl Stage {
    pub const COUNT: usize = 2;
    pub const ALL: [Stage; Stage::COUNT] = [Stage::Maintenance, Stage::Decide];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Maintenance => "maintenance",
            Stage::Decide => "decide",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated wall time for one stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageStats {
    pub total: Duration,
    pub calls: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl StageStats {
    /// Mean time per call.
    pub fn avg(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Per-stage tick timings, sized at compile time by the stage set.
///
/// `decide` is recorded once per agent and `maintenance` once per tick, so
/// the call counts also double as a sanity check on how many decisions a
/// run actually made.
#[derive(Debug, Default)]
pub struct TickProfiler {
    stages: [StageStats; Stage::COUNT],
    ticks: u64,
}

impl TickProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a measured duration into a stage bucket.
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let stats = &mut self.stages[stage.index()];
        stats.total += elapsed;
        stats.calls += 1;
        stats.min = Some(stats.min.map_or(elapsed, |m| m.min(elapsed)));
        stats.max = Some(stats.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    /// Mark the end of one controller tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn stage(&self, stage: Stage) -> &StageStats {
        &self.stages[stage.index()]
    }

    /// Render the per-stage table for a finished run.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "controller timing over {} ticks", self.ticks);
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>8} {:>12} {:>12} {:>12}",
            "stage", "total", "calls", "avg", "min", "max"
        );
        for stage in Stage::ALL {
            let stats = self.stage(stage);
            let _ = writeln!(
                out,
                "{:<12} {:>10.2?} {:>8} {:>12.2?} {:>12.2?} {:>12.2?}",
                stage.label(),
                stats.total,
                stats.calls,
                stats.avg(),
                stats.min.unwrap_or(Duration::ZERO),
                stats.max.unwrap_or(Duration::ZERO)
            );
        }
        if self.ticks > 0 {
            let total: Duration = Stage::ALL.iter().map(|&s| self.stage(s).total).sum();
            let _ = writeln!(out, "avg per tick: {:.2?}", total / self.ticks as u32);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_extremes_per_stage() {
        let mut profiler = TickProfiler::new();
        profiler.record(Stage::Decide, Duration::from_millis(2));
        profiler.record(Stage::Decide, Duration::from_millis(8));
        profiler.record(Stage::Maintenance, Duration::from_millis(1));

        let decide = profiler.stage(Stage::Decide);
        assert_eq!(decide.calls, 2);
        assert_eq!(decide.min, Some(Duration::from_millis(2)));
        assert_eq!(decide.max, Some(Duration::from_millis(8)));
        assert_eq!(decide.avg(), Duration::from_millis(5));

        // Stages do not bleed into each other.
        assert_eq!(profiler.stage(Stage::Maintenance).calls, 1);
        assert_eq!(
            profiler.stage(Stage::Maintenance).total,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_tick_counting() {
        let mut profiler = TickProfiler::new();
        assert_eq!(profiler.tick_count(), 0);
        for _ in 0..5 {
            profiler.record(Stage::Maintenance, Duration::from_micros(10));
            profiler.tick();
        }
        assert_eq!(profiler.tick_count(), 5);
    }

    #[test]
    fn test_summary_names_every_stage() {
        let mut profiler = TickProfiler::new();
        profiler.record(Stage::Decide, Duration::from_millis(3));
        profiler.tick();

        let summary = profiler.summary();
        for stage in Stage::ALL {
            assert!(summary.contains(stage.label()), "missing {}", stage.label());
        }
        assert!(summary.contains("1 ticks"));
    }

    #[test]
    fn test_empty_profiler_avg_is_zero() {
        let profiler = TickProfiler::new();
        assert_eq!(profiler.stage(Stage::Decide).avg(), Duration::ZERO);
    }
}
