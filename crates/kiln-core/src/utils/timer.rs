// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wall-clock measurement: a plain [`Stopwatch`] and the per-frame [`FrameTimer`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Measures the time elapsed since it was created or last restarted.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch that starts immediately.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time elapsed since the start, in whole microseconds.
    pub fn elapsed_us(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Time elapsed since the start, in fractional seconds.
    pub fn elapsed_secs_f64(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A budgeted section of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSection {
    /// Uploading and evicting resources.
    ResourcesUpload,
}

impl FrameSection {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        match self {
            FrameSection::ResourcesUpload => 0,
        }
    }
}

/// Per-frame clock with a soft time budget for each [`FrameSection`].
///
/// The clock restarts on [`FrameTimer::start_frame`]. Budgets are in
/// microseconds and [`FrameTimer::UNLIMITED`] disables a section's budget.
/// All state is atomic, so one timer can be shared as `Arc<FrameTimer>` between
/// the frame driver and the agents it runs, and budgets may change mid-frame.
#[derive(Debug)]
pub struct FrameTimer {
    epoch: Instant,
    frame_start_us: AtomicU64,
    budgets_us: [AtomicU64; FrameSection::COUNT],
}

impl FrameTimer {
    /// Budget value meaning "no limit".
    pub const UNLIMITED: u64 = u64::MAX;

    /// Creates a timer with unlimited budgets, with the frame starting now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            frame_start_us: AtomicU64::new(0),
            budgets_us: [const { AtomicU64::new(FrameTimer::UNLIMITED) }; FrameSection::COUNT],
        }
    }

    /// Marks the start of a new frame.
    pub fn start_frame(&self) {
        self.frame_start_us
            .store(self.micros_since_epoch(), Ordering::Relaxed);
    }

    /// Sets the budget of a section, in microseconds.
    pub fn set_section_budget(&self, section: FrameSection, budget_us: u64) {
        self.budgets_us[section.index()].store(budget_us, Ordering::Relaxed);
    }

    /// Returns the budget of a section, in microseconds.
    pub fn section_budget(&self, section: FrameSection) -> u64 {
        self.budgets_us[section.index()].load(Ordering::Relaxed)
    }

    /// Time elapsed since the last [`FrameTimer::start_frame`], in microseconds.
    pub fn elapsed_in_frame_us(&self) -> u64 {
        self.micros_since_epoch()
            .saturating_sub(self.frame_start_us.load(Ordering::Relaxed))
    }

    /// Whether the time spent in this frame has reached the section's budget.
    ///
    /// A budget of `0` is always exceeded; [`FrameTimer::UNLIMITED`] never is.
    pub fn is_time_budget_exceeded(&self, section: FrameSection) -> bool {
        let budget = self.section_budget(section);
        budget != Self::UNLIMITED && self.elapsed_in_frame_us() >= budget
    }

    fn micros_since_epoch(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_advances() {
        let stopwatch = Stopwatch::new();
        std::thread::sleep(Duration::from_millis(2));
        assert!(stopwatch.elapsed() >= Duration::from_millis(2));
        assert!(stopwatch.elapsed_us() >= 2_000);
    }

    #[test]
    fn test_budgets_default_to_unlimited() {
        let timer = FrameTimer::new();
        timer.start_frame();
        assert_eq!(
            timer.section_budget(FrameSection::ResourcesUpload),
            FrameTimer::UNLIMITED
        );
        assert!(!timer.is_time_budget_exceeded(FrameSection::ResourcesUpload));
    }

    #[test]
    fn test_zero_budget_is_always_exceeded() {
        let timer = FrameTimer::new();
        timer.set_section_budget(FrameSection::ResourcesUpload, 0);
        timer.start_frame();
        assert!(timer.is_time_budget_exceeded(FrameSection::ResourcesUpload));
    }

    #[test]
    fn test_start_frame_resets_the_clock() {
        let timer = FrameTimer::new();
        timer.set_section_budget(FrameSection::ResourcesUpload, 5_000);
        timer.start_frame();
        std::thread::sleep(Duration::from_millis(6));
        assert!(timer.is_time_budget_exceeded(FrameSection::ResourcesUpload));

        timer.start_frame();
        assert!(!timer.is_time_budget_exceeded(FrameSection::ResourcesUpload));
    }
}
