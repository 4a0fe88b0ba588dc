//! Lookahead frame scheduler
//!
//! Converts a track's logical ticks into calls against the audio clock. Each
//! wake-up emits every frame whose virtual due time falls inside
//! `now + lead_window`, then advances the virtual clock by one tick period
//! per frame. Pacing by virtual tick time keeps long runs locked to the
//! nominal rate no matter how jittery the wake-ups are.
//!
//! Frames are handed out together with their due time so the voice bank can
//! apply them at that exact sample instead of at wake-up time.

use crate::track::RegisterFrame;

/// Default lead window in seconds
pub const DEFAULT_LEAD_WINDOW: f64 = 0.08;

/// Scheduler transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Not emitting frames
    #[default]
    Stopped,
    /// Emitting frames on every wake-up
    Playing,
}

/// Outcome of one wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickBatch {
    /// Index of the first frame emitted
    pub first_frame: usize,
    /// Frames emitted in this batch
    pub applied: usize,
    /// The batch emitted the last frame and stopped the scheduler
    pub finished: bool,
    /// The virtual clock fell behind and was re-aligned to `now`
    pub realigned: bool,
}

/// Frame pacing state
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    frame_index: usize,
    next_tick: f64,
    lead_window: f64,
    tick_period: f64,
    state: SchedulerState,
}

impl LookaheadScheduler {
    /// Create a stopped scheduler
    ///
    /// Non-positive or non-finite arguments fall back to 50 Hz and the
    /// default lead window.
    pub fn new(tick_period: f64, lead_window: f64) -> Self {
        let mut scheduler = LookaheadScheduler {
            frame_index: 0,
            next_tick: 0.0,
            lead_window: DEFAULT_LEAD_WINDOW,
            tick_period: 1.0 / crate::track::DEFAULT_TICK_RATE,
            state: SchedulerState::Stopped,
        };
        scheduler.set_tick_period(tick_period);
        if lead_window.is_finite() && lead_window >= 0.0 {
            scheduler.lead_window = lead_window;
        }
        scheduler
    }

    /// Change the tick period (takes effect from the next tick)
    pub fn set_tick_period(&mut self, tick_period: f64) {
        if tick_period.is_finite() && tick_period > 0.0 {
            self.tick_period = tick_period;
        }
    }

    /// Transport state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// True while playing
    pub fn is_playing(&self) -> bool {
        self.state == SchedulerState::Playing
    }

    /// Next frame to emit
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Virtual due time of the next frame
    pub fn next_tick_time(&self) -> f64 {
        self.next_tick
    }

    /// Lead window in seconds
    pub fn lead_window(&self) -> f64 {
        self.lead_window
    }

    /// Seconds per tick
    pub fn tick_period(&self) -> f64 {
        self.tick_period
    }

    /// Upper bound of frames a single wake-up can emit
    pub fn max_batch(&self) -> usize {
        (self.lead_window / self.tick_period).ceil() as usize + 2
    }

    /// Start from frame 0 with the first tick due at `now`
    ///
    /// No-op (returns false) if already playing or `frame_count` is 0.
    pub fn start(&mut self, now: f64, frame_count: usize) -> bool {
        if self.is_playing() || frame_count == 0 {
            return false;
        }
        self.frame_index = 0;
        self.next_tick = if now.is_finite() { now.max(0.0) } else { 0.0 };
        self.state = SchedulerState::Playing;
        true
    }

    /// Stop; returns false if already stopped
    pub fn stop(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.state = SchedulerState::Stopped;
        true
    }

    /// Handle one wake-up at audio-clock time `now`
    ///
    /// Calls `apply(index, frame, due_time)` for every frame due before
    /// `now + lead_window`, in order. When the last frame has been emitted the
    /// scheduler stops; the output is left as last set.
    pub fn pump<F>(&mut self, frames: &[RegisterFrame], now: f64, mut apply: F) -> TickBatch
    where
        F: FnMut(usize, &RegisterFrame, f64),
    {
        let mut batch = TickBatch {
            first_frame: self.frame_index,
            ..TickBatch::default()
        };
        if !self.is_playing() {
            return batch;
        }

        // A wake-up missed by more than a tick would otherwise emit a burst
        // of stale frames; skip the virtual clock forward instead.
        if now.is_finite() && self.next_tick < now - self.tick_period {
            log::warn!(
                "scheduler fell behind by {:.1} ms at frame {}, re-aligning",
                (now - self.next_tick) * 1000.0,
                self.frame_index
            );
            self.next_tick = now;
            batch.realigned = true;
        }

        let horizon = now + self.lead_window;
        while self.next_tick < horizon && self.frame_index < frames.len() {
            let index = self.frame_index;
            log::trace!("tick {} due at {:.4}s", index, self.next_tick);
            apply(index, &frames[index], self.next_tick);
            self.frame_index += 1;
            self.next_tick += self.tick_period;
            batch.applied += 1;
        }

        if self.frame_index >= frames.len() {
            self.state = SchedulerState::Stopped;
            batch.finished = true;
        }
        batch
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        LookaheadScheduler::new(
            1.0 / crate::track::DEFAULT_TICK_RATE,
            DEFAULT_LEAD_WINDOW,
        )
    }
}
