//! Playback session
//!
//! Owns everything one playback timeline needs: the loaded track, the
//! decoder, the envelope state, the scheduler, the user controls and the
//! voice sink. Sessions are independent; several can run side by side.
//!
//! A session does not own a timer. Whoever drives it (the [`LivePlayer`]
//! worker, the offline renderer, a test) calls [`wake`](PlaybackSession::wake)
//! on its own cadence.
//!
//! [`LivePlayer`]: crate::live::LivePlayer

use crate::config::PlayerConfig;
use crate::decoder::{ChipConfig, RegisterDecoder, UserControls, VoiceTargets};
use crate::envelope::EnvelopeState;
use crate::format;
use crate::scheduler::{LookaheadScheduler, SchedulerState, TickBatch};
use crate::track::Track;
use crate::voices::VoiceSink;
use crate::Result;

/// One independent playback timeline driving a [`VoiceSink`]
#[derive(Debug)]
pub struct PlaybackSession<S: VoiceSink> {
    sink: S,
    track: Option<Track>,
    chip: ChipConfig,
    decoder: RegisterDecoder,
    envelope: EnvelopeState,
    scheduler: LookaheadScheduler,
    controls: UserControls,
}

impl<S: VoiceSink> PlaybackSession<S> {
    /// Create an empty session
    pub fn new(sink: S, config: &PlayerConfig) -> Self {
        PlaybackSession {
            sink,
            track: None,
            chip: config.chip.clone(),
            decoder: RegisterDecoder::new(config.chip.clone()),
            envelope: EnvelopeState::new(),
            scheduler: LookaheadScheduler::new(
                1.0 / crate::track::DEFAULT_TICK_RATE,
                config.lead_window_secs,
            ),
            controls: UserControls::default(),
        }
    }

    /// Replace the track, stopping any playback first
    ///
    /// The sink is reset even when the previous track already ran to its
    /// end, so nothing from it keeps sounding.
    pub fn load(&mut self, track: Track) {
        if !self.stop() && self.track.is_some() {
            self.sink.reset();
        }
        self.decoder = RegisterDecoder::new(self.chip.for_track(&track));
        self.scheduler.set_tick_period(track.tick_period());
        self.envelope.reset();
        log::info!(
            "loaded {} track: {} frames @ {} Hz",
            track.info().format,
            track.len(),
            track.rate()
        );
        self.track = Some(track);
    }

    /// Decode container bytes and load the result
    ///
    /// On error the previously loaded track stays loaded.
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<()> {
        let track = format::load_track(data)?;
        self.load(track);
        Ok(())
    }

    /// Start playback at the sink's current audio-clock time
    pub fn play(&mut self) -> bool {
        let now = self.sink.current_time();
        self.play_at(now)
    }

    /// Start playback with the first tick due at `now`
    ///
    /// No-op (false) when already playing or the track is missing or empty.
    pub fn play_at(&mut self, now: f64) -> bool {
        let len = self.track.as_ref().map_or(0, Track::len);
        if !self.scheduler.start(now, len) {
            log::debug!("play ignored: playing={}, frames={}", self.is_playing(), len);
            return false;
        }
        self.envelope.reset();
        log::info!("playback started at {now:.3}s");
        true
    }

    /// Stop playback and silence the sink
    ///
    /// No-op (false) when not playing. User controls are kept.
    pub fn stop(&mut self) -> bool {
        if !self.scheduler.stop() {
            return false;
        }
        self.envelope.reset();
        self.sink.reset();
        log::info!("playback stopped at frame {}", self.scheduler.frame_index());
        true
    }

    /// Replace mute flags and volumes; takes effect from the next decoded frame
    pub fn set_controls(&mut self, controls: UserControls) {
        self.controls = controls.clamped();
    }

    /// Current user controls (clamped)
    pub fn controls(&self) -> &UserControls {
        &self.controls
    }

    /// Run one scheduler wake-up at the sink's current audio-clock time
    pub fn wake(&mut self) -> TickBatch {
        let now = self.sink.current_time();
        self.wake_at(now)
    }

    /// Run one scheduler wake-up at audio-clock time `now`
    pub fn wake_at(&mut self, now: f64) -> TickBatch {
        self.wake_with(now, |_, _, _| {})
    }

    /// Run one wake-up, reporting every decoded frame to `observer`
    ///
    /// The observer sees `(frame_index, due_time, targets)` after the targets
    /// have been handed to the sink.
    pub fn wake_with<F>(&mut self, now: f64, mut observer: F) -> TickBatch
    where
        F: FnMut(usize, f64, &VoiceTargets),
    {
        let PlaybackSession {
            sink,
            track,
            decoder,
            envelope,
            scheduler,
            controls,
            ..
        } = self;
        let Some(track) = track.as_ref() else {
            return TickBatch::default();
        };

        let batch = scheduler.pump(track.frames(), now, |index, frame, due| {
            let targets = decoder.decode(frame, envelope, controls, due);
            sink.apply_targets(&targets, due);
            observer(index, due, &targets);
        });

        if batch.finished {
            log::info!("end of track after {} frames", track.len());
        }
        batch
    }

    /// Loaded track
    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Scheduler transport state
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// True while the scheduler is emitting frames
    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Index of the next frame to be scheduled
    pub fn position(&self) -> usize {
        self.scheduler.frame_index()
    }

    /// Scheduler (read-only)
    pub fn scheduler(&self) -> &LookaheadScheduler {
        &self.scheduler
    }

    /// Envelope generator state (read-only)
    pub fn envelope(&self) -> &EnvelopeState {
        &self.envelope
    }

    /// Decoder in use for the loaded track
    pub fn decoder(&self) -> &RegisterDecoder {
        &self.decoder
    }

    /// Voice sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Voice sink (mutable)
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the session, returning the sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Channel;
    use crate::track::RegisterFrame;

    #[derive(Debug, Default)]
    struct Recorder {
        applied: Vec<(f64, VoiceTargets)>,
        resets: usize,
        clock: f64,
    }

    impl VoiceSink for Recorder {
        fn apply_targets(&mut self, targets: &VoiceTargets, at: f64) {
            self.applied.push((at, *targets));
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn current_time(&self) -> f64 {
            self.clock
        }
    }

    fn tone_a_track(frames: usize) -> Track {
        let mut regs = [0u8; 14];
        regs[7] = 0x3E;
        regs[8] = 0x0F;
        Track::new(vec![RegisterFrame::new(regs); frames], 50.0).unwrap()
    }

    fn session() -> PlaybackSession<Recorder> {
        PlaybackSession::new(Recorder::default(), &PlayerConfig::default())
    }

    #[test]
    fn test_play_without_track_is_noop() {
        let mut s = session();
        assert!(!s.play());
        assert_eq!(s.state(), SchedulerState::Stopped);
        assert_eq!(s.wake_at(1.0), TickBatch::default());
    }

    #[test]
    fn test_stop_resets_sink_once() {
        let mut s = session();
        s.load(tone_a_track(10));
        assert!(s.play());
        assert!(!s.play());
        assert!(s.stop());
        assert!(!s.stop());
        assert_eq!(s.sink().resets, 1);
    }

    #[test]
    fn test_frames_stamped_with_due_time() {
        let mut s = session();
        s.load(tone_a_track(10));
        s.sink_mut().clock = 1.0;
        s.play();
        s.wake();
        let times: Vec<f64> = s.sink().applied.iter().map(|(t, _)| *t).collect();
        assert_eq!(times.len(), 4);
        assert!((times[1] - 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_controls_apply_from_next_frame() {
        let mut s = session();
        s.load(tone_a_track(100));
        s.play_at(0.0);
        s.wake_at(0.0);
        let before = s.sink().applied.len();

        let mut controls = UserControls::default();
        controls.channel_mut(Channel::A).muted = true;
        s.set_controls(controls);
        s.wake_at(0.1);

        let applied = &s.sink().applied;
        assert_eq!(applied[before - 1].1.tone(Channel::A).gain, 1.0);
        assert!(applied[before..]
            .iter()
            .all(|(_, t)| t.tone(Channel::A).gain == 0.0));
    }

    #[test]
    fn test_failed_load_keeps_previous_track() {
        let mut s = session();
        s.load(tone_a_track(5));
        assert!(s.load_bytes(b"YM2!garbage").is_err());
        assert_eq!(s.track().map(Track::len), Some(5));
        assert!(s.play());
    }

    #[test]
    fn test_load_stops_current_playback() {
        let mut s = session();
        s.load(tone_a_track(50));
        s.play_at(0.0);
        s.wake_at(0.0);
        s.load(tone_a_track(20));
        assert!(!s.is_playing());
        assert_eq!(s.sink().resets, 1);
        assert!(s.play_at(3.0));
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn test_load_after_natural_end_resets_sink() {
        let mut s = session();
        s.load(tone_a_track(3));
        s.play_at(0.0);
        assert!(s.wake_at(0.0).finished);
        assert!(!s.stop());
        assert_eq!(s.sink().resets, 0);

        s.load(tone_a_track(3));
        assert_eq!(s.sink().resets, 1);
    }
}
