//! Live player
//!
//! Drives a [`PlaybackSession`] from a worker thread woken every
//! `poll_interval`. The audio clock is whatever the shared voice bank has
//! rendered so far, so the worker simply keeps the bank's event queue
//! `lead_window` ahead of the audio callback.
//!
//! Only one wake-up batch runs at a time (the session lives behind a mutex),
//! and a stop request is observed at the top of the next wake-up. Stopping
//! waits for an in-flight batch and joins the worker before the sink is
//! silenced.

use crate::analyser::AnalyserTap;
use crate::config::PlayerConfig;
use crate::decoder::UserControls;
use crate::format;
use crate::scheduler::SchedulerState;
use crate::session::PlaybackSession;
use crate::track::Track;
use crate::voices::{SharedVoiceBank, VoiceBank, VoiceSink};
use crate::{ReplayError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type SharedSession = Arc<Mutex<PlaybackSession<SharedVoiceBank>>>;

/// Threaded player around a shared voice bank
pub struct LivePlayer {
    session: SharedSession,
    bank: SharedVoiceBank,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl LivePlayer {
    /// Create a stopped player with an empty session
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let bank = SharedVoiceBank::new(VoiceBank::with_analyser(
            config.sample_rate,
            config.event_queue_capacity,
            config.analyser_size,
        )?);
        let session = PlaybackSession::new(bank.clone(), &config);
        Ok(LivePlayer {
            session: Arc::new(Mutex::new(session)),
            bank,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            poll_interval: Duration::from_secs_f64(config.poll_interval_secs),
        })
    }

    /// Replace the track; stops the current one first
    pub fn load(&self, track: Track) {
        self.stop();
        self.session.lock().load(track);
    }

    /// Decode container bytes and load them
    ///
    /// A decode failure leaves the current track loaded and playing.
    pub fn load_bytes(&self, data: &[u8]) -> Result<()> {
        let track = format::load_track(data)?;
        self.load(track);
        Ok(())
    }

    /// Start playback and the wake-up worker
    ///
    /// No-op (false) if already playing or the track is empty.
    pub fn play(&self) -> bool {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if self.session.lock().is_playing() {
                *worker = Some(handle);
                return false;
            }
            // previous track ended on its own; the worker is on its way out
            if handle.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }

        if !self.session.lock().play() {
            return false;
        }

        self.running.store(true, Ordering::Release);
        let session = Arc::clone(&self.session);
        let running = Arc::clone(&self.running);
        let poll = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("psg-scheduler".into())
            .spawn(move || run_worker(session, running, poll));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(e) => {
                log::error!("cannot spawn scheduler thread: {e}");
                self.running.store(false, Ordering::Release);
                self.session.lock().stop();
                false
            }
        }
    }

    /// Stop playback, wait for the worker and silence the voices
    ///
    /// No-op (false) when nothing is playing.
    pub fn stop(&self) -> bool {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }
        self.session.lock().stop()
    }

    /// Replace mute flags and volume scalars
    pub fn set_controls(&self, controls: UserControls) {
        self.session.lock().set_controls(controls);
    }

    /// Current user controls
    pub fn controls(&self) -> UserControls {
        *self.session.lock().controls()
    }

    /// Scheduler state
    pub fn state(&self) -> SchedulerState {
        self.session.lock().state()
    }

    /// True while frames are being scheduled
    pub fn is_playing(&self) -> bool {
        self.session.lock().is_playing()
    }

    /// Next frame index and total frame count
    pub fn position(&self) -> (usize, usize) {
        let session = self.session.lock();
        (
            session.position(),
            session.track().map_or(0, Track::len),
        )
    }

    /// Loaded track (cloned)
    pub fn track(&self) -> Option<Track> {
        self.session.lock().track().cloned()
    }

    /// Voice bank to render audio from
    pub fn voice_bank(&self) -> &SharedVoiceBank {
        &self.bank
    }

    /// Post-mix analyser
    pub fn analyser(&self) -> &AnalyserTap {
        self.bank.analyser()
    }

    /// Audio-clock time in seconds
    pub fn current_time(&self) -> f64 {
        self.bank.current_time()
    }

    /// Wait until playback ends on its own or `timeout` passes
    pub fn wait_until_stopped(&self, timeout: Duration) -> Result<()> {
        let deadline = std::time::Instant::now() + timeout;
        while self.is_playing() {
            if std::time::Instant::now() >= deadline {
                return Err(ReplayError::Other("timed out waiting for end of track".into()));
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

impl Drop for LivePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(session: SharedSession, running: Arc<AtomicBool>, poll: Duration) {
    log::debug!("scheduler worker started, poll {:?}", poll);
    while running.load(Ordering::Acquire) {
        {
            let mut session = session.lock();
            if !running.load(Ordering::Acquire) {
                break;
            }
            session.wake();
            if !session.is_playing() {
                break;
            }
        }
        thread::park_timeout(poll);
    }
    running.store(false, Ordering::Release);
    log::debug!("scheduler worker exited");
}
