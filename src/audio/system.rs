//! Audio session managing device streams, the slot queue and worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::activity::Activity;
use super::analysis::spawn_analysis_thread;
use super::feeder::spawn_feeder_thread;
use super::synthesis::{ToneControl, ToneGenerator};
use super::{ProcessingMode, Scope};
use crate::backend::{
    AudioBackend, AudioStream, CaptureCallback, PlaybackCallback, StreamSpec,
};
use crate::bridge::{
    CaptureBridge, DecodedAudio, DecodedReader, EndOfInput, PlaybackBridge, SampleSource,
};
use crate::error::{BackendError, SessionError};
use crate::fft::{self, FftContext};
use crate::params::PipelineConfig;
use crate::queue::{QueueControl, SlotQueue, Transform};

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// No resources held
    #[default]
    Closed,
    /// Streams and workers exist but no samples flow
    Open,
    /// Samples flow from the source through the queue
    Running,
}

/// Where captured frames go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Forward-transform on push; an analysis thread publishes the spectrum
    #[default]
    Analyze,
    /// Send frames to the playback stream, tagged with `transform`
    Playback { transform: Transform },
}

/// Where samples come from
#[derive(Debug, Clone, Default)]
pub enum SignalSource {
    /// Default input device
    #[default]
    Capture,
    /// Pre-decoded audio, paced to the configured sample rate
    Decoded {
        audio: Arc<DecodedAudio>,
        end: EndOfInput,
    },
    /// Synthesized test tone
    Tone(ToneControl),
}

/// Everything needed to open a session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    pub source: SignalSource,
    pub route: Route,
    pub mode: ProcessingMode,
}

/// Resources that exist between `init` and `close`
struct SessionData<S: AudioStream> {
    capture: Option<S>,
    playback: Option<S>,
    queue: QueueControl,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    activity: Activity,
    workers: Vec<thread::JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl<S: AudioStream> SessionData<S> {
    fn new(queue: QueueControl, shutdown_timeout: Duration) -> Self {
        Self {
            capture: None,
            playback: None,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            activity: Activity::new(),
            workers: Vec::new(),
            shutdown_timeout,
        }
    }

    fn streams(&self) -> impl Iterator<Item = &S> {
        self.capture.iter().chain(self.playback.iter())
    }

    fn resume(&self) -> Result<(), BackendError> {
        for stream in self.streams() {
            if let Err(e) = stream.resume() {
                self.suspend();
                return Err(e);
            }
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn suspend(&self) {
        self.running.store(false, Ordering::Release);
        for stream in self.streams() {
            if let Err(e) = stream.suspend() {
                log::warn!("{}", e);
            }
        }
    }

    /// Release waiters, wait for in-flight work to drain, then free everything.
    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        self.queue.disable();

        if self.activity.wait_idle(self.shutdown_timeout) {
            for worker in self.workers.drain(..) {
                if worker.join().is_err() {
                    log::error!("Worker thread panicked");
                }
            }
        } else {
            log::warn!(
                "{} callback(s) or worker(s) still active after {:?}; detaching",
                self.activity.in_flight(),
                self.shutdown_timeout
            );
            self.workers.clear();
        }

        self.capture.take();
        self.playback.take();
    }
}

impl<S: AudioStream> Drop for SessionData<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One capture/analysis/playback pipeline and its lifecycle.
///
/// `init` opens everything in a paused state, `start`/`pause` toggle sample
/// flow, and `close` tears it down. Calls made in the wrong state are ignored.
pub struct Session<B: AudioBackend> {
    backend: B,
    config: SessionConfig,
    status: Status,
    scope: Arc<Scope>,
    data: Option<SessionData<B::Stream>>,
}

impl<B: AudioBackend> Session<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        let scope = Arc::new(Scope::new(
            config.mode,
            fft::bin_count(config.pipeline.fft_size),
            config.pipeline.fft_size,
        ));
        Self {
            backend,
            config,
            status: Status::Closed,
            scope,
            data: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Display surface fed by this session
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn mode(&self) -> ProcessingMode {
        self.scope.mode()
    }

    /// Switch the recorded metric; takes effect on the next chunk
    pub fn set_mode(&self, mode: ProcessingMode) {
        self.scope.set_mode(mode);
    }

    /// Control handle of the test tone, if that is the source
    pub fn tone(&self) -> Option<&ToneControl> {
        match &self.config.source {
            SignalSource::Tone(control) => Some(control),
            _ => None,
        }
    }

    /// Frames waiting in the queue, if open
    pub fn queued_frames(&self) -> Option<usize> {
        self.data.as_ref().map(|data| data.queue.len())
    }

    /// Closed -> Open. Builds the queue, streams and workers, all paused.
    ///
    /// Does nothing unless closed. On error the session stays closed with
    /// nothing left allocated.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.status != Status::Closed {
            log::debug!("init ignored: session is {:?}", self.status);
            return Ok(());
        }

        match self.open() {
            Ok(data) => {
                self.data = Some(data);
                self.status = Status::Open;
                log::info!(
                    "Session open: {} -> {:?}, FFT {} @ {}Hz",
                    source_name(&self.config.source),
                    self.config.route,
                    self.config.pipeline.fft_size,
                    self.config.pipeline.sample_rate_hz
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Session init failed: {}", e);
                Err(e)
            }
        }
    }

    /// Open -> Running
    pub fn start(&mut self) {
        if self.status != Status::Open {
            log::debug!("start ignored: session is {:?}", self.status);
            return;
        }
        let Some(data) = self.data.as_ref() else {
            return;
        };
        if let Err(e) = data.resume() {
            log::error!("{}", e);
            return;
        }
        self.status = Status::Running;
        log::info!("Session running");
    }

    /// Running -> Open
    pub fn pause(&mut self) {
        if self.status != Status::Running {
            log::debug!("pause ignored: session is {:?}", self.status);
            return;
        }
        if let Some(data) = self.data.as_ref() {
            data.suspend();
        }
        self.status = Status::Open;
        log::info!("Session paused");
    }

    /// Running/Open -> Closed. Pauses first if running.
    pub fn close(&mut self) {
        if self.status == Status::Running {
            self.pause();
        }
        if self.status != Status::Open {
            log::debug!("close ignored: session is {:?}", self.status);
            return;
        }
        if let Some(mut data) = self.data.take() {
            data.shutdown();
        }
        self.status = Status::Closed;
        log::info!("Session closed");
    }

    fn open(&mut self) -> Result<SessionData<B::Stream>, SessionError> {
        let pipeline = self.config.pipeline.clone();
        pipeline.validate()?;

        let spec = StreamSpec {
            sample_rate_hz: pipeline.sample_rate_hz,
            chunk_size: pipeline.chunk_size,
        };
        let queue = SlotQueue::new(pipeline.queue_depth, pipeline.fft_size, pipeline.wait)?;
        let mut data = SessionData::new(queue.control(), pipeline.shutdown_timeout());
        let (producer, consumer) = queue.split()?;

        // Consumer side first so nothing is pushed without a reader
        let push_transform = match self.config.route {
            Route::Analyze => {
                let ctx = FftContext::new(pipeline.fft_size)?;
                let busy = data.activity.enter();
                let worker = spawn_analysis_thread(consumer, ctx, Arc::clone(&self.scope), busy)?;
                data.workers.push(worker);
                Transform::Forward
            }
            Route::Playback { transform } => {
                let mut bridge = PlaybackBridge::new(consumer);
                let activity = data.activity.clone();
                let callback: PlaybackCallback = Box::new(move |out: &mut [f32]| {
                    let _busy = activity.enter();
                    // Disabled means shutdown; the bridge already wrote silence
                    let _ = bridge.read(out);
                });
                data.playback = Some(self.backend.open_playback(&spec, callback)?);
                transform
            }
        };

        let mut bridge = CaptureBridge::new(producer, push_transform, Arc::clone(&self.scope));
        let source: Box<dyn SampleSource> = match &self.config.source {
            SignalSource::Capture => {
                let activity = data.activity.clone();
                let callback: CaptureCallback = Box::new(move |chunk: &[f32]| {
                    let _busy = activity.enter();
                    let _ = bridge.write(chunk);
                });
                data.capture = Some(self.backend.open_capture(&spec, callback)?);
                return Ok(data);
            }
            SignalSource::Decoded { audio, end } => {
                if audio.sample_rate_hz() != pipeline.sample_rate_hz {
                    log::warn!(
                        "Decoded audio is {}Hz, session runs at {}Hz",
                        audio.sample_rate_hz(),
                        pipeline.sample_rate_hz
                    );
                }
                Box::new(DecodedReader::new(Arc::clone(audio), *end))
            }
            SignalSource::Tone(control) => {
                Box::new(ToneGenerator::new(control.clone(), pipeline.fft_size))
            }
        };

        let busy = data.activity.enter();
        let worker = spawn_feeder_thread(
            source,
            bridge,
            pipeline.chunk_size,
            pipeline.chunk_period(),
            Arc::clone(&data.running),
            Arc::clone(&data.stop),
            busy,
        )?;
        data.workers.push(worker);
        Ok(data)
    }
}

impl<B: AudioBackend> Drop for Session<B> {
    fn drop(&mut self) {
        if self.status != Status::Closed {
            self.close();
        }
    }
}

fn source_name(source: &SignalSource) -> &'static str {
    match source {
        SignalSource::Capture => "capture",
        SignalSource::Decoded { .. } => "decoded",
        SignalSource::Tone(_) => "tone",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WaveForm;
    use crate::backend::ManualBackend;
    use crate::error::ConfigError;
    use crate::queue::WaitKind;
    use std::f32::consts::PI;
    use std::time::Instant;

    fn pipeline(fft_size: usize, chunk_size: usize) -> PipelineConfig {
        PipelineConfig {
            sample_rate_hz: 8000,
            chunk_size,
            fft_size,
            queue_depth: 4,
            wait: WaitKind::Blocking { timeout_ms: 1 },
            shutdown_timeout_ms: 2000,
        }
    }

    fn session(
        source: SignalSource,
        route: Route,
        fft_size: usize,
        chunk_size: usize,
    ) -> (Session<ManualBackend>, ManualBackend) {
        let backend = ManualBackend::new();
        let config = SessionConfig {
            pipeline: pipeline(fft_size, chunk_size),
            source,
            route,
            mode: ProcessingMode::Raw,
        };
        (Session::new(backend.clone(), config), backend)
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    fn sine(cycles: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (mut session, backend) = session(SignalSource::Capture, Route::Analyze, 64, 16);
        assert_eq!(session.status(), Status::Closed);

        // Ignored while closed
        session.start();
        session.pause();
        session.close();
        assert_eq!(session.status(), Status::Closed);

        session.init().unwrap();
        assert_eq!(session.status(), Status::Open);
        assert!(backend.capture_open());
        assert_eq!(
            backend.last_spec(),
            Some(StreamSpec {
                sample_rate_hz: 8000,
                chunk_size: 16
            })
        );

        // Second init is a no-op
        session.init().unwrap();
        session.pause();
        assert_eq!(session.status(), Status::Open);

        session.start();
        assert_eq!(session.status(), Status::Running);
        session.start();
        assert_eq!(session.status(), Status::Running);

        session.pause();
        assert_eq!(session.status(), Status::Open);
        session.start();

        session.close();
        assert_eq!(session.status(), Status::Closed);
        assert!(!backend.capture_open());
        assert_eq!(session.queued_frames(), None);
    }

    #[test]
    fn test_no_samples_flow_while_open() {
        let (mut session, backend) = session(SignalSource::Capture, Route::Analyze, 64, 16);
        session.init().unwrap();
        assert!(!backend.feed(&[0.5; 16]));
        session.start();
        assert!(backend.feed(&[0.5; 16]));
        session.pause();
        assert!(!backend.feed(&[0.5; 16]));
    }

    #[test]
    fn test_invalid_config_stays_closed() {
        let (mut session, backend) = session(SignalSource::Capture, Route::Analyze, 1000, 16);
        let err = session.init().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Config(ConfigError::NotPowerOfTwo { value: 1000, .. })
        ));
        assert_eq!(session.status(), Status::Closed);
        assert!(!backend.capture_open());
    }

    #[test]
    fn test_device_failure_releases_partial_state() {
        let (mut session, backend) = session(
            SignalSource::Capture,
            Route::Playback {
                transform: Transform::None,
            },
            64,
            16,
        );
        backend.fail_capture(true);

        // Playback opens first, then capture fails
        assert!(matches!(
            session.init(),
            Err(SessionError::Backend(BackendError::NoDevice("input")))
        ));
        assert_eq!(session.status(), Status::Closed);
        assert!(!backend.playback_open());

        backend.fail_capture(false);
        session.init().unwrap();
        assert_eq!(session.status(), Status::Open);
        assert!(backend.playback_open());
        assert!(backend.capture_open());
    }

    #[test]
    fn test_capture_spectrum_reaches_scope() {
        let (mut session, backend) = session(SignalSource::Capture, Route::Analyze, 256, 64);
        session.init().unwrap();
        session.start();

        let frame = sine(16.0, 256);
        for chunk in frame.chunks(64) {
            assert!(backend.feed(chunk));
        }

        let scope = Arc::clone(session.scope());
        assert!(wait_for(|| scope.stats().spectra >= 1));
        let (bin, magnitude) = scope.peak_bin().unwrap();
        assert_eq!(bin, 15);
        assert!((magnitude - 128.0).abs() < 1.0);

        let mut history = Vec::new();
        assert_eq!(scope.read_samples(&mut history), 256);
        assert!((history[4] - frame[4]).abs() < 1e-6);

        session.close();
        assert_eq!(session.status(), Status::Closed);
    }

    #[test]
    fn test_filter_route_round_trip() {
        let (mut session, backend) = session(
            SignalSource::Capture,
            Route::Playback {
                transform: Transform::RoundTrip,
            },
            16,
            8,
        );
        session.init().unwrap();
        session.start();

        let input: Vec<f32> = sine(2.0, 16).iter().map(|x| x * 0.25).collect();
        assert!(backend.feed(&input[..8]));
        assert!(backend.feed(&input[8..]));

        let mut out = vec![0.0_f32; 8];
        let mut played = Vec::new();
        for _ in 0..2 {
            assert!(backend.render(&mut out));
            played.extend_from_slice(&out);
        }

        // Round trip returns the peak-normalized input
        for (got, want) in played.iter().zip(input.iter()) {
            assert!((got - want * 4.0).abs() < 1e-3, "{} vs {}", got, want * 4.0);
        }
        session.close();
    }

    #[test]
    fn test_close_releases_blocked_playback() {
        let (mut session, backend) = session(
            SignalSource::Capture,
            Route::Playback {
                transform: Transform::None,
            },
            16,
            8,
        );
        session.init().unwrap();
        session.start();

        // Nothing captured yet, so the playback callback waits on the queue
        let renderer = backend.clone();
        let render = thread::spawn(move || {
            let mut out = [1.0_f32; 8];
            let called = renderer.render(&mut out);
            (called, out)
        });
        thread::sleep(Duration::from_millis(20));

        session.close();
        assert_eq!(session.status(), Status::Closed);

        let (called, out) = render.join().unwrap();
        assert!(called);
        assert_eq!(out, [0.0; 8]);
        assert!(!backend.playback_open());
    }

    #[test]
    fn test_tone_source_analysis() {
        // Half-period 4 at N = 64: 8 cycles per frame
        let tone = ToneControl::new(WaveForm::Square, 2.0 / 30.0);
        let (mut session, _backend) =
            session(SignalSource::Tone(tone.clone()), Route::Analyze, 64, 16);
        assert!(session.tone().is_some());

        session.init().unwrap();
        let scope = Arc::clone(session.scope());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(scope.stats().frames, 0);

        session.start();
        assert!(wait_for(|| scope.stats().spectra >= 2));
        assert_eq!(scope.peak_bin().map(|(i, _)| i), Some(7));

        session.close();
        assert_eq!(session.status(), Status::Closed);
    }

    #[test]
    fn test_decoded_source_analysis() {
        let audio = Arc::new(DecodedAudio::from_samples(sine(4.0, 64).repeat(4), 8000));
        let (mut session, _backend) = session(
            SignalSource::Decoded {
                audio,
                end: EndOfInput::Loop,
            },
            Route::Analyze,
            64,
            32,
        );
        assert!(session.tone().is_none());
        session.set_mode(ProcessingMode::ChunkInfo);
        session.init().unwrap();
        session.start();

        let scope = Arc::clone(session.scope());
        assert!(wait_for(|| scope.stats().spectra >= 2));
        assert_eq!(scope.peak_bin().map(|(i, _)| i), Some(3));
        assert_eq!(scope.stats().chunk_samples, 32);
        assert_eq!(session.mode(), ProcessingMode::ChunkInfo);
    }

    #[test]
    fn test_reinit_after_close() {
        let (mut session, backend) = session(SignalSource::Capture, Route::Analyze, 64, 16);
        for _ in 0..3 {
            session.init().unwrap();
            session.start();
            assert!(backend.feed(&[0.1; 16]));
            session.close();
            assert!(!backend.capture_open());
        }
    }
}
