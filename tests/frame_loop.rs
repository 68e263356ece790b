use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use court_highlights::detect::{Detection, ObjectDetector, Pose, PoseEstimator};
use court_highlights::ingest::{FileConfig, FileSource};
use court_highlights::loader::{LoadedModels, ModelLoader, ModelSettings};
use court_highlights::moments::KeyMomentKind;
use court_highlights::overlay::{DisplayList, DrawOp};
use court_highlights::playback::{
    FrameLoop, LoopOptions, LoopState, PlaybackController, PlaybackEvent, SnapshotSettings,
    TickOutcome, VideoSource,
};
use court_highlights::{DetectionSession, VideoFrame};

/// Blank frames at 30 fps; optionally fails on one frame index.
struct ScriptedSource {
    len: u64,
    next: u64,
    fail_at: Option<u64>,
    restarts: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(len: u64) -> Self {
        Self {
            len,
            next: 0,
            fail_at: None,
            restarts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl VideoSource for ScriptedSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if Some(self.next) == self.fail_at {
            return Err(anyhow!("decoder stalled"));
        }
        if self.next >= self.len {
            return Ok(None);
        }
        let time = self.next as f64 / 30.0;
        self.next += 1;
        VideoFrame::new(vec![0u8; 8 * 8 * 3], 8, 8, time).map(Some)
    }

    fn restart(&mut self) -> Result<()> {
        self.next = 0;
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Counts calls; fails on the listed call numbers (1-based).
struct CountingDetector {
    calls: Arc<AtomicUsize>,
    fail_on: Vec<usize>,
}

impl ObjectDetector for CountingDetector {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<Detection>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(anyhow!("out of memory"));
        }
        Ok(Vec::new())
    }
}

struct NoPoses;

impl PoseEstimator for NoPoses {
    fn name(&self) -> &'static str {
        "none"
    }

    fn estimate_poses(&mut self, _frame: &VideoFrame) -> Result<Vec<Pose>> {
        Ok(Vec::new())
    }
}

fn session(calls: &Arc<AtomicUsize>, fail_on: Vec<usize>) -> DetectionSession {
    DetectionSession::new(LoadedModels::new(
        Box::new(CountingDetector {
            calls: calls.clone(),
            fail_on,
        }),
        Box::new(NoPoses),
    ))
}

fn unpaced() -> LoopOptions {
    LoopOptions {
        target_fps: 0,
        ..LoopOptions::default()
    }
}

#[test]
fn pause_stops_detector_calls_until_play() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(100),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        unpaced(),
    );
    let now = Instant::now();

    assert_eq!(frame_loop.tick(now), TickOutcome::Idle);
    frame_loop.handle_event(PlaybackEvent::Play, now);
    assert_eq!(frame_loop.state(), LoopState::Detecting);
    for _ in 0..3 {
        frame_loop.tick(now);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    frame_loop.handle_event(PlaybackEvent::Pause, now);
    assert_eq!(frame_loop.state(), LoopState::Idle);
    assert!(!frame_loop.ticker().is_pending());
    for _ in 0..5 {
        assert_eq!(frame_loop.tick(now), TickOutcome::Idle);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    frame_loop.handle_event(PlaybackEvent::Play, now);
    assert_eq!(
        frame_loop.tick(now),
        TickOutcome::Processed { frame_number: 4 }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn play_while_detecting_is_a_no_op() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(10),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions::default(),
    );
    let start = Instant::now();
    frame_loop.handle_event(PlaybackEvent::Play, start);
    frame_loop.tick(start);
    let deadline = frame_loop.ticker().deadline();
    assert!(deadline.is_some());

    frame_loop.handle_event(PlaybackEvent::Play, start + Duration::from_millis(1));
    assert_eq!(frame_loop.ticker().deadline(), deadline);
    assert_eq!(frame_loop.session().frames_processed(), 1);
}

#[test]
fn end_goes_idle_and_play_restarts_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = ScriptedSource::new(2);
    let restarts = source.restarts.clone();
    let mut frame_loop = FrameLoop::new(
        source,
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        unpaced(),
    );
    let now = Instant::now();

    frame_loop.handle_event(PlaybackEvent::Play, now);
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 1 });
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 2 });
    assert_eq!(frame_loop.tick(now), TickOutcome::Ended);
    assert_eq!(frame_loop.state(), LoopState::Idle);
    assert!(!frame_loop.ticker().is_pending());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    frame_loop.handle_event(PlaybackEvent::Play, now);
    assert_eq!(restarts.load(Ordering::SeqCst), 1);
    assert_eq!(frame_loop.session().frames_processed(), 0);
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 1 });
}

#[test]
fn loop_playback_restarts_without_stopping() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = ScriptedSource::new(1);
    let restarts = source.restarts.clone();
    let mut frame_loop = FrameLoop::new(
        source,
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions {
            loop_playback: true,
            ..unpaced()
        },
    );
    let now = Instant::now();

    frame_loop.handle_event(PlaybackEvent::Play, now);
    frame_loop.tick(now);
    assert_eq!(frame_loop.tick(now), TickOutcome::Restarted);
    assert_eq!(frame_loop.state(), LoopState::Detecting);
    assert_eq!(restarts.load(Ordering::SeqCst), 1);
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 1 });
}

#[test]
fn inference_failure_skips_frame_and_continues() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(5),
        session(&calls, vec![2]),
        DisplayList::new(8, 8),
        unpaced(),
    );
    let now = Instant::now();

    frame_loop.handle_event(PlaybackEvent::Play, now);
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 1 });
    assert_eq!(
        frame_loop.tick(now),
        TickOutcome::InferenceFailed { frame_number: 2 }
    );
    assert_eq!(frame_loop.state(), LoopState::Detecting);
    assert_eq!(frame_loop.tick(now), TickOutcome::Processed { frame_number: 3 });
    assert_eq!(frame_loop.summary().inference_failures, 1);
    assert_eq!(frame_loop.summary().frames_processed, 3);
}

#[test]
fn source_error_stops_playback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut source = ScriptedSource::new(10);
    source.fail_at = Some(1);
    let mut frame_loop = FrameLoop::new(
        source,
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        unpaced(),
    );
    let now = Instant::now();

    frame_loop.handle_event(PlaybackEvent::Play, now);
    frame_loop.tick(now);
    assert_eq!(frame_loop.tick(now), TickOutcome::SourceFailed);
    assert_eq!(frame_loop.state(), LoopState::Idle);
    let err = frame_loop.summary().playback_error.clone().expect("error");
    assert!(err.contains("decoder stalled"));
}

#[test]
fn overlay_redrawn_only_when_enabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hidden = FrameLoop::new(
        ScriptedSource::new(3),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions {
            show_overlay: false,
            ..unpaced()
        },
    );
    let now = Instant::now();
    hidden.handle_event(PlaybackEvent::Play, now);
    hidden.tick(now);
    assert!(hidden.canvas().ops().is_empty());

    let mut shown = FrameLoop::new(
        ScriptedSource::new(3),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        unpaced(),
    );
    shown.handle_event(PlaybackEvent::Play, now);
    shown.tick(now);
    shown.tick(now);
    let ops = shown.canvas().ops();
    assert!(matches!(ops[0], DrawOp::Clear));
    assert!(
        matches!(ops[1], DrawOp::DrawFrame { media_time, .. } if (media_time - 1.0 / 30.0).abs() < 1e-9)
    );
}

#[test]
fn snapshots_follow_configured_cadence() {
    let dir = tempfile::tempdir().expect("temp dir");
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(6),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions {
            snapshot: Some(SnapshotSettings {
                dir: dir.path().join("snapshots"),
                every: 3,
            }),
            ..unpaced()
        },
    );
    let now = Instant::now();
    frame_loop.handle_event(PlaybackEvent::Play, now);
    for _ in 0..6 {
        frame_loop.tick(now);
    }
    assert_eq!(frame_loop.summary().snapshots_written, 2);
    assert!(dir.path().join("snapshots/overlay-000003.json").exists());
    assert!(dir.path().join("snapshots/overlay-000006.json").exists());
}

#[test]
fn cancellation_ends_run_and_prevents_reschedule() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(10),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions {
            loop_playback: true,
            ..LoopOptions::default()
        },
    );
    let token = frame_loop.cancellation_token();
    let (controller, events) = PlaybackController::channel();
    controller.play().unwrap();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        token.cancel();
        // keep the controller alive until after cancellation
        drop(controller);
    });
    let summary = frame_loop.run(&events);
    canceller.join().unwrap();

    assert!(summary.frames_processed > 0);
    assert!(!frame_loop.ticker().is_pending());

    let before = calls.load(Ordering::SeqCst);
    assert_eq!(frame_loop.tick(Instant::now()), TickOutcome::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), before);
    assert!(!frame_loop.ticker().is_pending());
}

#[test]
fn run_returns_once_idle_without_controller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(12),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        unpaced(),
    );
    let (controller, events) = PlaybackController::channel();
    controller.play().unwrap();
    drop(controller);

    let summary = frame_loop.run(&events);
    assert_eq!(summary.frames_processed, 12);
    assert_eq!(frame_loop.state(), LoopState::Idle);
}

#[test]
fn pause_from_controller_thread_halts_paced_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = FrameLoop::new(
        ScriptedSource::new(10_000),
        session(&calls, Vec::new()),
        DisplayList::new(8, 8),
        LoopOptions {
            target_fps: 20,
            ..LoopOptions::default()
        },
    );
    let (controller, events) = PlaybackController::channel();

    let observed = calls.clone();
    let remote = std::thread::spawn(move || {
        controller.play().unwrap();
        let started = Instant::now();
        while observed.load(Ordering::SeqCst) < 3 {
            assert!(started.elapsed() < Duration::from_secs(5), "loop never ran");
            std::thread::sleep(Duration::from_millis(5));
        }
        // The loop is parked in recv_timeout on the next 50ms deadline.
        controller.pause().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let at_pause = observed.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        let later = observed.load(Ordering::SeqCst);
        (at_pause, later)
    });

    let summary = frame_loop.run(&events);
    let (at_pause, later) = remote.join().unwrap();

    assert!(at_pause >= 3);
    assert_eq!(later, at_pause, "detector ran after pause");
    assert_eq!(calls.load(Ordering::SeqCst), at_pause);
    assert_eq!(summary.frames_processed, at_pause as u64);
    assert_eq!(frame_loop.state(), LoopState::Idle);
    assert!(!frame_loop.ticker().is_pending());
}

#[test]
fn synthetic_court_yields_pass_then_jump() {
    let models = ModelLoader::new(ModelSettings::default())
        .load()
        .expect("cpu models");
    let mut source = FileSource::new(FileConfig {
        path: "stub://court".to_string(),
        ..FileConfig::default()
    })
    .expect("stub source");
    source.connect().expect("connect");

    let mut frame_loop = FrameLoop::new(
        source,
        DetectionSession::new(models),
        DisplayList::new(640, 360),
        unpaced(),
    );
    let (controller, events) = PlaybackController::channel();
    controller.play().unwrap();
    drop(controller);

    let summary = frame_loop.run(&events);
    assert_eq!(summary.frames_processed, 300);
    let kinds: Vec<KeyMomentKind> = summary.key_moments.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![KeyMomentKind::ShotOrPass, KeyMomentKind::Jump]);

    let pass = &summary.key_moments[0];
    assert!((pass.time - 104.0 / 30.0).abs() < 1e-6);
    assert!((0.5..=0.9).contains(&pass.confidence));
    let jump = &summary.key_moments[1];
    assert!((jump.time - 209.0 / 30.0).abs() < 1e-6);
    assert!((0.7..=0.95).contains(&jump.confidence));
}
