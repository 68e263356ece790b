use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::{CancellationToken, FrameTicker, LoopState, PlaybackEvent, VideoSource};
use crate::error::PipelineError;
use crate::frame::VideoFrame;
use crate::moments::KeyMoment;
use crate::observer::FrameObserver;
use crate::overlay::{Canvas, OverlayRenderer};
use crate::session::{DetectionSession, FrameReport};

/// How long an idle loop blocks on the event channel before re-checking cancellation.
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct SnapshotSettings {
    pub dir: PathBuf,
    /// Export after every n-th processed frame.
    pub every: u64,
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    pub show_overlay: bool,
    pub loop_playback: bool,
    /// 0 = unpaced.
    pub target_fps: u32,
    pub snapshot: Option<SnapshotSettings>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            show_overlay: true,
            loop_playback: false,
            target_fps: 30,
            snapshot: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Not detecting; nothing happened.
    Idle,
    Processed { frame_number: u64 },
    InferenceFailed { frame_number: u64 },
    /// Source ended and playback stopped.
    Ended,
    /// Source ended and playback started over.
    Restarted,
    /// Source error; playback stopped.
    SourceFailed,
    /// The cancellation token was set; nothing was processed.
    Cancelled,
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Frames handed to the models, across restarts.
    pub frames_processed: u64,
    pub inference_failures: u64,
    pub snapshots_written: u64,
    pub key_moments: Vec<KeyMoment>,
    pub playback_error: Option<String>,
}

/// Drives a `DetectionSession` from a `VideoSource` in response to playback events.
///
/// The source must already be connected.
pub struct FrameLoop<S: VideoSource, C: Canvas> {
    source: S,
    session: DetectionSession,
    canvas: C,
    renderer: OverlayRenderer,
    observer: Box<dyn FrameObserver>,
    options: LoopOptions,
    state: LoopState,
    ticker: FrameTicker,
    cancel: CancellationToken,
    source_ended: bool,
    summary: RunSummary,
}

impl<S: VideoSource, C: Canvas> FrameLoop<S, C> {
    pub fn new(source: S, session: DetectionSession, canvas: C, options: LoopOptions) -> Self {
        let ticker = FrameTicker::new(options.target_fps);
        Self {
            source,
            session,
            canvas,
            renderer: OverlayRenderer::new(),
            observer: Box::new(()),
            options,
            state: LoopState::Idle,
            ticker,
            cancel: CancellationToken::new(),
            source_ended: false,
            summary: RunSummary::default(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn FrameObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn ticker(&self) -> &FrameTicker {
        &self.ticker
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn handle_event(&mut self, event: PlaybackEvent, now: Instant) {
        match event {
            PlaybackEvent::Play => {
                if self.state == LoopState::Detecting {
                    return;
                }
                if self.source_ended {
                    if let Err(err) = self.source.restart() {
                        self.fail_playback(err);
                        return;
                    }
                    self.session.reset(now);
                    self.source_ended = false;
                    log::info!("playback restarted from the beginning");
                }
                self.state = LoopState::Detecting;
                self.ticker.schedule_now(now);
                log::info!("detection started");
            }
            PlaybackEvent::Pause => self.stop("paused"),
            PlaybackEvent::Ended => {
                self.source_ended = true;
                self.stop("ended");
            }
        }
    }

    /// Run one tick: pull a frame, process, notify, draw, reschedule.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state != LoopState::Detecting {
            return TickOutcome::Idle;
        }
        if self.cancel.is_cancelled() {
            self.ticker.cancel();
            return TickOutcome::Cancelled;
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.on_source_end(now),
            Err(err) => {
                self.fail_playback(err);
                return TickOutcome::SourceFailed;
            }
        };

        let outcome = match self.session.process_frame(&frame, now) {
            Ok(report) => {
                let frame_number = report.frame_number;
                self.publish(&frame, report);
                TickOutcome::Processed { frame_number }
            }
            Err(err) => {
                log::warn!("{:#}", anyhow::Error::new(err));
                self.summary.inference_failures += 1;
                TickOutcome::InferenceFailed {
                    frame_number: self.session.frames_processed(),
                }
            }
        };
        self.summary.frames_processed += 1;
        self.reschedule(now);
        outcome
    }

    /// Run until cancelled, or until the loop is idle with no controller left.
    pub fn run(&mut self, events: &Receiver<PlaybackEvent>) -> RunSummary {
        let mut events_open = true;
        loop {
            if self.cancel.is_cancelled() {
                self.ticker.cancel();
                log::info!("frame loop cancelled");
                break;
            }

            while events_open {
                match events.try_recv() {
                    Ok(event) => self.handle_event(event, Instant::now()),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => events_open = false,
                }
            }

            let now = Instant::now();
            if self.ticker.take_due(now) {
                self.tick(now);
                continue;
            }

            let wait = match self.ticker.deadline() {
                Some(deadline) => deadline.saturating_duration_since(now),
                None if events_open => IDLE_POLL,
                None => break,
            };
            if events_open {
                match events.recv_timeout(wait) {
                    Ok(event) => self.handle_event(event, Instant::now()),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => events_open = false,
                }
            } else {
                std::thread::sleep(wait);
            }
        }
        self.summary.clone()
    }

    fn publish(&mut self, frame: &VideoFrame, report: FrameReport) {
        self.observer
            .on_detections(report.frame_number, &report.detections);
        if let Some(moment) = report.key_moment {
            self.observer.on_key_moment(&moment);
            self.summary.key_moments.push(moment);
        }

        if !self.options.show_overlay {
            return;
        }
        self.renderer
            .draw(&mut self.canvas, frame, &report.detections, &report.stats);

        let Some(snapshot) = &self.options.snapshot else {
            return;
        };
        if snapshot.every == 0 || report.frame_number % snapshot.every != 0 {
            return;
        }
        match export_snapshot(&self.canvas, snapshot, report.frame_number) {
            Ok(path) => {
                self.summary.snapshots_written += 1;
                log::debug!("overlay snapshot written to {}", path.display());
            }
            Err(err) => log::warn!("overlay snapshot failed: {:#}", err),
        }
    }

    fn on_source_end(&mut self, now: Instant) -> TickOutcome {
        log::info!(
            "source ended after {} frames",
            self.session.frames_processed()
        );
        if !self.options.loop_playback {
            self.handle_event(PlaybackEvent::Ended, now);
            return TickOutcome::Ended;
        }
        if let Err(err) = self.source.restart() {
            self.fail_playback(err);
            return TickOutcome::SourceFailed;
        }
        self.session.reset(now);
        self.reschedule(now);
        TickOutcome::Restarted
    }

    fn reschedule(&mut self, now: Instant) {
        if self.cancel.is_cancelled() {
            self.ticker.cancel();
        } else {
            self.ticker.schedule(now);
        }
    }

    fn stop(&mut self, reason: &str) {
        self.ticker.cancel();
        if self.state == LoopState::Detecting {
            log::info!("detection stopped ({})", reason);
        }
        self.state = LoopState::Idle;
    }

    fn fail_playback(&mut self, err: anyhow::Error) {
        let err = anyhow::Error::new(PipelineError::playback(err));
        log::error!("{:#}", err);
        self.summary.playback_error = Some(format!("{:#}", err));
        self.stop("playback error");
    }
}

fn export_snapshot<C: Canvas>(
    canvas: &C,
    settings: &SnapshotSettings,
    frame_number: u64,
) -> Result<PathBuf> {
    fs::create_dir_all(&settings.dir)
        .with_context(|| format!("create {}", settings.dir.display()))?;
    let path = settings.dir.join(format!(
        "overlay-{:06}.{}",
        frame_number,
        canvas.snapshot_extension()
    ));
    canvas.export(&path)?;
    Ok(path)
}
