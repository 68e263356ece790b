//! Playback-driven frame loop.
//!
//! The loop is a two-state machine (`Idle`, `Detecting`) driven by playback events.
//! While detecting, each tick pulls one frame from the `VideoSource`, runs the
//! `DetectionSession`, notifies the observer, redraws the overlay and schedules the
//! next tick on the `FrameTicker`. Pausing or reaching the end of the source cancels
//! the pending tick.

mod frame_loop;
mod ticker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::frame::VideoFrame;

pub use frame_loop::{FrameLoop, LoopOptions, RunSummary, SnapshotSettings, TickOutcome};
pub use ticker::FrameTicker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Detecting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Ended,
}

/// A seekable stream of decoded frames.
///
/// Frames come out in increasing media-time order.
pub trait VideoSource {
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `Ok(None)` once the source has ended.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Rewind to the first frame.
    fn restart(&mut self) -> Result<()>;

    fn is_healthy(&self) -> bool;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        (**self).next_frame()
    }

    fn restart(&mut self) -> Result<()> {
        (**self).restart()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// Shared stop flag, checked before every reschedule.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sends playback events to a running `FrameLoop`.
#[derive(Clone, Debug)]
pub struct PlaybackController {
    tx: Sender<PlaybackEvent>,
}

impl PlaybackController {
    /// Controller plus the receiving end to hand to `FrameLoop::run`.
    pub fn channel() -> (Self, Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlaybackEvent::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlaybackEvent::Pause)
    }

    pub fn end(&self) -> Result<()> {
        self.send(PlaybackEvent::Ended)
    }

    fn send(&self, event: PlaybackEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow!("frame loop is no longer running"))
    }
}
