//! Video sources.
//!
//! - Synthetic court scene (`stub://`), always available
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Sources decode in memory and hand each frame to the loop by value; nothing is
//! written to disk and frames are not retained after the tick that consumed them.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats, SCENE_FRAMES};
