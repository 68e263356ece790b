//! Local video files decoded with FFmpeg.
//!
//! Frames are scaled to the display size in RGB24 and stamped with their
//! presentation time. Decoding stays in memory.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::VideoFrame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: f64,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
    frame_count: u64,
    restarts: u64,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let time_base = f64::from(input_stream.time_base());
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            config.width,
            config.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
            eof_sent: false,
            frame_count: 0,
            restarts: 0,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: opened {} ({}x{} -> {}x{})",
            self.config.path,
            self.decoder.width(),
            self.decoder.height(),
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let frame = self.convert(&decoded).inspect_err(|e| {
                    self.last_error = Some(format!("{:#}", e));
                })?;
                self.frame_count += 1;
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    pub(crate) fn restart(&mut self) -> Result<()> {
        self.input
            .seek(0, ..)
            .with_context(|| format!("rewind {}", self.config.path))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.frame_count = 0;
        self.restarts += 1;
        self.last_error = None;
        Ok(())
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            restarts: self.restarts,
            path: self.config.path.clone(),
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<VideoFrame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let pixels = frame_to_pixels(&rgb_frame)?;
        let media_time = decoded
            .timestamp()
            .map(|pts| pts as f64 * self.time_base)
            .unwrap_or(self.frame_count as f64 / self.config.fps.max(1) as f64);
        VideoFrame::new(pixels, rgb_frame.width(), rgb_frame.height(), media_time)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data[..row_bytes * height as usize].to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok(pixels)
}
