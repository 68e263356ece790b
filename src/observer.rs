//! Per-frame notification hooks for consumers of the frame loop.

use std::io::Write;

use serde::Serialize;

use crate::detect::FrameDetections;
use crate::moments::KeyMoment;

/// Receives detections and key moments in frame order, on the loop thread.
///
/// For a frame that yields a key moment, `on_detections` is called first.
pub trait FrameObserver {
    fn on_detections(&mut self, _frame_number: u64, _detections: &FrameDetections) {}

    fn on_key_moment(&mut self, _moment: &KeyMoment) {}
}

impl FrameObserver for () {}

/// Collects every key moment in memory.
#[derive(Debug, Default)]
pub struct MomentLog {
    pub moments: Vec<KeyMoment>,
}

impl FrameObserver for MomentLog {
    fn on_key_moment(&mut self, moment: &KeyMoment) {
        self.moments.push(moment.clone());
    }
}

#[derive(Serialize)]
struct MomentLine<'a> {
    event: &'static str,
    #[serde(flatten)]
    moment: &'a KeyMoment,
}

/// Writes each key moment as one JSON object per line.
pub struct JsonLinesObserver<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameObserver for JsonLinesObserver<W> {
    fn on_key_moment(&mut self, moment: &KeyMoment) {
        let line = MomentLine {
            event: "key_moment",
            moment,
        };
        let written = serde_json::to_writer(&mut self.out, &line)
            .map_err(anyhow::Error::from)
            .and_then(|_| writeln!(self.out).map_err(anyhow::Error::from))
            .and_then(|_| self.out.flush().map_err(anyhow::Error::from));
        if let Err(err) = written {
            log::warn!("failed to write key moment: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moments::KeyMomentKind;

    #[test]
    fn writes_one_line_per_moment() {
        let mut observer = JsonLinesObserver::new(Vec::new());
        let moment = KeyMoment {
            time: 12.5,
            description: KeyMomentKind::Jump.description().to_string(),
            confidence: 0.8,
            kind: KeyMomentKind::Jump,
        };
        observer.on_key_moment(&moment);
        observer.on_key_moment(&moment);

        let text = String::from_utf8(observer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["event"], "key_moment");
        assert_eq!(value["kind"], "jump");
        assert_eq!(value["time"], 12.5);
    }
}
