//! Forward-only reader of persisted per-frame detection batches.
//!
//! The stream is a sequence of JSON frame records, one after another
//! (newline separated or simply concatenated). A record cut off by the end of
//! the input is the end of the stream, not an error: writers are killed
//! mid-frame often enough that a truncated tail is expected.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::de::IoRead;
use serde_json::StreamDeserializer;

use crate::error::{Error, Result};
use crate::pair::Detection;

/// Detections of a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

pub struct DetectionStream<R: Read> {
    inner: StreamDeserializer<'static, IoRead<R>, FrameDetections>,
    frames: usize,
    finished: bool,
}

impl DetectionStream<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        log::debug!("reading detection stream {}", path.as_ref().display());

        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> DetectionStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: serde_json::Deserializer::from_reader(reader).into_iter(),
            frames: 0,
            finished: false,
        }
    }

    /// Frames successfully read so far.
    #[inline]
    pub fn frames_read(&self) -> usize {
        self.frames
    }
}

impl<R: Read> Iterator for DetectionStream<R> {
    type Item = Result<FrameDetections>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next() {
            Some(Ok(frame)) => {
                self.frames += 1;
                Some(Ok(frame))
            }
            Some(Err(err)) if err.is_eof() => {
                log::debug!("detection stream truncated after {} frames: {}", self.frames, err);
                self.finished = true;
                None
            }
            Some(Err(err)) => {
                // no framing to resync on, stop after reporting
                self.finished = true;
                Some(Err(Error::StreamRead(err)))
            }
            None => {
                log::debug!("detection stream ended after {} frames", self.frames);
                self.finished = true;
                None
            }
        }
    }
}
