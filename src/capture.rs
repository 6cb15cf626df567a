//! Live-capture frame buffer.
//!
//! A producer appends snapshot paths at a fixed cadence while each chat
//! session consumes only the frames appended since its previous turn.

use std::{path::PathBuf, sync::Arc};

use llm_multimodal::MediaInput;
use parking_lot::RwLock;
use tracing::debug;

/// Append-only list of captured frame paths, shared between the producer and
/// any number of sessions.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    frames: Arc<RwLock<Vec<PathBuf>>>,
}

/// Per-session read position into a [`CaptureBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCursor {
    consumed: usize,
}

impl CaptureCursor {
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and return its absolute sequence number.
    pub fn push(&self, path: impl Into<PathBuf>) -> u64 {
        let mut frames = self.frames.write();
        frames.push(path.into());
        (frames.len() - 1) as u64
    }

    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }

    /// Frames appended since `cursor` last advanced, numbered by their
    /// absolute position in the buffer. Advances the cursor.
    pub fn take_new(&self, cursor: &mut CaptureCursor) -> Vec<MediaInput> {
        let snapshot: Vec<PathBuf> = {
            let frames = self.frames.read();
            frames.get(cursor.consumed..).unwrap_or_default().to_vec()
        };
        let start = cursor.consumed;
        cursor.consumed += snapshot.len();
        debug!(start, taken = snapshot.len(), "Took new capture frames");

        snapshot
            .into_iter()
            .enumerate()
            .map(|(offset, path)| MediaInput::capture_frame(path, (start + offset) as u64))
            .collect()
    }

    /// Progress text shown while new frames are processed.
    pub fn status_line(new_frames: usize) -> String {
        format!("received {new_frames} new frames, processing...")
    }
}
