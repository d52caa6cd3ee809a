use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::{
    connection::{error::FramingError, frame::ChunkHeader},
    wrapping_number::sequence_less_than,
};

struct PendingFrame {
    count: u16,
    received: u16,
    length: usize,
    fragments: Vec<Option<Vec<u8>>>,
}

impl PendingFrame {
    fn new(count: u16) -> Self {
        Self {
            count,
            received: 0,
            length: 0,
            fragments: vec![None; usize::from(count)],
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.count
    }

    fn join(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.length);
        for fragment in self.fragments.into_iter().flatten() {
            frame.extend_from_slice(&fragment);
        }
        frame
    }
}

/// Per-session buffer that turns received chunks back into frames, keyed by
/// the sender's frame sequence
pub struct Reassembly {
    max_pending_frames: usize,
    max_frame_size: usize,
    pending: HashMap<u16, PendingFrame>,
    recently_completed: VecDeque<u16>,
}

impl Reassembly {
    pub fn new(max_pending_frames: usize, max_frame_size: usize) -> Self {
        Self {
            max_pending_frames: max_pending_frames.max(1),
            max_frame_size,
            pending: HashMap::new(),
            recently_completed: VecDeque::new(),
        }
    }

    /// Feeds one chunk in. Returns the frame it completes, if any.
    /// Duplicates of a recently completed frame are ignored.
    pub fn receive(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        let (header, body) = ChunkHeader::split(chunk)?;
        if header.count == 0 {
            return Err(FramingError::InvalidFragmentCount {
                sequence: header.sequence,
            });
        }
        if header.index >= header.count {
            return Err(FramingError::FragmentOutOfRange {
                index: header.index,
                count: header.count,
            });
        }
        if self.recently_completed.contains(&header.sequence) {
            debug!("Ignoring duplicate chunk of frame {}", header.sequence);
            return Ok(None);
        }

        if header.count == 1 {
            if body.len() > self.max_frame_size {
                return Err(FramingError::FrameTooLarge {
                    length: body.len(),
                    max: self.max_frame_size,
                });
            }
            self.remember_completed(header.sequence);
            return Ok(Some(body.to_vec()));
        }

        if !self.pending.contains_key(&header.sequence) {
            self.evict_if_full();
            self.pending
                .insert(header.sequence, PendingFrame::new(header.count));
        }
        let Some(frame) = self.pending.get_mut(&header.sequence) else {
            return Ok(None);
        };
        if frame.count != header.count {
            return Err(FramingError::FragmentCountMismatch {
                sequence: header.sequence,
                expected: frame.count,
                actual: header.count,
            });
        }

        let slot = &mut frame.fragments[usize::from(header.index)];
        if slot.is_some() {
            return Ok(None);
        }
        frame.length += body.len();
        if frame.length > self.max_frame_size {
            let length = frame.length;
            self.pending.remove(&header.sequence);
            return Err(FramingError::FrameTooLarge {
                length,
                max: self.max_frame_size,
            });
        }
        *slot = Some(body.to_vec());
        frame.received += 1;

        if !frame.is_complete() {
            return Ok(None);
        }
        let Some(frame) = self.pending.remove(&header.sequence) else {
            return Ok(None);
        };
        self.remember_completed(header.sequence);
        Ok(Some(frame.join()))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.recently_completed.clear();
    }

    fn evict_if_full(&mut self) {
        while self.pending.len() >= self.max_pending_frames {
            let oldest = self
                .pending
                .keys()
                .copied()
                .reduce(|oldest, sequence| {
                    if sequence_less_than(sequence, oldest) {
                        sequence
                    } else {
                        oldest
                    }
                });
            let Some(oldest) = oldest else {
                return;
            };
            warn!("Evicting incomplete frame {}", oldest);
            self.pending.remove(&oldest);
        }
    }

    fn remember_completed(&mut self, sequence: u16) {
        if self.recently_completed.len() >= self.max_pending_frames {
            self.recently_completed.pop_front();
        }
        self.recently_completed.push_back(sequence);
    }
}
