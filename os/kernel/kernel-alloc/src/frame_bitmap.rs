//! Packed 2-bit-per-frame state array.
//!
//! The bitmap does not own its memory. It borrows a byte slice (usually one
//! physical frame reached through a [`PhysMapper`](crate::phys_mapper::PhysMapper))
//! and stores four [`FrameState`]s per byte, frame `i` at bit offset
//! `2 * (i % 4)` of byte `i / 4`:
//!
//! ```text
//!  byte i/4:  7   6 5   4 3   2 1   0
//!            +-----+-----+-----+-----+
//!            | i+3 | i+2 | i+1 |  i  |
//!            +-----+-----+-----+-----+
//! ```

use crate::frame_state::FrameState;
use bitfield_struct::bitfield;

/// Four frame states packed into one byte.
#[bitfield(u8)]
struct StateQuad {
    #[bits(2, default = FrameState::Free)]
    lane0: FrameState,
    #[bits(2, default = FrameState::Free)]
    lane1: FrameState,
    #[bits(2, default = FrameState::Free)]
    lane2: FrameState,
    #[bits(2, default = FrameState::Free)]
    lane3: FrameState,
}

impl StateQuad {
    #[inline]
    const fn lane(self, lane: usize) -> FrameState {
        match lane {
            0 => self.lane0(),
            1 => self.lane1(),
            2 => self.lane2(),
            _ => self.lane3(),
        }
    }

    #[inline]
    const fn with_lane(self, lane: usize, state: FrameState) -> Self {
        match lane {
            0 => self.with_lane0(state),
            1 => self.with_lane1(state),
            2 => self.with_lane2(state),
            _ => self.with_lane3(state),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameBitmapError {
    #[error("bitmap storage of {available} bytes cannot describe {requested} frames")]
    StorageTooSmall { requested: u64, available: usize },
    #[error("frame index {index} is {state}, not the head of a run")]
    NotHeadOfSequence { index: u64, state: FrameState },
}

/// Frame states for `len` frames, indexed from zero.
pub struct FrameBitmap<'a> {
    bytes: &'a mut [u8],
    len: u64,
}

impl<'a> FrameBitmap<'a> {
    /// States stored per byte.
    pub const FRAMES_PER_BYTE: u64 = 8 / FrameState::BITS as u64;

    /// Bytes of storage needed to describe `frames` frames.
    #[inline]
    #[must_use]
    pub const fn bytes_needed(frames: u64) -> u64 {
        frames.div_ceil(Self::FRAMES_PER_BYTE)
    }

    /// Take over `storage` for `len` frames and mark every frame [`FrameState::Free`].
    ///
    /// # Errors
    /// [`FrameBitmapError::StorageTooSmall`] if `storage` cannot hold `len` entries.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(storage: &'a mut [u8], len: u64) -> Result<Self, FrameBitmapError> {
        let needed = Self::bytes_needed(len);
        if needed > storage.len() as u64 {
            return Err(FrameBitmapError::StorageTooSmall {
                requested: len,
                available: storage.len(),
            });
        }

        // `needed` fits in usize since it is bounded by the slice length.
        let bytes = &mut storage[..needed as usize];
        bytes.fill(StateQuad::new().into_bits());
        Ok(Self { bytes, len })
    }

    /// Number of frames described.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte index and lane of frame `index`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    const fn locate(index: u64) -> (usize, usize) {
        // Bounded by `len`, which fits the backing slice.
        (
            (index / Self::FRAMES_PER_BYTE) as usize,
            (index % Self::FRAMES_PER_BYTE) as usize,
        )
    }

    /// State of frame `index`.
    ///
    /// # Panics
    /// If `index >= len`, or if the stored pattern is not a valid state.
    #[must_use]
    pub fn get(&self, index: u64) -> FrameState {
        assert!(index < self.len, "frame index {index} out of range ({})", self.len);
        let (byte, lane) = Self::locate(index);
        StateQuad::from_bits(self.bytes[byte]).lane(lane)
    }

    /// Overwrite the state of frame `index`.
    ///
    /// # Panics
    /// If `index >= len`.
    pub fn set(&mut self, index: u64, state: FrameState) {
        assert!(index < self.len, "frame index {index} out of range ({})", self.len);
        let (byte, lane) = Self::locate(index);
        let quad = StateQuad::from_bits(self.bytes[byte]).with_lane(lane, state);
        self.bytes[byte] = quad.into_bits();
    }

    /// Index of the lowest run of `n` consecutive free frames (first fit).
    #[must_use]
    pub fn find_free_run(&self, n: u64) -> Option<u64> {
        if n == 0 || n > self.len {
            return None;
        }

        let mut run = 0;
        for index in 0..self.len {
            if self.get(index).is_free() {
                run += 1;
                if run == n {
                    return Some(index + 1 - n);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    /// Mark `[start, start + n)` as one run: a head followed by `n - 1` used frames.
    ///
    /// Returns how many of those frames were free before.
    ///
    /// # Panics
    /// If the range does not lie within the bitmap.
    pub fn mark_run(&mut self, start: u64, n: u64) -> u64 {
        let end = start.saturating_add(n);
        assert!(n > 0 && end <= self.len, "run {start}+{n} out of range ({})", self.len);

        let mut were_free = 0;
        for index in start..end {
            if self.get(index).is_free() {
                were_free += 1;
            }
            let state = if index == start {
                FrameState::HeadOfSequence
            } else {
                FrameState::Used
            };
            self.set(index, state);
        }
        were_free
    }

    /// Free the run headed at `start` and return its length.
    ///
    /// The head is freed, then every following [`FrameState::Used`] frame up to
    /// the next free frame, the next head, or the end of the bitmap.
    ///
    /// # Errors
    /// [`FrameBitmapError::NotHeadOfSequence`] if `start` is not a head; the
    /// bitmap is left untouched.
    pub fn release_run(&mut self, start: u64) -> Result<u64, FrameBitmapError> {
        let state = self.get(start);
        if state != FrameState::HeadOfSequence {
            return Err(FrameBitmapError::NotHeadOfSequence {
                index: start,
                state,
            });
        }

        self.set(start, FrameState::Free);
        let mut released = 1;
        let mut index = start + 1;
        while index < self.len && !self.get(index).is_run_boundary() {
            self.set(index, FrameState::Free);
            released += 1;
            index += 1;
        }
        Ok(released)
    }

    /// Number of frames currently in `state`.
    #[must_use]
    pub fn count(&self, state: FrameState) -> u64 {
        self.iter().filter(|s| *s == state).map(|_| 1).sum()
    }

    /// States of all frames in index order.
    pub fn iter(&self) -> impl Iterator<Item = FrameState> + '_ {
        (0..self.len).map(|index| self.get(index))
    }
}
