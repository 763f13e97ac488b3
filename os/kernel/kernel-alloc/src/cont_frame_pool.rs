//! # Contiguous Frame Pool
//!
//! A pool governs the physical frames `[base_frame_no, base_frame_no + n_frames)`
//! and hands out *runs* of contiguously numbered frames. Each frame's state lives
//! in a [`FrameBitmap`] stored in one physical frame, the *info frame*:
//!
//! - [`InfoFrame::SelfHosted`]: the pool's own frame 0 holds the bitmap. That
//!   frame is marked [`FrameState::Used`] at construction and never handed out.
//! - [`InfoFrame::External`]: a caller-chosen frame outside the pool holds it,
//!   typically allocated from another pool (see [`needed_info_frames`]).
//!
//! Allocation is first fit in ascending frame order. Releasing a run is not a
//! method of the pool: only the frame number is known at release time, so the
//! owning pool is found through the
//! [`PoolRegistry`](crate::pool_registry::PoolRegistry).

use crate::frame_bitmap::{FrameBitmap, FrameBitmapError};
use crate::frame_state::FrameState;
use crate::phys_mapper::{FrameBytes, PhysMapper};
use kernel_info::memory::FRAMES_PER_INFO_FRAME;
use kernel_memory_addresses::FrameNumber;
use log::{debug, trace};

/// Number of whole info frames needed to describe `n_frames` frames.
///
/// ```rust
/// # use kernel_alloc::cont_frame_pool::needed_info_frames;
/// assert_eq!(needed_info_frames(1), 1);
/// assert_eq!(needed_info_frames(16 * 1024), 1);
/// assert_eq!(needed_info_frames(16 * 1024 + 1), 2);
/// ```
#[inline]
#[must_use]
pub const fn needed_info_frames(n_frames: u64) -> u64 {
    n_frames.div_ceil(FRAMES_PER_INFO_FRAME)
}

/// Where a pool keeps its bitmap.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InfoFrame {
    /// In frame 0 of the pool's own range.
    SelfHosted,
    /// In the given frame, which must lie outside the pool's range.
    External(FrameNumber),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramePoolError {
    #[error("a frame pool must govern at least one frame")]
    EmptyPool,
    #[error("pool of {n_frames} frames exceeds the {max} frames one info frame can describe")]
    TooManyFrames { n_frames: u64, max: u64 },
    #[error("info frame {0} lies inside the pool it describes")]
    InfoFrameInsidePool(FrameNumber),
    #[error("frames {base}+{n_frames} cover the pool's own info frame")]
    CoversInfoFrame { base: FrameNumber, n_frames: u64 },
    #[error("bitmap storage rejected: {0}")]
    Bitmap(#[from] FrameBitmapError),
    #[error("requested zero frames")]
    ZeroFrames,
    #[error("frame pool has no free frames left")]
    Exhausted,
    #[error("no run of {requested} contiguous free frames")]
    NoContiguousRun { requested: u64 },
    #[error("frames {base}+{n_frames} lie outside the pool")]
    OutOfRange { base: FrameNumber, n_frames: u64 },
    #[error("frame {frame} is {state}, not the head of an allocated run")]
    NotHeadOfSequence { frame: FrameNumber, state: FrameState },
}

impl FramePoolError {
    /// Whether the caller may sensibly retry elsewhere, e.g. against another pool.
    ///
    /// Every other error is an invariant violation.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoContiguousRun { .. })
    }
}

/// Allocator for contiguous runs of physical frames.
pub struct ContFramePool<'a> {
    base_frame_no: FrameNumber,
    n_frames: u64,
    n_free_frames: u64,
    info_frame: InfoFrame,
    bitmap: FrameBitmap<'a>,
}

impl<'a> ContFramePool<'a> {
    /// Largest pool whose bitmap fits in a single info frame.
    pub const MAX_FRAMES: u64 = FRAMES_PER_INFO_FRAME;

    /// Create a pool whose bitmap lives in physical memory reached through `mapper`.
    ///
    /// # Safety
    /// - The info frame ([`InfoFrame::SelfHosted`]: `base_frame_no`) must be
    ///   mapped writable through `mapper`.
    /// - Nothing else may access the info frame for `'a`.
    ///
    /// # Errors
    /// See [`with_storage`](Self::with_storage).
    pub unsafe fn new<M: PhysMapper + ?Sized>(
        base_frame_no: FrameNumber,
        n_frames: u64,
        info_frame: InfoFrame,
        mapper: &M,
    ) -> Result<Self, FramePoolError> {
        Self::validate(base_frame_no, n_frames, info_frame)?;
        let frame = match info_frame {
            InfoFrame::SelfHosted => base_frame_no,
            InfoFrame::External(frame) => frame,
        };

        // SAFETY: The caller guarantees the info frame is mapped and exclusively ours.
        let storage: &'a mut FrameBytes = unsafe { mapper.phys_to_mut(frame.base()) };
        Self::with_storage(base_frame_no, n_frames, info_frame, storage)
    }

    /// Create a pool over caller-provided bitmap storage.
    ///
    /// `storage` stands for the info frame named by `info_frame`; with
    /// [`InfoFrame::SelfHosted`] the pool's frame 0 is reserved for it.
    ///
    /// # Errors
    /// - [`FramePoolError::EmptyPool`] / [`FramePoolError::TooManyFrames`] if
    ///   `n_frames` is zero or exceeds [`MAX_FRAMES`](Self::MAX_FRAMES).
    /// - [`FramePoolError::OutOfRange`] if the frame range overflows.
    /// - [`FramePoolError::InfoFrameInsidePool`] for an external info frame
    ///   inside the pool's range.
    /// - [`FramePoolError::Bitmap`] if `storage` is too small.
    pub fn with_storage(
        base_frame_no: FrameNumber,
        n_frames: u64,
        info_frame: InfoFrame,
        storage: &'a mut [u8],
    ) -> Result<Self, FramePoolError> {
        Self::validate(base_frame_no, n_frames, info_frame)?;
        let bitmap = FrameBitmap::new(storage, n_frames)?;

        let mut pool = Self {
            base_frame_no,
            n_frames,
            n_free_frames: n_frames,
            info_frame,
            bitmap,
        };

        if info_frame == InfoFrame::SelfHosted {
            pool.bitmap.set(0, FrameState::Used);
            pool.n_free_frames -= 1;
        }

        debug!(
            "Frame pool initialized: frames {base_frame_no}..+{n_frames}, info frame {info_frame:?}, {} free",
            pool.n_free_frames
        );
        Ok(pool)
    }

    fn validate(
        base_frame_no: FrameNumber,
        n_frames: u64,
        info_frame: InfoFrame,
    ) -> Result<(), FramePoolError> {
        if n_frames == 0 {
            return Err(FramePoolError::EmptyPool);
        }
        if n_frames > Self::MAX_FRAMES {
            return Err(FramePoolError::TooManyFrames {
                n_frames,
                max: Self::MAX_FRAMES,
            });
        }
        let Some(end) = base_frame_no.checked_add(n_frames) else {
            return Err(FramePoolError::OutOfRange {
                base: base_frame_no,
                n_frames,
            });
        };
        if let InfoFrame::External(frame) = info_frame
            && base_frame_no <= frame
            && frame < end
        {
            return Err(FramePoolError::InfoFrameInsidePool(frame));
        }
        Ok(())
    }

    /// Allocate `n` contiguous frames and return the first one.
    ///
    /// The lowest suitable run wins. Its first frame becomes
    /// [`FrameState::HeadOfSequence`], the rest [`FrameState::Used`].
    ///
    /// # Errors
    /// - [`FramePoolError::ZeroFrames`] for `n == 0`.
    /// - [`FramePoolError::Exhausted`] if the pool has no free frame at all.
    /// - [`FramePoolError::NoContiguousRun`] (recoverable) if no run of `n` free
    ///   frames exists. The pool is left unchanged.
    pub fn get_frames(&mut self, n: u64) -> Result<FrameNumber, FramePoolError> {
        if n == 0 {
            return Err(FramePoolError::ZeroFrames);
        }
        if self.n_free_frames == 0 {
            return Err(FramePoolError::Exhausted);
        }

        let Some(offset) = self.bitmap.find_free_run(n) else {
            trace!(
                "No run of {n} contiguous frames in pool at {} ({} free)",
                self.base_frame_no, self.n_free_frames
            );
            return Err(FramePoolError::NoContiguousRun { requested: n });
        };

        self.bitmap.mark_run(offset, n);
        self.n_free_frames -= n;

        let first = self.base_frame_no + offset;
        trace!("Allocated {n} frames at {first}");
        Ok(first)
    }

    /// Reserve the absolute frames `[base_frame_no, base_frame_no + n)` without searching.
    ///
    /// The range is marked like a run returned by [`get_frames`](Self::get_frames)
    /// and can be given back through the registry like one.
    ///
    /// # Errors
    /// - [`FramePoolError::ZeroFrames`] for `n == 0`.
    /// - [`FramePoolError::OutOfRange`] if the range is not inside this pool.
    /// - [`FramePoolError::CoversInfoFrame`] if the range includes the
    ///   self-hosted info frame.
    pub fn mark_inaccessible(
        &mut self,
        base_frame_no: FrameNumber,
        n: u64,
    ) -> Result<(), FramePoolError> {
        if n == 0 {
            return Err(FramePoolError::ZeroFrames);
        }
        let offset = base_frame_no
            .offset_from(self.base_frame_no)
            .filter(|offset| {
                offset
                    .checked_add(n)
                    .is_some_and(|end| end <= self.n_frames)
            })
            .ok_or(FramePoolError::OutOfRange {
                base: base_frame_no,
                n_frames: n,
            })?;

        if offset == 0 && self.info_frame == InfoFrame::SelfHosted {
            return Err(FramePoolError::CoversInfoFrame {
                base: base_frame_no,
                n_frames: n,
            });
        }

        let were_free = self.bitmap.mark_run(offset, n);
        self.n_free_frames -= were_free;

        debug!("Marked frames {base_frame_no}..+{n} inaccessible");
        Ok(())
    }

    /// Free the run headed by `frame`, which must belong to this pool.
    pub(crate) fn release_run(&mut self, frame: FrameNumber) -> Result<u64, FramePoolError> {
        let offset = self
            .offset_of(frame)
            .ok_or(FramePoolError::OutOfRange {
                base: frame,
                n_frames: 1,
            })?;

        let released = self.bitmap.release_run(offset).map_err(|e| match e {
            FrameBitmapError::NotHeadOfSequence { state, .. } => {
                FramePoolError::NotHeadOfSequence { frame, state }
            }
            other @ FrameBitmapError::StorageTooSmall { .. } => other.into(),
        })?;
        self.n_free_frames += released;

        trace!("Released {released} frames at {frame}");
        Ok(released)
    }

    #[inline]
    fn offset_of(&self, frame: FrameNumber) -> Option<u64> {
        frame
            .offset_from(self.base_frame_no)
            .filter(|offset| *offset < self.n_frames)
    }

    #[inline]
    #[must_use]
    pub const fn base_frame_no(&self) -> FrameNumber {
        self.base_frame_no
    }

    #[inline]
    #[must_use]
    pub const fn n_frames(&self) -> u64 {
        self.n_frames
    }

    #[inline]
    #[must_use]
    pub const fn n_free_frames(&self) -> u64 {
        self.n_free_frames
    }

    #[inline]
    #[must_use]
    pub const fn info_frame(&self) -> InfoFrame {
        self.info_frame
    }

    /// First frame past the end of this pool.
    #[inline]
    #[must_use]
    pub const fn end_frame_no(&self) -> FrameNumber {
        FrameNumber::new(self.base_frame_no.as_u64() + self.n_frames)
    }

    /// Whether `frame` lies in `[base_frame_no, base_frame_no + n_frames)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, frame: FrameNumber) -> bool {
        self.offset_of(frame).is_some()
    }

    /// Whether the frame ranges of `self` and `other` intersect.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &ContFramePool<'_>) -> bool {
        self.base_frame_no < other.end_frame_no() && other.base_frame_no < self.end_frame_no()
    }

    /// State of `frame`, or `None` if it is not governed by this pool.
    #[must_use]
    pub fn state(&self, frame: FrameNumber) -> Option<FrameState> {
        self.offset_of(frame).map(|offset| self.bitmap.get(offset))
    }
}
