//! Large transient buffers from an injected backing store.
//!
//! The filter bank is the one allocation too large for ordinary working
//! memory on the target device. The pipeline asks a [`BufferAllocator`] for
//! it and holds the result in a [`ScopedBuffer`], which hands it back on drop.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

pub trait BufferAllocator {
    /// Zero-initialised buffer of exactly `len` elements, or `None` when the
    /// backing store cannot satisfy the request.
    fn acquire(&self, len: usize) -> Option<Box<[f32]>>;

    /// Return a buffer obtained from [`BufferAllocator::acquire`].
    fn release(&self, buf: Box<[f32]>);
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for &A {
    fn acquire(&self, len: usize) -> Option<Box<[f32]>> {
        (**self).acquire(len)
    }

    fn release(&self, buf: Box<[f32]>) {
        (**self).release(buf);
    }
}

/// Buffer that is released to its allocator on every exit path.
#[derive(Debug)]
pub struct ScopedBuffer<'a, A: BufferAllocator + ?Sized> {
    alloc: &'a A,
    buf: Option<Box<[f32]>>,
}

impl<'a, A: BufferAllocator + ?Sized> ScopedBuffer<'a, A> {
    pub fn acquire(alloc: &'a A, len: usize) -> Option<Self> {
        let buf = alloc.acquire(len)?;
        Some(Self {
            alloc,
            buf: Some(buf),
        })
    }
}

impl<A: BufferAllocator + ?Sized> Deref for ScopedBuffer<'_, A> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl<A: BufferAllocator + ?Sized> DerefMut for ScopedBuffer<'_, A> {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<A: BufferAllocator + ?Sized> Drop for ScopedBuffer<'_, A> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.alloc.release(buf);
        }
    }
}

/// Process heap; fails only when the global allocator refuses the reservation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn acquire(&self, len: usize) -> Option<Box<[f32]>> {
        let mut v = Vec::new();
        v.try_reserve_exact(len).ok()?;
        v.resize(len, 0.0f32);
        Some(v.into_boxed_slice())
    }

    fn release(&self, buf: Box<[f32]>) {
        drop(buf);
    }
}

/// Fixed-capacity memory region, counted in `f32` elements.
///
/// Stands in for a dedicated external RAM pool: requests that would exceed
/// the remaining capacity fail, and usage is tracked so callers can check
/// that everything was handed back.
#[derive(Debug)]
pub struct RegionAllocator {
    capacity: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
    live: AtomicUsize,
}

impl RegionAllocator {
    #[must_use]
    pub fn new(capacity_elems: usize) -> Self {
        Self {
            capacity: capacity_elems,
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Highest `in_use` seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Buffers acquired and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl BufferAllocator for RegionAllocator {
    fn acquire(&self, len: usize) -> Option<Box<[f32]>> {
        let reserved = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(len).filter(|&total| total <= self.capacity)
            })
            .ok()?;

        let mut v = Vec::new();
        if v.try_reserve_exact(len).is_err() {
            self.in_use.fetch_sub(len, Ordering::AcqRel);
            return None;
        }
        v.resize(len, 0.0f32);

        self.peak.fetch_max(reserved + len, Ordering::AcqRel);
        self.live.fetch_add(1, Ordering::AcqRel);
        trace!(len, in_use = reserved + len, "region acquire");
        Some(v.into_boxed_slice())
    }

    fn release(&self, buf: Box<[f32]>) {
        let len = buf.len();
        drop(buf);
        self.in_use.fetch_sub(len, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
        trace!(len, "region release");
    }
}
