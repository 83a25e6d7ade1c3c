//! Bounded single-producer / single-consumer segment ring.
//!
//! [`segment_queue`] allocates every slot once and returns the two halves.
//! Each half stores only its own index (Release) and loads the other's
//! (Acquire), so the producer and the consumer may live in different
//! threads without a lock:
//!
//! - [`SegmentProducer`] owns `tail` and the flush mark: `enqueue`, `reset`.
//! - [`SegmentConsumer`] owns `head`: `peek`, `peek_mut`, `dequeue_head`.
//!
//! Slots in `[head, tail)` belong to the consumer, all others to the
//! producer. `reset` cannot touch consumer slots; it moves the flush mark
//! to `tail`, and the consumer skips everything before the mark at once and
//! releases those slots on its next mutating call.
//!
//! Indices count up and wrap; `index % capacity` picks the slot.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use evo_common::trajectory::error::TpError;

use crate::segment::Segment;

// ─── Shared Ring ────────────────────────────────────────────────────

struct Ring {
    slots: Box<[UnsafeCell<Option<Segment>>]>,
    /// Next slot to consume. Written by the consumer only.
    head: AtomicUsize,
    /// Next slot to fill. Written by the producer only.
    tail: AtomicUsize,
    /// Segments before this index were reset away. Written by the producer only.
    flush: AtomicUsize,
}

// SAFETY: a slot is only accessed by the half that owns it under the
// head/tail protocol above, and ownership moves with a Release store that
// the other half observes with an Acquire load.
unsafe impl Sync for Ring {}

impl Ring {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut Option<Segment> {
        self.slots[index % self.slots.len()].get()
    }
}

/// First live index: the flush mark while it lies in `(head, tail]`.
#[inline]
fn live_head(head: usize, flush: usize, tail: usize) -> usize {
    let pending = flush.wrapping_sub(head);
    if pending != 0 && pending <= tail.wrapping_sub(head) {
        flush
    } else {
        head
    }
}

/// Allocate a ring with room for `capacity` segments.
pub fn segment_queue(capacity: usize) -> Result<(SegmentProducer, SegmentConsumer), TpError> {
    if capacity == 0 {
        return Err(TpError::InvalidArgument("queue size must be positive"));
    }
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(None))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let ring = Arc::new(Ring {
        slots,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        flush: AtomicUsize::new(0),
    });
    Ok((
        SegmentProducer {
            ring: Arc::clone(&ring),
        },
        SegmentConsumer { ring },
    ))
}

// ─── Producer ───────────────────────────────────────────────────────

/// Enqueue side of the ring.
pub struct SegmentProducer {
    ring: Arc<Ring>,
}

impl SegmentProducer {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Segments the consumer has not yet taken, as seen from this side.
    pub fn len(&self) -> usize {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let flush = self.ring.flush.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        tail.wrapping_sub(live_head(head, flush, tail))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No free slot. Reset segments keep their slots until the consumer
    /// releases them.
    pub fn is_full(&self) -> bool {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        tail.wrapping_sub(head) >= self.ring.capacity()
    }

    pub fn enqueue(&mut self, segment: Segment) -> Result<(), TpError> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.ring.capacity() {
            return Err(TpError::QueueFull {
                capacity: self.ring.capacity(),
            });
        }
        // SAFETY: `tail` is outside `[head, tail)`, so the consumer does not
        // access this slot until the store below publishes it.
        unsafe { *self.ring.slot(tail) = Some(segment) };
        self.ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Forget every queued segment.
    pub fn reset(&mut self) {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        self.ring.flush.store(tail, Ordering::Release);
    }
}

impl fmt::Debug for SegmentProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentProducer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

// ─── Consumer ───────────────────────────────────────────────────────

/// Execution side of the ring.
pub struct SegmentConsumer {
    ring: Arc<Ring>,
}

impl SegmentConsumer {
    /// Live head and tail. The flush mark is loaded first so the tail seen
    /// is never older than the mark.
    #[inline]
    fn bounds(&self) -> (usize, usize) {
        let head = self.ring.head.load(Ordering::Relaxed);
        let flush = self.ring.flush.load(Ordering::Acquire);
        let tail = self.ring.tail.load(Ordering::Acquire);
        (live_head(head, flush, tail), tail)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        let (head, tail) = self.bounds();
        tail.wrapping_sub(head)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment `offset` places behind the head.
    pub fn peek(&self, offset: usize) -> Option<&Segment> {
        let (head, tail) = self.bounds();
        if offset >= tail.wrapping_sub(head) {
            return None;
        }
        // SAFETY: the slot lies in `[head, tail)`; the producer does not
        // write it while `head` stays behind it, and only this half moves
        // `head`, which needs `&mut self`.
        unsafe { (*self.ring.slot(head.wrapping_add(offset))).as_ref() }
    }

    pub fn peek_mut(&mut self, offset: usize) -> Option<&mut Segment> {
        self.release_flushed();
        let (head, tail) = self.bounds();
        if offset >= tail.wrapping_sub(head) {
            return None;
        }
        // SAFETY: consumer-owned slot as in `peek`; `&mut self` makes the
        // borrow exclusive.
        unsafe { (*self.ring.slot(head.wrapping_add(offset))).as_mut() }
    }

    /// Head and its successor, borrowed mutably at the same time.
    pub fn head_pair_mut(&mut self) -> Option<(&mut Segment, Option<&mut Segment>)> {
        self.release_flushed();
        let (head, tail) = self.bounds();
        let len = tail.wrapping_sub(head);
        if len == 0 {
            return None;
        }
        // SAFETY: both slots are consumer-owned. With `len >= 2` they are
        // distinct cells because `len <= capacity`.
        unsafe {
            let first = (*self.ring.slot(head)).as_mut()?;
            let second = if len >= 2 {
                (*self.ring.slot(head.wrapping_add(1))).as_mut()
            } else {
                None
            };
            Some((first, second))
        }
    }

    /// Drop the head segment. Returns `false` on an empty queue.
    pub fn dequeue_head(&mut self) -> bool {
        self.release_flushed();
        let (head, tail) = self.bounds();
        if head == tail {
            return false;
        }
        // SAFETY: consumer-owned slot, handed back by the store below.
        unsafe { *self.ring.slot(head) = None };
        self.ring.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue everything currently visible. Returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.dequeue_head() {
            dropped += 1;
        }
        dropped
    }

    /// Hand the slots of reset segments back to the producer.
    pub fn release_flushed(&mut self) {
        let head = self.ring.head.load(Ordering::Relaxed);
        let (live, _) = self.bounds();
        if live == head {
            return;
        }
        let mut index = head;
        while index != live {
            // SAFETY: `[head, live)` is still consumer-owned.
            unsafe { *self.ring.slot(index) = None };
            index = index.wrapping_add(1);
        }
        self.ring.head.store(live, Ordering::Release);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        (0..self.len()).filter_map(move |i| self.peek(i))
    }
}

impl fmt::Debug for SegmentConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentConsumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
