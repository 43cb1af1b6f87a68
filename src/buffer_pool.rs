//! Pool of per-layer vertex buffers.
//!
//! Every tile layer that has drawn at least once owns one entry, addressed by
//! a [`BufferId`].  The layer keeps only the id; the pool keeps the buffer.
//! Entries untouched for longer than the idle window are dropped by
//! [`VertexBufferPool::sweep`], which piggybacks on every lookup, so a layer
//! that stops drawing (scrolled away, destroyed, or its map unloaded) gives its
//! memory back without an explicit release.

use std::time::{SystemTime, UNIX_EPOCH};

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

/// Default idle window before an untouched buffer is reclaimed.
pub const DEFAULT_IDLE_MS: u64 = 10_000;

new_key_type! {
    /// Stable handle to a pooled buffer.  Stale handles never alias a newer
    /// entry: they simply miss.
    pub struct BufferId;
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Millisecond time source used for idle tracking.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.  May jump backwards when the system clock is adjusted;
/// the pool treats that as a reason to sweep.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// ── PooledBuffer ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PooledBuffer<B> {
    pub buffer: B,
    /// Allocated size in bytes.
    pub size: u64,
    last_access: u64,
}

impl<B> PooledBuffer<B> {
    pub fn last_access(&self) -> u64 {
        self.last_access
    }
}

// ── VertexBufferPool ──────────────────────────────────────────────────────────

pub struct VertexBufferPool<B> {
    entries: SlotMap<BufferId, PooledBuffer<B>>,
    clock: Box<dyn Clock>,
    idle_ms: u64,
    last_sweep: u64,
}

impl<B> VertexBufferPool<B> {
    pub fn new(idle_ms: u64) -> Self {
        Self::with_clock(idle_ms, Box::new(SystemClock))
    }

    pub fn with_clock(idle_ms: u64, clock: Box<dyn Clock>) -> Self {
        let last_sweep = clock.now_ms();
        Self { entries: SlotMap::with_key(), clock, idle_ms, last_sweep }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `id`, refreshing its access time.  Sweeps first, so an entry
    /// that went idle is gone even if its owner asks for it.
    pub fn acquire(&mut self, id: BufferId) -> Option<&mut PooledBuffer<B>> {
        self.sweep();
        let now = self.clock.now_ms();
        let entry = self.entries.get_mut(id)?;
        entry.last_access = now;
        Some(entry)
    }

    /// Read-only lookup for draw submission; neither sweeps nor touches.
    pub fn get(&self, id: BufferId) -> Option<&PooledBuffer<B>> {
        self.entries.get(id)
    }

    /// Register a freshly allocated buffer of `size` bytes.
    pub fn create(&mut self, buffer: B, size: u64) -> BufferId {
        let last_access = self.clock.now_ms();
        self.entries.insert(PooledBuffer { buffer, size, last_access })
    }

    /// Drop the buffer behind `id` immediately.
    pub fn release(&mut self, id: BufferId) -> Option<B> {
        self.entries.remove(id).map(|e| e.buffer)
    }

    /// Forget every buffer, e.g. after the GPU context was lost.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reclaim buffers idle for longer than the idle window.
    ///
    /// Does nothing unless a full idle window has passed since the previous
    /// sweep, or the clock went backwards.  Returns the number freed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let threshold = now.saturating_sub(self.idle_ms);
        if self.last_sweep >= threshold && self.last_sweep <= now {
            return 0;
        }
        self.last_sweep = now;

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_access >= threshold);
        let freed = before - self.entries.len();
        if freed > 0 {
            debug!(freed, remaining = self.entries.len(), "reclaimed idle vertex buffers");
        }
        freed
    }
}
