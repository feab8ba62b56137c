use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::foundation::config::BufferPoolConfig;
use crate::foundation::core::PixelFormat;
use crate::foundation::error::{LoomError, LoomResult};
use crate::raster::buffer::{BufferHandle, Raster, byte_len};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Counters describing pool behaviour since construction.
pub struct BufferPoolStats {
    /// Free buffers currently retained.
    pub retained_buffers: usize,
    /// Bytes currently retained in free buffers.
    pub retained_bytes: usize,
    /// Buffers handed out from the free list.
    pub reused: u64,
    /// Buffers freshly allocated by `acquire`.
    pub allocated: u64,
    /// Releases that were not retained (pool disabled or buffer too large).
    pub dropped_on_release: u64,
    /// Free buffers evicted to honour the bounds.
    pub evicted: u64,
    /// Releases rejected because the handle was stale.
    pub rejected: u64,
    /// Leased buffers dropped without a release; their slots were reclaimed.
    pub abandoned: u64,
}

enum SlotState {
    Vacant,
    Leased,
    Free(Vec<u8>),
}

struct Slot {
    generation: u32,
    bytes_per_pixel: usize,
    state: SlotState,
}

pub(crate) struct PoolState {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    // Free slots in release order; the front is the least recently released.
    free_order: VecDeque<u32>,
    stats: BufferPoolStats,
}

/// A raster's claim on a leased slot.
///
/// Dropping the lease (with its raster) vacates the slot; the storage goes with the raster.
#[derive(Debug)]
pub(crate) struct SlotLease {
    pub(crate) handle: BufferHandle,
    state: Option<Weak<Mutex<PoolState>>>,
}

impl SlotLease {
    /// A lease that no pool will reclaim on drop.
    #[cfg(test)]
    pub(crate) fn detached(handle: BufferHandle) -> Self {
        Self {
            handle,
            state: None,
        }
    }

    /// Hand the slot back to an explicit release.
    pub(crate) fn disarm(mut self) -> BufferHandle {
        self.state = None;
        self.handle
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        let Some(state) = self.state.take().and_then(|w| w.upgrade()) else {
            return;
        };
        let mut guard = state.lock();
        let st = &mut *guard;
        let Some(s) = st.slots.get_mut(self.handle.slot as usize) else {
            return;
        };
        if s.generation != self.handle.generation || !matches!(s.state, SlotState::Leased) {
            return;
        }
        s.generation = s.generation.wrapping_add(1);
        s.state = SlotState::Vacant;
        st.vacant.push(self.handle.slot);
        st.stats.abandoned = st.stats.abandoned.saturating_add(1);
    }
}

/// Bounded, process-wide pool of reusable raster storage.
///
/// The pool owns slot bookkeeping for every buffer it hands out. A raster carries a
/// [`BufferHandle`]; releasing bumps the slot generation, so a second release of the same handle
/// is rejected. A pooled raster dropped without a release gives its slot back. Eviction on
/// overflow is least-recently-released first.
pub struct BufferPool {
    opts: BufferPoolConfig,
    state: Arc<Mutex<PoolState>>,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("opts", &self.opts)
            .field("stats", &self.stats())
            .finish()
    }
}

impl BufferPool {
    /// Build an empty pool with the given bounds.
    pub fn new(opts: BufferPoolConfig) -> Self {
        Self {
            opts,
            state: Arc::new(Mutex::new(PoolState {
                slots: Vec::new(),
                vacant: Vec::new(),
                free_order: VecDeque::new(),
                stats: BufferPoolStats::default(),
            })),
        }
    }

    fn lease(&self, handle: BufferHandle) -> SlotLease {
        SlotLease {
            handle,
            state: Some(Arc::downgrade(&self.state)),
        }
    }

    fn enabled(&self) -> bool {
        self.opts.max_pool_bytes > 0 && self.opts.max_buffers > 0
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.state.lock().stats.clone()
    }

    /// Hand out a zeroed raster of the requested shape.
    ///
    /// Reuses a free buffer of the same bytes-per-pixel whose storage is large enough (exact
    /// length preferred, otherwise the smallest that fits). Never blocks: with nothing reusable a
    /// fresh buffer is allocated.
    pub fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> Raster {
        let needed = byte_len(width, height, format);
        if !self.enabled() {
            let mut st = self.state.lock();
            st.stats.allocated = st.stats.allocated.saturating_add(1);
            return Raster::from_pool(width, height, format, vec![0; needed], None);
        }

        let mut st = self.state.lock();
        let bpp = format.bytes_per_pixel();
        let mut best: Option<(usize, usize)> = None;
        for (pos, &slot) in st.free_order.iter().enumerate().rev() {
            let s = &st.slots[slot as usize];
            if s.bytes_per_pixel != bpp {
                continue;
            }
            let SlotState::Free(buf) = &s.state else {
                continue;
            };
            let cap = buf.capacity();
            if cap < needed {
                continue;
            }
            if cap == needed {
                best = Some((pos, cap));
                break;
            }
            if best.is_none_or(|(_, c)| cap < c) {
                best = Some((pos, cap));
            }
        }

        if let Some((pos, _)) = best
            && let Some(slot) = st.free_order.remove(pos)
        {
            let s = &mut st.slots[slot as usize];
            let mut buf = match std::mem::replace(&mut s.state, SlotState::Leased) {
                SlotState::Free(buf) => buf,
                _ => unreachable!("free_order only lists free slots"),
            };
            let handle = BufferHandle {
                slot,
                generation: s.generation,
            };
            let cap = buf.capacity();
            buf.clear();
            buf.resize(needed, 0);
            st.stats.retained_buffers = st.stats.retained_buffers.saturating_sub(1);
            st.stats.retained_bytes = st.stats.retained_bytes.saturating_sub(cap);
            st.stats.reused = st.stats.reused.saturating_add(1);
            tracing::trace!(slot, width, height, ?format, "buffer pool reuse");
            return Raster::from_pool(width, height, format, buf, Some(self.lease(handle)));
        }

        let handle = Self::lease_vacant(&mut st, bpp);
        st.stats.allocated = st.stats.allocated.saturating_add(1);
        Raster::from_pool(width, height, format, vec![0; needed], Some(self.lease(handle)))
    }

    /// Acquire a raster and fill it with `bytes`, which must match the shape exactly.
    pub fn acquire_copy(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        bytes: &[u8],
    ) -> LoomResult<Raster> {
        if bytes.len() != byte_len(width, height, format) {
            return Err(LoomError::validation(format!(
                "{} bytes do not fill a {width}x{height} {format:?} raster",
                bytes.len()
            )));
        }
        let mut raster = self.acquire(width, height, format);
        raster.data_mut().copy_from_slice(bytes);
        Ok(raster)
    }

    fn lease_vacant(st: &mut PoolState, bytes_per_pixel: usize) -> BufferHandle {
        let slot = match st.vacant.pop() {
            Some(i) => i,
            None => {
                st.slots.push(Slot {
                    generation: 0,
                    bytes_per_pixel,
                    state: SlotState::Vacant,
                });
                (st.slots.len() - 1) as u32
            }
        };
        let s = &mut st.slots[slot as usize];
        s.bytes_per_pixel = bytes_per_pixel;
        s.state = SlotState::Leased;
        BufferHandle {
            slot,
            generation: s.generation,
        }
    }

    /// Whether `handle` still refers to a leased buffer.
    pub fn is_live(&self, handle: BufferHandle) -> bool {
        let st = self.state.lock();
        st.slots.get(handle.slot as usize).is_some_and(|s| {
            s.generation == handle.generation && matches!(s.state, SlotState::Leased)
        })
    }

    /// Return a raster's storage to the pool.
    ///
    /// Rasters allocated outside the pool are adopted. The buffer is retained only if the bounds
    /// allow; overflow evicts the least recently released buffers. A stale handle is rejected
    /// and the storage dropped.
    pub fn release(&self, raster: Raster) -> LoomResult<()> {
        let bpp = raster.format().bytes_per_pixel();
        let (buf, handle) = raster.into_parts();
        let mut st = self.state.lock();

        let slot = match handle {
            Some(h) => {
                let valid = st.slots.get(h.slot as usize).is_some_and(|s| {
                    s.generation == h.generation && matches!(s.state, SlotState::Leased)
                });
                if !valid {
                    st.stats.rejected = st.stats.rejected.saturating_add(1);
                    return Err(LoomError::validation(format!(
                        "buffer handle slot {} generation {} is no longer leased",
                        h.slot, h.generation
                    )));
                }
                h.slot
            }
            None => {
                if !self.enabled() {
                    st.stats.dropped_on_release = st.stats.dropped_on_release.saturating_add(1);
                    return Ok(());
                }
                Self::lease_vacant(&mut st, bpp).slot
            }
        };

        let cap = buf.capacity();
        let s = &mut st.slots[slot as usize];
        s.generation = s.generation.wrapping_add(1);
        if !self.enabled() || cap > self.opts.max_pool_bytes {
            s.state = SlotState::Vacant;
            st.vacant.push(slot);
            st.stats.dropped_on_release = st.stats.dropped_on_release.saturating_add(1);
            return Ok(());
        }

        s.state = SlotState::Free(buf);
        st.free_order.push_back(slot);
        st.stats.retained_buffers = st.stats.retained_buffers.saturating_add(1);
        st.stats.retained_bytes = st.stats.retained_bytes.saturating_add(cap);

        while st.stats.retained_bytes > self.opts.max_pool_bytes
            || st.stats.retained_buffers > self.opts.max_buffers
        {
            let Some(oldest) = st.free_order.pop_front() else {
                break;
            };
            let evicted = std::mem::replace(&mut st.slots[oldest as usize].state, SlotState::Vacant);
            if let SlotState::Free(b) = evicted {
                st.stats.retained_bytes = st.stats.retained_bytes.saturating_sub(b.capacity());
            }
            st.stats.retained_buffers = st.stats.retained_buffers.saturating_sub(1);
            st.stats.evicted = st.stats.evicted.saturating_add(1);
            st.vacant.push(oldest);
        }
        Ok(())
    }

    /// Release, logging instead of failing. For discard paths that cannot propagate.
    pub(crate) fn recycle(&self, raster: Raster, reason: &str) {
        if let Err(e) = self.release(raster) {
            tracing::warn!(reason, error = %e, "buffer pool rejected release");
        }
    }

    /// Drop every free buffer.
    pub fn clear(&self) {
        let mut st = self.state.lock();
        while let Some(slot) = st.free_order.pop_front() {
            st.slots[slot as usize].state = SlotState::Vacant;
            st.vacant.push(slot);
        }
        st.stats.retained_buffers = 0;
        st.stats.retained_bytes = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/pool.rs"]
mod tests;
