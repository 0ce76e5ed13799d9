//! Core traits shared by every format loader: the iterator contract
//! (spec §4.7) and the loader lock-state machine (spec §5).
//!
//! Grounded on `starbreaker-parsers::traits`'s `Parser`/`StreamingParser`
//! split, generalised from "one parser, many file kinds" to "one
//! iterator contract, many mesh formats".

use std::sync::atomic::{AtomicBool, Ordering};

use meshstream_core::{ByteReader, DataChunk, Error, LoaderListener, Material, Result, Texture};

/// Every format's streaming iterator implements this. `has_next`/`next`
/// mirror the spec's `hasNext()`/`next()`; calling `next` when
/// `has_next` is false is a caller error, surfaced as
/// [`Error::NotAvailable`].
pub trait MeshIterator {
    /// True while another chunk remains to be produced.
    fn has_next(&self) -> bool;

    /// Produce the next chunk. Fails with [`Error::NotAvailable`] if
    /// `has_next()` was false.
    fn next(&mut self) -> Result<DataChunk>;

    /// Total chunk count, if known up front. Most formats here don't
    /// know this ahead of the final flush, so the default is `None`.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// Tracks the "locked" window described in spec §5: a loader is locked
/// from the first entry into `load`/`is_valid_file`/`write` until its
/// iterator is exhausted or closed. The lock is advisory (readable by
/// callers for back-pressure) rather than preemptive — it does not by
/// itself prevent reentrant calls, callers are expected to honor it.
#[derive(Default)]
pub struct LockState {
    locked: AtomicBool,
}

impl LockState {
    pub fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Fails with [`Error::Locked`] if currently locked; otherwise a
    /// no-op. Used by setter methods on a loader mid-parse.
    pub fn check_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            Err(Error::Locked)
        } else {
            Ok(())
        }
    }
}

/// Fires 1%-threshold progress notifications over a known total,
/// matching spec §4.7's "whenever the cumulative delta exceeds a 1%
/// threshold".
pub struct ProgressTracker {
    total: u64,
    processed: u64,
    last_reported_percent: u32,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: 0,
            last_reported_percent: 0,
        }
    }

    /// Advance by `delta` bytes/items; returns `Some(progress)` in
    /// `[0, 1]` only when crossing a new 1% threshold.
    pub fn advance(&mut self, delta: u64) -> Option<f32> {
        self.processed = self.processed.saturating_add(delta);
        if self.total == 0 {
            return None;
        }
        let percent = ((self.processed as f64 / self.total as f64) * 100.0) as u32;
        let percent = percent.min(100);
        if percent > self.last_reported_percent {
            self.last_reported_percent = percent;
            Some((self.processed as f32 / self.total as f32).min(1.0))
        } else {
            None
        }
    }

    pub fn fire(&mut self, delta: u64, listener: &LoaderListener) {
        if let Some(progress) = self.advance(delta) {
            listener.fire_progress(progress);
        }
    }
}

/// The common case: a format has already produced its full chunk list
/// (eagerly, during `load`) and just needs to hand it out one at a
/// time through the [`MeshIterator`] contract.
pub struct VecMeshIterator {
    chunks: std::vec::IntoIter<DataChunk>,
    total: usize,
}

impl VecMeshIterator {
    pub fn new(chunks: Vec<DataChunk>) -> Self {
        Self {
            total: chunks.len(),
            chunks: chunks.into_iter(),
        }
    }
}

impl MeshIterator for VecMeshIterator {
    fn has_next(&self) -> bool {
        self.chunks.len() > 0
    }

    fn next(&mut self) -> Result<DataChunk> {
        self.chunks
            .next()
            .ok_or_else(|| Error::not_available("no more chunks"))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

/// Everything a format's `load` produces: the chunk stream plus the
/// parse-global material/texture tables chunks refer to by id (spec §3
/// "shared by chunks through by-identifier reference"). Formats with no
/// material concept (PLY, STL) return empty tables.
pub struct LoadedMesh {
    pub iterator: Box<dyn MeshIterator>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

/// `&mut dyn ByteReader` is awkward through a `Box<dyn ByteReader>`;
/// this small helper keeps call sites terse across the format parsers.
pub trait AsMutReader {
    fn as_mut(&mut self) -> &mut dyn ByteReader;
}

impl AsMutReader for Box<dyn ByteReader + Send> {
    fn as_mut(&mut self) -> &mut dyn ByteReader {
        &mut **self
    }
}
