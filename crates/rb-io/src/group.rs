//! Process groups for collective I/O.
//!
//! Rank 0 is the leader: it alone touches the filesystem and broadcasts
//! what it read to everyone else.

use std::sync::{Arc, Barrier, Mutex, PoisonError};

pub trait ProcessGroup: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Block until every rank reaches this point.
    fn barrier(&self);

    /// Every rank receives the leader's payload. Non-leaders pass `None`.
    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Vec<u8>;

    fn is_leader(&self) -> bool {
        self.rank() == 0
    }
}

/// A group of one. Collectives are no-ops.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProcess;

impl ProcessGroup for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Vec<u8> {
        payload.unwrap_or_default()
    }
}

struct Shared {
    size: usize,
    barrier: Barrier,
    slot: Mutex<Vec<u8>>,
}

/// One rank of a group of threads in the same process.
#[derive(Clone)]
pub struct LocalGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Handles for ranks `0..size`, one per thread.
    pub fn new(size: usize) -> Vec<LocalGroup> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slot: Mutex::new(Vec::new()),
        });
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl std::fmt::Debug for LocalGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGroup")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}

impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Vec<u8> {
        if self.is_leader() {
            let mut slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
            *slot = payload.unwrap_or_default();
        }
        self.shared.barrier.wait();
        let received = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        // the slot must not be overwritten before every rank has read it
        self.shared.barrier.wait();
        received
    }
}
