use parking_lot::{Condvar, Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct HeapEntry<T> {
    priority: f64,
    payload: T,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.partial_cmp(&other.priority).unwrap_or(Ordering::Equal)
    }
}

/// Shared worklist keyed by probability (spec.md §4.E.2): builder threads
/// pop the highest-probability node first. Guarded by a single mutex;
/// push/pop are the heap's usual O(log N).
pub struct PriorityWorklist<T> {
    heap: Mutex<BinaryHeap<HeapEntry<T>>>,
    floor: f64,
}

impl<T> PriorityWorklist<T> {
    pub fn new(floor: f64) -> Self {
        Self { heap: Mutex::new(BinaryHeap::new()), floor }
    }

    /// Below-floor candidates are dropped at push time, not filtered at
    /// pop time, so the floor invariant holds even if a caller inspects
    /// the heap directly (spec.md §8: "never holds a node whose
    /// probability is below the configured floor").
    pub fn push(&self, priority: f64, payload: T) -> bool {
        if priority < self.floor {
            return false;
        }
        self.heap.lock().push(HeapEntry { priority, payload });
        true
    }

    pub fn pop(&self) -> Option<T> {
        self.heap.lock().pop().map(|e| e.payload)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }
}

/// Per-address coordination (spec.md §4.E.2): a thread about to
/// materialise a child at address `A` checks whether another thread
/// already holds `A`; if so, it waits on that thread's per-thread lock
/// rather than a global one, so unrelated addresses never contend.
pub struct AddressCoordinator {
    current_addresses: RwLock<Vec<Option<u64>>>,
    per_thread: Vec<(Mutex<()>, Condvar)>,
}

impl AddressCoordinator {
    pub fn new(thread_count: usize) -> Self {
        Self {
            current_addresses: RwLock::new(vec![None; thread_count]),
            per_thread: (0..thread_count).map(|_| (Mutex::new(()), Condvar::new())).collect(),
        }
    }

    /// Blocks until no other thread holds `addr`, then claims it for
    /// `thread_id`. Callers must pair this with [`Self::release`].
    pub fn claim(&self, thread_id: usize, addr: u64) {
        loop {
            let holder = {
                let addrs = self.current_addresses.read();
                addrs
                    .iter()
                    .enumerate()
                    .find(|(tid, a)| **a == Some(addr) && *tid != thread_id)
                    .map(|(tid, _)| tid)
            };
            let Some(holder_tid) = holder else { break };
            let (lock, cvar) = &self.per_thread[holder_tid];
            let mut guard = lock.lock();
            if self.current_addresses.read()[holder_tid] == Some(addr) {
                cvar.wait(&mut guard);
            }
        }
        self.current_addresses.write()[thread_id] = Some(addr);
    }

    pub fn release(&self, thread_id: usize) {
        self.current_addresses.write()[thread_id] = None;
        self.per_thread[thread_id].1.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_highest_priority_first() {
        let q = PriorityWorklist::new(0.0);
        q.push(0.3, "low");
        q.push(0.9, "high");
        q.push(0.5, "mid");
        assert_eq!(q.pop(), Some("high"));
        assert_eq!(q.pop(), Some("mid"));
        assert_eq!(q.pop(), Some("low"));
    }

    #[test]
    fn below_floor_is_rejected() {
        let q: PriorityWorklist<&str> = PriorityWorklist::new(0.2);
        assert!(!q.push(0.1, "dropped"));
        assert!(q.is_empty());
    }

    #[test]
    fn claim_and_release_round_trip() {
        let coord = AddressCoordinator::new(2);
        coord.claim(0, 0x1000);
        coord.release(0);
        coord.claim(1, 0x1000);
        coord.release(1);
    }
}
