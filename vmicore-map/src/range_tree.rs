use crate::node::{MemoryMapNode, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;

type SlotId = u32;

enum SlotKind {
    Leaf {
        items: Vec<NodeId>,
        prev: Option<SlotId>,
        next: Option<SlotId>,
    },
    Branch {
        mid: u64,
        left: SlotId,
        right: SlotId,
    },
}

struct Slot {
    lo: u64,
    hi: u64,
    /// Membership touches in this subtree; a node overlapping a split
    /// point counts once per leaf it lands in, not once per node, so
    /// this is an aggregate weight rather than a distinct-object count.
    count: usize,
    kind: SlotKind,
}

fn midpoint(lo: u64, hi: u64) -> u64 {
    lo + ((hi as u128 - lo as u128) / 2) as u64
}

/// Coarse aggregate over an address range, computed by stopping descent
/// as soon as a slot's own interval is fully contained in the query
/// (spec.md §4.E.7: "aggregates ... without descending to leaves").
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeSummary {
    pub count: usize,
}

struct TreeInner {
    slots: Vec<Slot>,
    first: SlotId,
    last: SlotId,
    /// Bounds of every inserted node, needed when a leaf splits and its
    /// existing items must be redistributed by their own address range.
    bounds: HashMap<NodeId, (u64, u64)>,
}

impl TreeInner {
    fn new() -> Self {
        let root = Slot {
            lo: 0,
            hi: u64::MAX,
            count: 0,
            kind: SlotKind::Leaf { items: Vec::new(), prev: None, next: None },
        };
        Self { slots: vec![root], first: 0, last: 0, bounds: HashMap::new() }
    }

    fn split(&mut self, slot_id: SlotId) {
        let (lo, hi, items, prev, next) = {
            let slot = &mut self.slots[slot_id as usize];
            match &mut slot.kind {
                SlotKind::Leaf { items, prev, next } => {
                    (slot.lo, slot.hi, std::mem::take(items), *prev, *next)
                }
                SlotKind::Branch { .. } => return,
            }
        };
        let mid = midpoint(lo, hi);

        let left_id = self.slots.len() as SlotId;
        self.slots.push(Slot { lo, hi: mid, count: 0, kind: SlotKind::Leaf { items: Vec::new(), prev, next: None } });
        let right_id = left_id + 1;
        self.slots.push(Slot { lo: mid, hi, count: 0, kind: SlotKind::Leaf { items: Vec::new(), prev: None, next } });

        if let SlotKind::Leaf { next: left_next, .. } = &mut self.slots[left_id as usize].kind {
            *left_next = Some(right_id);
        }
        if let SlotKind::Leaf { prev: right_prev, .. } = &mut self.slots[right_id as usize].kind {
            *right_prev = Some(left_id);
        }
        if let Some(p) = prev {
            if let SlotKind::Leaf { next, .. } = &mut self.slots[p as usize].kind {
                *next = Some(left_id);
            }
        }
        if let Some(n) = next {
            if let SlotKind::Leaf { prev, .. } = &mut self.slots[n as usize].kind {
                *prev = Some(right_id);
            }
        }
        if self.first == slot_id {
            self.first = left_id;
        }
        if self.last == slot_id {
            self.last = right_id;
        }

        for item in items {
            let (addr, end) = self.bounds.get(&item).copied().unwrap_or((lo, lo + 1));
            if addr < mid {
                self.add_item(left_id, item);
            }
            if end > mid {
                self.add_item(right_id, item);
            }
        }

        self.slots[slot_id as usize].kind = SlotKind::Branch { mid, left: left_id, right: right_id };
    }

    fn add_item(&mut self, slot_id: SlotId, item: NodeId) {
        self.slots[slot_id as usize].count += 1;
        if let SlotKind::Leaf { items, .. } = &mut self.slots[slot_id as usize].kind {
            items.push(item);
        }
    }

    fn insert_at(&mut self, slot_id: SlotId, addr: u64, end: u64, node_id: NodeId) {
        let (lo, hi, branch) = {
            let slot = &self.slots[slot_id as usize];
            match &slot.kind {
                SlotKind::Branch { mid, left, right } => (slot.lo, slot.hi, Some((*mid, *left, *right))),
                SlotKind::Leaf { .. } => (slot.lo, slot.hi, None),
            }
        };

        if let Some((mid, left, right)) = branch {
            self.slots[slot_id as usize].count += 1;
            if addr < mid {
                self.insert_at(left, addr, end, node_id);
            }
            if end > mid {
                self.insert_at(right, addr, end, node_id);
            }
            return;
        }

        let leaf_width = hi.saturating_sub(lo);
        let node_width = end.saturating_sub(addr).max(1);
        if leaf_width > node_width {
            self.split(slot_id);
            self.insert_at(slot_id, addr, end, node_id);
            return;
        }

        self.add_item(slot_id, node_id);
    }

    fn find_leaf(&self, addr: u64) -> SlotId {
        let mut cur = 0;
        loop {
            match &self.slots[cur as usize].kind {
                SlotKind::Leaf { .. } => return cur,
                SlotKind::Branch { mid, left, right } => {
                    cur = if addr < *mid { *left } else { *right };
                }
            }
        }
    }

    fn summarize(&self, slot_id: SlotId, lo: u64, hi: u64) -> RangeSummary {
        let slot = &self.slots[slot_id as usize];
        if slot.lo >= hi || slot.hi <= lo {
            return RangeSummary::default();
        }
        if slot.lo >= lo && slot.hi <= hi {
            return RangeSummary { count: slot.count };
        }
        match &slot.kind {
            SlotKind::Leaf { items, .. } => RangeSummary { count: items.len() },
            SlotKind::Branch { left, right, .. } => {
                let l = self.summarize(*left, lo, hi);
                let r = self.summarize(*right, lo, hi);
                RangeSummary { count: l.count + r.count }
            }
        }
    }
}

/// A binary tree splitting the 64-bit address space into half-open leaf
/// intervals, used for duplicate suppression and address lookup during
/// map construction (spec.md §4.E.7). Single reader-writer lock: readers
/// run concurrently, insertions are exclusive (spec.md §5).
pub struct MemoryRangeTree {
    inner: RwLock<TreeInner>,
}

impl Default for MemoryRangeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRangeTree {
    pub fn new() -> Self {
        Self { inner: RwLock::new(TreeInner::new()) }
    }

    pub fn insert(&self, node: &MemoryMapNode) {
        let addr = node.address;
        let end = node.end_address().max(addr + 1);
        let mut inner = self.inner.write();
        inner.bounds.insert(node.id, (addr, end));
        inner.insert_at(0, addr, end, node.id);
    }

    pub fn objects_at(&self, addr: u64) -> Vec<NodeId> {
        let inner = self.inner.read();
        let leaf = inner.find_leaf(addr);
        match &inner.slots[leaf as usize].kind {
            SlotKind::Leaf { items, .. } => items.clone(),
            SlotKind::Branch { .. } => unreachable!("find_leaf always returns a leaf"),
        }
    }

    pub fn objects_in_range(&self, lo: u64, hi: u64) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut cur = Some(inner.find_leaf(lo));
        while let Some(slot_id) = cur {
            let slot = &inner.slots[slot_id as usize];
            if slot.lo >= hi {
                break;
            }
            match &slot.kind {
                SlotKind::Leaf { items, next, .. } => {
                    for &item in items {
                        if seen.insert(item) {
                            out.push(item);
                        }
                    }
                    cur = if slot.hi < hi { *next } else { None };
                }
                SlotKind::Branch { .. } => break,
            }
        }
        out
    }

    pub fn properties_of_range(&self, lo: u64, hi: u64) -> RangeSummary {
        let inner = self.inner.read();
        inner.summarize(0, lo, hi)
    }

    pub fn first_leaf_addr(&self) -> u64 {
        let inner = self.inner.read();
        inner.slots[inner.first as usize].lo
    }

    pub fn last_leaf_addr(&self) -> u64 {
        let inner = self.inner.read();
        inner.slots[inner.last as usize].hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_types::TypeId;

    fn node(id: u32, addr: u64, size: u64) -> MemoryMapNode {
        MemoryMapNode::new(NodeId(id), addr, size, TypeId(0), "t", "p")
    }

    #[test]
    fn objects_at_finds_inserted_node() {
        let tree = MemoryRangeTree::new();
        tree.insert(&node(1, 0x1000, 16));
        let found = tree.objects_at(0x1004);
        assert_eq!(found, vec![NodeId(1)]);
    }

    #[test]
    fn objects_in_range_spans_split_leaves() {
        let tree = MemoryRangeTree::new();
        tree.insert(&node(1, 0x1000, 0x2000));
        tree.insert(&node(2, 0x1500, 16));
        let found = tree.objects_in_range(0x1000, 0x3000);
        assert!(found.contains(&NodeId(1)));
        assert!(found.contains(&NodeId(2)));
    }

    #[test]
    fn disjoint_nodes_dont_share_a_leaf() {
        let tree = MemoryRangeTree::new();
        tree.insert(&node(1, 0x1000, 8));
        tree.insert(&node(2, 0x9000, 8));
        assert_eq!(tree.objects_at(0x1000), vec![NodeId(1)]);
        assert_eq!(tree.objects_at(0x9000), vec![NodeId(2)]);
    }
}
