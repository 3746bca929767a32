use crate::node::{MemoryMapNode, NodeId};
use std::collections::HashMap;

/// A coarse histogram bucket: `[lo, hi)` over the `[0, 1]` probability
/// range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Post-build statistics bucketing every node's probability against
/// slab-validity ground truth, used to sanity-check the probability
/// weights empirically rather than just by inspection (SPEC_FULL.md
/// item 2).
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub histogram: Vec<Bucket>,
    /// Minimum probability among nodes confirmed valid by slab metadata.
    pub min_confirmed_valid: Option<f64>,
    /// Maximum probability among nodes confirmed invalid by slab metadata.
    pub max_confirmed_invalid: Option<f64>,
    pub total_nodes: usize,
}

const BUCKET_COUNT: usize = 10;

/// `slab_valid(node)` is `None` when no slab ground truth is available
/// for that node (most nodes, absent live slab-cache introspection), and
/// `Some(valid)` otherwise.
pub fn verify(nodes: &HashMap<NodeId, MemoryMapNode>, slab_valid: impl Fn(&MemoryMapNode) -> Option<bool>) -> VerificationReport {
    let mut histogram: Vec<Bucket> = (0..BUCKET_COUNT)
        .map(|i| Bucket { lo: i as f64 / BUCKET_COUNT as f64, hi: (i + 1) as f64 / BUCKET_COUNT as f64, count: 0 })
        .collect();
    let mut min_confirmed_valid = None;
    let mut max_confirmed_invalid = None;

    for node in nodes.values() {
        let bucket_idx = ((node.probability * BUCKET_COUNT as f64) as usize).min(BUCKET_COUNT - 1);
        if let Some(bucket) = histogram.get_mut(bucket_idx) {
            bucket.count += 1;
        }

        match slab_valid(node) {
            Some(true) => {
                min_confirmed_valid = Some(min_confirmed_valid.map_or(node.probability, |m: f64| m.min(node.probability)));
            }
            Some(false) => {
                max_confirmed_invalid = Some(max_confirmed_invalid.map_or(node.probability, |m: f64| m.max(node.probability)));
            }
            None => {}
        }
    }

    VerificationReport { histogram, min_confirmed_valid, max_confirmed_invalid, total_nodes: nodes.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_types::TypeId;

    fn node(id: u32, probability: f64) -> MemoryMapNode {
        MemoryMapNode::new(NodeId(id), 0x1000 + id as u64, 8, TypeId(0), "t", "p").with_probability(probability)
    }

    #[test]
    fn buckets_by_probability_decile() {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId(0), node(0, 0.05));
        nodes.insert(NodeId(1), node(1, 0.95));
        let report = verify(&nodes, |_| None);
        assert_eq!(report.histogram[0].count, 1);
        assert_eq!(report.histogram[9].count, 1);
        assert_eq!(report.total_nodes, 2);
    }

    #[test]
    fn tracks_min_valid_and_max_invalid() {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId(0), node(0, 0.9));
        nodes.insert(NodeId(1), node(1, 0.6));
        nodes.insert(NodeId(2), node(2, 0.2));
        let report = verify(&nodes, |n| if n.id == NodeId(0) || n.id == NodeId(1) { Some(true) } else { Some(false) });
        assert_eq!(report.min_confirmed_valid, Some(0.6));
        assert_eq!(report.max_confirmed_invalid, Some(0.2));
    }
}
