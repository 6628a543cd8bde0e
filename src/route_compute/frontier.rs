use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    node: usize,
    cost: f64,
    hops: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of tentative node distances with lazy deletion of stale entries.
#[derive(Debug, Default, Clone)]
pub struct DistanceFrontier {
    heap: BinaryHeap<QueueEntry>,
}

impl DistanceFrontier {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, node: usize, cost: f64, hops: usize) {
        self.heap.push(QueueEntry { node, cost, hops });
    }

    pub fn pop_min<F>(&mut self, mut is_stale: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize, f64, usize) -> bool,
    {
        while let Some(entry) = self.heap.pop() {
            if is_stale(entry.node, entry.cost, entry.hops) {
                continue;
            }
            return Some((entry.node, entry.cost));
        }
        None
    }
}
