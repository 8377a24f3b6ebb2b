use std::cmp::Ordering;

/// Use with `BinaryHeap`. Since it's a max-heap, the comparison is reversed to pop the smallest
/// cost first. Items with equal cost pop in the order they were pushed, according to `order`, so
/// searches are deterministic without needing `V: Ord`.
#[derive(Clone, Debug)]
pub struct PriorityQueueItem<K, V> {
    pub cost: K,
    pub order: usize,
    pub value: V,
}

impl<K, V> PriorityQueueItem<K, V> {
    /// `order` should increase with every push.
    pub fn new(cost: K, order: usize, value: V) -> PriorityQueueItem<K, V> {
        PriorityQueueItem { cost, order, value }
    }
}

impl<K: Ord, V> PartialEq for PriorityQueueItem<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, V> Eq for PriorityQueueItem<K, V> {}

impl<K: Ord, V> PartialOrd for PriorityQueueItem<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> Ord for PriorityQueueItem<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    #[test]
    fn cheapest_first_then_fifo() {
        let mut queue = BinaryHeap::new();
        queue.push(PriorityQueueItem::new(5, 0, "late"));
        queue.push(PriorityQueueItem::new(1, 1, "first tie"));
        queue.push(PriorityQueueItem::new(1, 2, "second tie"));
        queue.push(PriorityQueueItem::new(0, 3, "cheapest"));

        let popped: Vec<&str> = std::iter::from_fn(|| queue.pop().map(|item| item.value)).collect();
        assert_eq!(popped, vec!["cheapest", "first tie", "second tie", "late"]);
    }
}
