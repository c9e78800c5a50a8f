/// Fixed-capacity circular buffer holding the look-back window.
///
/// Single writer, single reader at a time. Wrap in
/// `Arc<parking_lot::Mutex<RingBuffer<T>>>` for cross-thread access.
///
/// Overflow behavior: the logically oldest element is evicted, a push never
/// blocks and never fails.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    write_cursor: usize,
    len: usize,
    evicted_total: u64,
}

impl<T> RingBuffer<T> {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            write_cursor: 0,
            len: 0,
            evicted_total: 0,
        }
    }

    /// Insert `item`, returning the element it evicted when the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = self.slots[self.write_cursor].replace(item);
        self.write_cursor = (self.write_cursor + 1) % self.capacity();
        if evicted.is_some() {
            self.evicted_total += 1;
        } else {
            self.len += 1;
        }
        evicted
    }

    /// Move every element out, oldest first, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<T> {
        let start = self.oldest_index();
        let capacity = self.capacity();
        let mut items = Vec::with_capacity(self.len);
        for offset in 0..self.len {
            if let Some(item) = self.slots[(start + offset) % capacity].take() {
                items.push(item);
            }
        }
        self.write_cursor = 0;
        self.len = 0;
        items
    }

    /// Remove all elements. The capacity is kept.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write_cursor = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Most recently pushed element.
    pub fn newest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let index = (self.write_cursor + self.capacity() - 1) % self.capacity();
        self.slots[index].as_ref()
    }

    /// Elements dropped by overflow since creation.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    fn oldest_index(&self) -> usize {
        (self.write_cursor + self.capacity() - self.len) % self.capacity()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Point-in-time copy of all elements, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let start = self.oldest_index();
        (0..self.len)
            .filter_map(|offset| self.slots[(start + offset) % self.capacity()].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_snapshot_in_order() {
        let mut buf = RingBuffer::new(4);
        buf.push(1);
        buf.push(2);
        buf.push(3);

        assert_eq!(buf.len(), 3);
        assert!(!buf.is_full());
        assert_eq!(buf.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut buf = RingBuffer::new(3);
        for i in 1..=3 {
            assert_eq!(buf.push(i), None);
        }
        assert_eq!(buf.push(4), Some(1));
        assert_eq!(buf.push(5), Some(2));

        assert_eq!(buf.snapshot(), vec![3, 4, 5]);
        assert_eq!(buf.evicted_total(), 2);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut buf = RingBuffer::new(7);
        for i in 0..100 {
            buf.push(i);
            assert!(buf.len() <= buf.capacity());
        }
        assert!(buf.is_full());
    }

    #[test]
    fn snapshot_reflects_last_capacity_pushes() {
        let capacity = 5;
        let mut buf = RingBuffer::new(capacity);
        buf.push(-1);
        let early = buf.snapshot();

        let n = 13;
        for i in 0..(capacity + n) as i32 {
            buf.push(i);
        }

        assert_eq!(early, vec![-1]);
        let expected: Vec<i32> = ((n as i32)..(capacity + n) as i32).collect();
        assert_eq!(buf.snapshot(), expected);
    }

    #[test]
    fn drain_moves_everything_out() {
        let mut buf = RingBuffer::new(3);
        for word in ["a", "b", "c", "d"] {
            buf.push(word.to_string());
        }

        assert_eq!(buf.drain(), vec!["b", "c", "d"]);
        assert!(buf.is_empty());
        assert!(buf.snapshot().is_empty());

        // Still usable afterwards.
        buf.push("e".to_string());
        assert_eq!(buf.snapshot(), vec!["e"]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = RingBuffer::new(4);
        buf.push(1);
        buf.push(2);
        buf.clear();

        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
        buf.push(9);
        assert_eq!(buf.snapshot(), vec![9]);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buf = RingBuffer::new(0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.snapshot(), vec![2]);
    }

    #[test]
    fn newest_follows_wraparound() {
        let mut buf = RingBuffer::new(2);
        assert_eq!(buf.newest(), None);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        assert_eq!(buf.newest(), Some(&3));
        buf.clear();
        assert_eq!(buf.newest(), None);
    }
}
