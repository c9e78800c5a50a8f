use parking_lot::Mutex;

use crate::models::state::{AtomicCaptureState, CaptureState};
use crate::processing::ring_buffer::RingBuffer;

struct FeedInner<T> {
    ring: RingBuffer<T>,
    look_forward: Option<Vec<T>>,
}

/// Ingestion point of one producer.
///
/// While `Capturing`, items go into the ring buffer. While `Saving`, the ring
/// is frozen and items go into the look-forward sequence if a session opened
/// one. The state is read under the feed lock so no item can land in the ring
/// after a session drained it.
pub(crate) struct CaptureFeed<T> {
    inner: Mutex<FeedInner<T>>,
}

impl<T> CaptureFeed<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FeedInner {
                ring: RingBuffer::new(capacity),
                look_forward: None,
            }),
        }
    }

    /// Route `item` according to the current controller state. Never blocks
    /// beyond the O(1) push.
    pub fn ingest(&self, state: &AtomicCaptureState, item: T) {
        let mut inner = self.inner.lock();
        match state.load() {
            CaptureState::Capturing => {
                inner.ring.push(item);
            }
            CaptureState::Saving => {
                if let Some(sequence) = inner.look_forward.as_mut() {
                    sequence.push(item);
                }
            }
            CaptureState::Idle => {}
        }
    }

    pub fn open_look_forward(&self) {
        self.inner.lock().look_forward = Some(Vec::new());
    }

    /// Close the look-forward sequence and return what it collected.
    pub fn take_look_forward(&self) -> Vec<T> {
        self.inner.lock().look_forward.take().unwrap_or_default()
    }

    /// Move the buffered history out, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.inner.lock().ring.drain()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.ring.clear();
        inner.look_forward = None;
    }

    /// Apply `f` to the most recent item in the ring.
    pub fn with_newest<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.lock().ring.newest().map(f)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().ring.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_state() {
        let state = AtomicCaptureState::new(CaptureState::Idle);
        let feed = CaptureFeed::new(4);

        feed.ingest(&state, 0);
        assert_eq!(feed.len(), 0);

        state.store(CaptureState::Capturing);
        feed.ingest(&state, 1);
        feed.ingest(&state, 2);
        feed.open_look_forward();
        feed.ingest(&state, 3);

        state.store(CaptureState::Saving);
        feed.ingest(&state, 4);
        feed.ingest(&state, 5);

        assert_eq!(feed.drain(), vec![1, 2, 3]);
        assert_eq!(feed.take_look_forward(), vec![4, 5]);
    }

    #[test]
    fn saving_without_sink_drops_items() {
        let state = AtomicCaptureState::new(CaptureState::Saving);
        let feed = CaptureFeed::new(4);
        feed.ingest(&state, 1);

        assert_eq!(feed.len(), 0);
        assert!(feed.take_look_forward().is_empty());
    }
}
