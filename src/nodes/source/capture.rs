//! Bounded hand-off between a capture thread and the tick thread

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::config::CaptureConfig;

struct QueueState {
    blocks: VecDeque<Vec<f32>>,
    stopped: bool,
    overflowed: usize,
}

/// Blocks captured but not yet played.
///
/// The consumer waits (without polling) until `buffer_len` blocks are queued,
/// and skips ahead to the newest `2 * buffer_len` when it has fallen behind.
/// The producer never blocks; at `4 * buffer_len` it discards the oldest block.
pub struct CaptureQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    config: CaptureConfig,
}

impl CaptureQueue {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            state: Mutex::new(QueueState {
                blocks: VecDeque::with_capacity(config.capacity()),
                stopped: false,
                overflowed: 0,
            }),
            ready: Condvar::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn push(&self, block: Vec<f32>) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        while state.blocks.len() >= self.config.capacity() {
            state.blocks.pop_front();
            state.overflowed += 1;
        }
        state.blocks.push_back(block);
        drop(state);
        self.ready.notify_one();
    }

    /// Wait for the next block, or `None` once stopped.
    pub fn pop(&self) -> Option<Vec<f32>> {
        let mut state = self.state.lock();
        while state.blocks.len() < self.config.buffer_len && !state.stopped {
            self.ready.wait(&mut state);
        }
        if state.stopped {
            return None;
        }
        let high = self.config.high_watermark();
        while state.blocks.len() > high {
            state.blocks.pop_front();
        }
        state.blocks.pop_front()
    }

    /// End capture and wake any waiting consumer.
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.ready.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks the producer had to discard because the queue was full.
    pub fn overflowed(&self) -> usize {
        self.state.lock().overflowed
    }
}

/// Consuming end of a [`CaptureQueue`]. Ends for good once the queue stops.
pub struct CaptureStream {
    queue: Arc<CaptureQueue>,
    finished: bool,
}

impl CaptureStream {
    pub fn new(queue: Arc<CaptureQueue>) -> Self {
        Self {
            queue,
            finished: false,
        }
    }
}

impl Iterator for CaptureStream {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Vec<f32>> {
        if self.finished {
            return None;
        }
        let block = self.queue.pop();
        self.finished = block.is_none();
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue(buffer_len: usize) -> Arc<CaptureQueue> {
        Arc::new(CaptureQueue::new(CaptureConfig::new(2).with_buffer_len(buffer_len)))
    }

    #[test]
    fn skips_ahead_when_behind() {
        let q = queue(2);
        for i in 0..7 {
            q.push(vec![i as f32; 2]);
        }
        // 7 queued, high watermark 4: blocks 0-2 go, 3 is yielded
        assert_eq!(q.pop(), Some(vec![3.0; 2]));
        assert_eq!(q.len(), 3);
        assert!(q.len() <= q.config().high_watermark());
    }

    #[test]
    fn producer_bounds_the_queue() {
        let q = queue(1);
        for i in 0..10 {
            q.push(vec![i as f32]);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.overflowed(), 6);
    }

    #[test]
    fn waits_for_low_watermark() {
        let q = queue(3);
        let consumer = {
            let q = q.clone();
            std::thread::spawn(move || q.pop())
        };
        q.push(vec![1.0]);
        q.push(vec![2.0]);
        std::thread::sleep(Duration::from_millis(20));
        assert!(!consumer.is_finished());
        q.push(vec![3.0]);
        assert_eq!(consumer.join().unwrap(), Some(vec![1.0]));
    }

    #[test]
    fn stop_wakes_and_ends_stream() {
        let q = queue(2);
        let mut stream = CaptureStream::new(q.clone());
        let waiter = std::thread::spawn(move || {
            let first = stream.next();
            (first, stream.next())
        });
        std::thread::sleep(Duration::from_millis(10));
        q.stop();
        assert_eq!(waiter.join().unwrap(), (None, None));
        q.push(vec![1.0]);
        assert!(q.is_empty());
    }
}
