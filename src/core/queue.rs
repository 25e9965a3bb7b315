//! FIFO holding area for tasks awaiting an execution unit.

use std::collections::VecDeque;

/// Unbounded first-in, first-out task queue.
///
/// Appending never fails; backpressure is left to callers. Only the pool
/// coordinator touches the queue, always under its state lock.
#[derive(Debug)]
pub struct TaskQueue<T> {
    tasks: VecDeque<T>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append a task at the tail.
    pub fn enqueue(&mut self, task: T) {
        self.tasks.push_back(task);
    }

    /// Remove and return the head task.
    pub fn dequeue_next(&mut self) -> Option<T> {
        self.tasks.pop_front()
    }

    /// Put a task back at the head, ahead of everything submitted after it.
    pub fn requeue_front(&mut self, task: T) {
        self.tasks.push_front(task);
    }

    /// Remove every queued task in submission order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.tasks.drain(..)
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
