//! Binary min-heap of tasks ordered by fire time.
//!
//! Besides the dense heap array the queue keeps a `TaskId → index` side map,
//! updated on every swap, so a pending task can be removed by id after any
//! amount of heap churn.

use std::collections::HashMap;

use scenehub_domain::id::TaskId;

use crate::task::Task;

struct Entry {
    /// Insertion sequence, breaks ties between equal fire times.
    seq: u64,
    task: Task,
}

/// Min-heap of [`Task`]s keyed by `fire_at`.
#[derive(Default)]
pub struct PriorityQueue {
    heap: Vec<Entry>,
    index: HashMap<TaskId, usize>,
    next_seq: u64,
}

impl PriorityQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert a task. O(log n).
    pub fn push(&mut self, task: Task) {
        let at = self.heap.len();
        self.index.insert(task.id, at);
        self.heap.push(Entry {
            seq: self.next_seq,
            task,
        });
        self.next_seq += 1;
        self.sift_up(at);
    }

    /// The task with the earliest fire time.
    #[must_use]
    pub fn peek(&self) -> Option<&Task> {
        self.heap.first().map(|entry| &entry.task)
    }

    /// Remove and return the task with the earliest fire time. O(log n).
    pub fn pop(&mut self) -> Option<Task> {
        self.remove_at(0)
    }

    /// Current heap position of a pending task.
    #[must_use]
    pub fn index_of(&self, id: TaskId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Remove the task at heap position `at`. O(log n).
    pub fn remove_at(&mut self, at: usize) -> Option<Task> {
        let last = self.heap.len().checked_sub(1)?;
        if at > last {
            return None;
        }
        if at != last {
            self.swap(at, last);
        }
        let entry = self.heap.pop()?;
        self.index.remove(&entry.task.id);
        if at < self.heap.len() && !self.sift_up(at) {
            self.sift_down(at);
        }
        Some(entry.task)
    }

    /// Remove a pending task by id.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let at = self.index_of(id)?;
        self.remove_at(at)
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.heap[a], &self.heap[b]);
        (a.task.fire_at, a.seq) < (b.task.fire_at, b.seq)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].task.id, a);
        self.index.insert(self.heap[b].task.id, b);
    }

    /// Returns whether the element moved.
    fn sift_up(&mut self, mut at: usize) -> bool {
        let start = at;
        while at > 0 {
            let parent = (at - 1) / 2;
            if !self.less(at, parent) {
                break;
            }
            self.swap(at, parent);
            at = parent;
        }
        at != start
    }

    fn sift_down(&mut self, mut at: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * at + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, at) {
                break;
            }
            self.swap(at, child);
            at = child;
        }
    }
}

impl std::fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.heap.len())
            .finish_non_exhaustive()
    }
}
