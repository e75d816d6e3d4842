//! Task-farm port - the execution backend for embarrassingly parallel work.
//!
//! The grid optimizer submits one self-contained unit per
//! (grid point, trace), then blocks until every unit has finished. Any
//! backend that can run boxed closures and hand back their results in
//! submission order can stand in here: a plain loop, a thread pool, or a
//! distributed scheduler.

use crate::Result;

/// One unit of work. Owns everything it reads.
pub type Task<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Receipt for a submitted task: its position in the output of
/// [`TaskFarm::await_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(usize);

impl TaskHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

pub trait TaskFarm<T: Send + 'static> {
    /// Queue a task. Tasks may start before [`TaskFarm::await_all`] is called.
    fn submit(&mut self, task: Task<T>) -> TaskHandle;

    /// Run every queued task and return the results in submission order.
    ///
    /// # Errors
    ///
    /// The first failing task fails the whole batch; no partial results are
    /// returned and the farm is left empty.
    fn await_all(&mut self) -> Result<Vec<T>>;

    /// Discard all queued work and any results not yet collected.
    fn abort(&mut self);

    /// Number of tasks submitted since the last `await_all` or `abort`.
    fn pending(&self) -> usize;
}
