//! Task-farm backends: a plain loop and a rayon thread pool.

use rayon::{ThreadPoolBuilder, prelude::*};

use crate::{
    Result,
    error::Error,
    ports::{Task, TaskFarm, TaskHandle},
};

/// Runs tasks one after another on the calling thread.
pub struct SequentialFarm<T> {
    queue: Vec<Task<T>>,
}

impl<T> SequentialFarm<T> {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }
}

impl<T> Default for SequentialFarm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskFarm<T> for SequentialFarm<T> {
    fn submit(&mut self, task: Task<T>) -> TaskHandle {
        self.queue.push(task);
        TaskHandle::new(self.queue.len() - 1)
    }

    fn await_all(&mut self) -> Result<Vec<T>> {
        std::mem::take(&mut self.queue)
            .into_iter()
            .map(|task| task())
            .collect()
    }

    fn abort(&mut self) {
        self.queue.clear();
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Runs tasks on a rayon pool.
///
/// Without a thread count the global pool is used; with one, a dedicated pool
/// of that size is built for each batch.
pub struct RayonFarm<T> {
    queue: Vec<Task<T>>,
    threads: Option<usize>,
}

impl<T> RayonFarm<T> {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            threads: None,
        }
    }

    pub fn with_threads(threads: usize) -> Self {
        Self {
            queue: Vec::new(),
            threads: Some(threads),
        }
    }
}

impl<T> Default for RayonFarm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskFarm<T> for RayonFarm<T> {
    fn submit(&mut self, task: Task<T>) -> TaskHandle {
        self.queue.push(task);
        TaskHandle::new(self.queue.len() - 1)
    }

    fn await_all(&mut self) -> Result<Vec<T>> {
        let tasks = std::mem::take(&mut self.queue);
        let run = move || -> Result<Vec<T>> { tasks.into_par_iter().map(|task| task()).collect() };

        match self.threads {
            None => run(),
            Some(threads) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::TaskFarm {
                        message: format!("failed to build a pool of {threads} threads: {e}"),
                    })?;
                pool.install(run)
            }
        }
    }

    fn abort(&mut self) {
        self.queue.clear();
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(i: usize) -> Task<usize> {
        Box::new(move || Ok(i * i))
    }

    fn submit_all<F: TaskFarm<usize>>(farm: &mut F) -> Vec<TaskHandle> {
        (0..50).map(|i| farm.submit(square(i))).collect()
    }

    #[test]
    fn results_come_back_in_submission_order() {
        let mut sequential = SequentialFarm::new();
        let mut parallel = RayonFarm::with_threads(4);
        let handles = submit_all(&mut sequential);
        submit_all(&mut parallel);

        let expected: Vec<usize> = (0..50).map(|i| i * i).collect();
        let sequential = sequential.await_all().unwrap();
        assert_eq!(sequential, expected);
        assert_eq!(parallel.await_all().unwrap(), expected);
        assert_eq!(sequential[handles[7].index()], 49);
    }

    #[test]
    fn one_failure_fails_the_batch() {
        let mut farm = RayonFarm::new();
        farm.submit(square(2));
        farm.submit(Box::new(|| Err(Error::NotRun)));
        assert!(farm.await_all().is_err());
        assert_eq!(farm.pending(), 0);
    }

    #[test]
    fn abort_discards_queued_work() {
        let mut farm = SequentialFarm::new();
        submit_all(&mut farm);
        farm.abort();
        assert_eq!(farm.pending(), 0);
        assert!(farm.await_all().unwrap().is_empty());
    }
}
