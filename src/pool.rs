use crate::error::Error;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    stopping: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-size set of worker threads draining one FIFO task queue.
///
/// Stopping is graceful: workers keep taking tasks until the queue is empty
/// and only then exit.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let mut pool = Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    stopping: false,
                }),
                available: Condvar::new(),
            }),
            workers: Vec::with_capacity(size),
        };

        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("harvest-worker-{}", id))
                .spawn(move || worker_loop(shared))?;
            pool.workers.push(handle);
        }

        debug!("Worker pool started with {} threads", size);
        Ok(pool)
    }

    /// One worker per available hardware thread.
    pub fn with_available_parallelism() -> io::Result<Self> {
        let size = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(size)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `task` for execution. Fails once a stop has been requested.
    pub fn submit<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.lock();
        if queue.stopping {
            return Err(Error::PoolStopped);
        }
        queue.tasks.push_back(Box::new(task));
        drop(queue);

        self.shared.available.notify_one();
        Ok(())
    }

    /// Request a stop without waiting. Queued tasks still run.
    pub fn stop(&self) {
        self.shared.lock().stopping = true;
        self.shared.available.notify_all();
    }

    /// Stop and wait for every queued task to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.stopping {
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("Worker task panicked");
        }
    }
}
