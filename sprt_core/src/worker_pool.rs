use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::oracle::{MeasureError, Oracle};
use crate::outcome::Variant;
use crate::scheduler::SchedulerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub variant: Variant,
    pub index: u64,
    /// Position of the job inside its batch
    slot: usize,
}

pub enum WorkerMessage {
    Measurement {
        job: Job,
        result: Result<f64, MeasureError>,
    },
}

/// Fixed set of threads that run oracle calls.
pub struct WorkerPool {
    job_tx: Option<mpsc::Sender<Job>>,
    result_rx: mpsc::Receiver<WorkerMessage>,
    workers: Vec<JoinHandle<()>>,
}

fn worker_thread<O: Oracle>(
    worker_idx: usize,
    oracle: Arc<O>,
    job_queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    result_channel: mpsc::Sender<WorkerMessage>,
) {
    loop {
        let job = {
            let Ok(queue) = job_queue.lock() else {
                break;
            };
            queue.recv()
        };
        // Sender dropped: the pool is shutting down
        let Ok(job) = job else {
            break;
        };

        trace!(worker_idx, variant = %job.variant, index = job.index, "measuring");
        let result = catch_unwind(AssertUnwindSafe(|| oracle.measure(job.variant, job.index)))
            .unwrap_or_else(|_| Err(MeasureError::new("oracle panicked")));
        debug!(worker_idx, variant = %job.variant, index = job.index, ?result, "measured");

        if result_channel
            .send(WorkerMessage::Measurement { job, result })
            .is_err()
        {
            break;
        }
    }
}

impl WorkerPool {
    pub fn new<O: Oracle + 'static>(oracle: Arc<O>, num_workers: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel::<WorkerMessage>();
        let job_queue = Arc::new(Mutex::new(job_rx));

        let workers = (0..num_workers)
            .map(|worker_idx| {
                let oracle = Arc::clone(&oracle);
                let job_queue = Arc::clone(&job_queue);
                let result_tx = result_tx.clone();
                thread::spawn(move || worker_thread(worker_idx, oracle, job_queue, result_tx))
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Measures `variant` at every index in `indices` and blocks until all of them are done.
    /// Results come back in the same order as `indices`.
    pub fn run_batch(
        &self,
        variant: Variant,
        indices: &[u64],
    ) -> Result<Vec<Result<f64, MeasureError>>, SchedulerError> {
        let job_tx = self.job_tx.as_ref().ok_or(SchedulerError::WorkerPoolClosed)?;

        for (slot, &index) in indices.iter().enumerate() {
            job_tx
                .send(Job {
                    variant,
                    index,
                    slot,
                })
                .map_err(|_| SchedulerError::WorkerPoolClosed)?;
        }

        let mut results: Vec<Option<Result<f64, MeasureError>>> = vec![None; indices.len()];
        for _ in 0..indices.len() {
            let WorkerMessage::Measurement { job, result } = self
                .result_rx
                .recv()
                .map_err(|_| SchedulerError::WorkerPoolClosed)?;
            results[job.slot] = Some(result);
        }

        results
            .into_iter()
            .map(|r| r.ok_or(SchedulerError::WorkerPoolClosed))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
