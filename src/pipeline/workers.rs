//! Worker pool standing in for the GPU grid: every stage runs the same per-element function over
//! chunks of its element range on a `threadpool`, and waiting for all chunk results is the barrier
//! between stages.

use std::ops::Range;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use log::debug;
use threadpool::ThreadPool;

use crate::error::PipelineError;

/// Number of chunks queued per worker, so uneven chunks (a big triangle next to tiny ones) still
/// spread over the pool.
const CHUNKS_PER_WORKER: usize = 4;

pub struct Workers {
    pool: ThreadPool,
}

impl Workers {
    /// Pool with `threads` workers, 0 picks the available parallelism.
    pub fn new(threads: usize) -> Self {
        let threads = match threads {
            0 => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        };
        debug!("Starting {} pipeline workers", threads);
        return Self { pool: ThreadPool::with_name("raster-worker".to_string(), threads) };
    }

    pub fn thread_count(&self) -> usize {
        return self.pool.max_count();
    }

    /// Runs `job` over `[0, len)` split into chunks and returns every chunk's range and result
    /// in range order. Returns only after every chunk finished.
    pub fn map_chunks<R, F>(&self, stage: &'static str, len: usize, job: F) -> Result<Vec<(Range<usize>, R)>, PipelineError>
    where
        R: Send + 'static,
        F: Fn(Range<usize>) -> R + Send + Sync + 'static,
    {
        if len == 0 {
            return Ok(Vec::new());
        }
        let chunk_count = (self.thread_count() * CHUNKS_PER_WORKER).min(len);
        let chunk_size = (len + chunk_count - 1) / chunk_count;

        let job = Arc::new(job);
        let (sender, receiver) = mpsc::channel();
        let mut ranges = Vec::with_capacity(chunk_count);
        for start in (0..len).step_by(chunk_size) {
            let range = start..(start + chunk_size).min(len);
            let chunk_index = ranges.len();
            ranges.push(range.clone());
            let sender = sender.clone();
            let job = Arc::clone(&job);
            self.pool.execute(move || {
                let result = job(range);
                // Captured buffers have to be released before the stage is reported done, so
                // the next stage can take them back without copying.
                drop(job);
                let _ = sender.send((chunk_index, result));
            });
        }
        drop(sender);
        drop(job);

        // A panicking job drops its sender without sending, so the loop still ends.
        let mut results: Vec<Option<R>> = (0..ranges.len()).map(|_| None).collect();
        for (chunk_index, result) in receiver.iter() {
            results[chunk_index] = Some(result);
        }

        let mut chunks = Vec::with_capacity(ranges.len());
        for (range, result) in ranges.into_iter().zip(results) {
            match result {
                Some(result) => chunks.push((range, result)),
                None => return Err(PipelineError::WorkerPanicked(stage)),
            }
        }
        return Ok(chunks);
    }

    /// Per-element map of `[0, output.len())` written into `output`.
    pub fn map_into<T, F>(&self, stage: &'static str, output: &mut [T], f: F) -> Result<(), PipelineError>
    where
        T: Send + 'static,
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        let chunks = self.map_chunks(stage, output.len(), move |range| range.map(|i| f(i)).collect::<Vec<T>>())?;
        for (range, values) in chunks {
            for (slot, value) in output[range].iter_mut().zip(values) {
                *slot = value;
            }
        }
        return Ok(());
    }

    /// Waits for every queued job, used on shutdown.
    pub fn join(&self) {
        self.pool.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn chunks_cover_the_range_in_order() {
        let workers = Workers::new(3);
        let chunks = workers.map_chunks("test", 100, |range| range.len()).unwrap();
        let mut expected_start = 0;
        for (range, len) in &chunks {
            assert_eq!(range.start, expected_start);
            assert_eq!(range.len(), *len);
            expected_start = range.end;
        }
        assert_eq!(expected_start, 100);
    }

    #[test]
    fn map_into_writes_every_element() {
        let workers = Workers::new(4);
        let mut output = vec![0usize; 1000];
        workers.map_into("test", &mut output, |i| i * 2).unwrap();
        assert!(output.iter().enumerate().all(|(i, &v)| v == i * 2));
    }

    #[test]
    fn all_jobs_finish_before_returning() {
        let workers = Workers::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let job_counter = Arc::clone(&counter);
        workers
            .map_chunks("test", 64, move |range| {
                job_counter.fetch_add(range.len(), Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        // The job closure and its captures are gone once the stage returned.
        assert_eq!(Arc::strong_count(&counter), 1);
    }

    #[test]
    fn empty_range_runs_nothing() {
        let workers = Workers::new(2);
        assert!(workers.map_chunks("test", 0, |_| panic!("no chunks expected")).unwrap().is_empty());
    }

    #[test]
    fn panicking_job_is_reported() {
        let workers = Workers::new(2);
        let result = workers.map_chunks("exploding", 8, |range| {
            if range.contains(&0) {
                panic!("boom");
            }
        });
        assert!(matches!(result, Err(PipelineError::WorkerPanicked("exploding"))));
        // The pool replaces the dead worker and keeps going.
        assert_eq!(workers.map_chunks("after", 4, |range| range.len()).unwrap().len(), 4);
    }
}
