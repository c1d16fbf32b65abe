//! # Estimation worker
//!
//! Runs a [`Pipeline`] on a dedicated thread, pulling frames from a [`FrameSource`] at a fixed
//! pace and publishing every [`Estimate`] to the attached subscribers.
//!
//! Publication never blocks the worker. Each subscriber owns a bounded channel. If it is full, the
//! subscriber misses that estimate, and once its receiver is dropped it is detached.

use crate::prelude::v1::*;
use crate::timer::Ticker;
use log::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{sync_channel, Receiver, SyncSender, TrySendError},
    Arc, Mutex, MutexGuard,
};
use std::thread::{spawn, JoinHandle};
use std::time::Duration;

/// Pacing of the worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// Time between consecutive frame reads.
    pub period: Duration,
    /// Stop on its own after this many ticks.
    pub max_ticks: Option<u64>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            max_ticks: None,
        }
    }
}

/// Counters of a finished worker run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Loop iterations.
    pub ticks: u64,
    /// Frames processed and published.
    pub frames: u64,
    /// Ticks where no frame could be read.
    pub skipped: u64,
}

type Subscribers = Arc<Mutex<Vec<SyncSender<Estimate>>>>;

fn lock(subscribers: &Subscribers) -> MutexGuard<Vec<SyncSender<Estimate>>> {
    // Senders stay usable even if a holder of the lock panicked.
    subscribers.lock().unwrap_or_else(|e| e.into_inner())
}

fn publish(subscribers: &Subscribers, estimate: &Estimate) {
    lock(subscribers).retain(|tx| match tx.try_send(estimate.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            trace!("Subscriber full, dropping estimate {}", estimate.frame);
            true
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("Subscriber disconnected");
            false
        }
    });
}

/// Owns one estimation pipeline and the thread running it.
pub struct EstimationWorker {
    pending: Option<(Pipeline, Box<dyn FrameSource + Send>)>,
    schedule: Schedule,
    subscribers: Subscribers,
    signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<WorkerReport>>,
    report: Option<WorkerReport>,
}

impl EstimationWorker {
    /// Create a worker, without starting it.
    ///
    /// Fails if the configuration is invalid.
    ///
    /// # Arguments
    ///
    /// * `config` - pipeline configuration.
    /// * `source` - frame source to read from. It is released when the worker thread exits.
    /// * `schedule` - pacing of the worker loop.
    pub fn new(
        config: PipelineConfig,
        source: impl FrameSource + Send + 'static,
        schedule: Schedule,
    ) -> Result<Self> {
        let pipeline = Pipeline::new(config)?;
        Ok(Self::with_pipeline(pipeline, source, schedule))
    }

    /// Create a worker around an already built pipeline.
    pub fn with_pipeline(
        pipeline: Pipeline,
        source: impl FrameSource + Send + 'static,
        schedule: Schedule,
    ) -> Self {
        let source: Box<dyn FrameSource + Send> = Box::new(source);

        Self {
            pending: Some((pipeline, source)),
            schedule,
            subscribers: Default::default(),
            signal: Arc::new(AtomicBool::new(true)),
            handle: None,
            report: None,
        }
    }

    /// Attach a new subscriber receiving up to `capacity` unread estimates.
    pub fn subscribe(&self, capacity: usize) -> Receiver<Estimate> {
        let (tx, rx) = sync_channel(capacity);
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Spawn the worker thread.
    ///
    /// A worker can only be started once.
    pub fn start(&mut self) -> Result<()> {
        let (mut pipeline, mut source) = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("estimation worker was already started"))?;

        let schedule = self.schedule;
        let subscribers = self.subscribers.clone();
        let signal = self.signal.clone();

        self.handle = Some(spawn(move || {
            let mut report = WorkerReport::default();
            let mut ticker = Ticker::new(schedule.period);

            info!(
                "Estimation worker started, {} ms period",
                schedule.period.as_millis()
            );

            loop {
                if !signal.load(Ordering::Relaxed) {
                    break;
                }

                if matches!(schedule.max_ticks, Some(max) if report.ticks >= max) {
                    break;
                }

                ticker.wait();
                report.ticks += 1;

                match source.next_frame() {
                    Ok(Some(frame)) => {
                        let estimate = pipeline.process(&frame);
                        report.frames += 1;
                        publish(&subscribers, &estimate);
                    }
                    Ok(None) => {
                        report.skipped += 1;
                        debug!("No frame available on tick {}", report.ticks);
                    }
                    Err(e) => {
                        report.skipped += 1;
                        warn!("Frame acquisition failed: {}", e);
                    }
                }
            }

            std::mem::drop(source);

            info!(
                "Estimation worker stopped after {} ticks ({} frames, {} skipped), source released",
                report.ticks, report.frames, report.skipped
            );

            report
        }));

        Ok(())
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the worker to exit on its own, then return its report.
    ///
    /// Only returns for schedules with a tick limit, unless [`EstimationWorker::stop`] is called
    /// from elsewhere.
    pub fn join(&mut self) -> WorkerReport {
        if let Some(handle) = self.handle.take() {
            let report = handle.join().unwrap_or_else(|_| {
                warn!("Estimation worker panicked");
                Default::default()
            });
            self.report = Some(report);
        }

        self.report.unwrap_or_default()
    }

    /// Signal the worker to stop and wait for it to exit.
    ///
    /// The worker finishes its current frame and releases the frame source before this returns.
    /// Stopping is idempotent, and a worker that was never started reports zero ticks.
    pub fn stop(&mut self) -> WorkerReport {
        self.signal.store(false, Ordering::Relaxed);
        // A never started worker can not be started anymore.
        self.pending = None;
        self.join()
    }
}

impl Drop for EstimationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Produces gray frames, failing on every `fail_every`-th read and flagging its release.
    struct TestSource {
        reads: usize,
        fail_every: Option<usize>,
        released: Arc<AtomicBool>,
        dropped_reads: Arc<AtomicUsize>,
    }

    impl TestSource {
        fn new(fail_every: Option<usize>) -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
            let released = Arc::new(AtomicBool::new(false));
            let reads = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    reads: 0,
                    fail_every,
                    released: released.clone(),
                    dropped_reads: reads.clone(),
                },
                released,
                reads,
            )
        }
    }

    impl FrameSource for TestSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            self.reads += 1;
            match self.fail_every {
                Some(n) if self.reads % n == 0 && self.reads % (2 * n) == 0 => {
                    Err(anyhow!("camera hiccup"))
                }
                Some(n) if self.reads % n == 0 => Ok(None),
                _ => Ok(Some(Frame::from_fn(16, 16, |x, _| RGBA::gray(x as u8 * 10)))),
            }
        }
    }

    impl Drop for TestSource {
        fn drop(&mut self) {
            self.dropped_reads.store(self.reads, Ordering::SeqCst);
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn fast(ticks: u64) -> Schedule {
        Schedule {
            period: Duration::from_millis(1),
            max_ticks: Some(ticks),
        }
    }

    #[test]
    fn runs_exact_tick_count() {
        let (source, released, reads) = TestSource::new(None);
        let mut worker = EstimationWorker::new(Default::default(), source, fast(5)).unwrap();
        let rx = worker.subscribe(16);

        worker.start().unwrap();
        let report = worker.join();

        assert_eq!(
            report,
            WorkerReport {
                ticks: 5,
                frames: 5,
                skipped: 0
            }
        );
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(reads.load(Ordering::SeqCst), 5);

        let frames = rx.try_iter().map(|e| e.frame).collect::<Vec<_>>();
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn missing_frames_are_skipped() {
        let (source, _, _) = TestSource::new(Some(2));
        let mut worker = EstimationWorker::new(Default::default(), source, fast(8)).unwrap();

        worker.start().unwrap();
        let report = worker.join();

        // Reads 2 and 6 return nothing, 4 and 8 fail.
        assert_eq!(
            report,
            WorkerReport {
                ticks: 8,
                frames: 4,
                skipped: 4
            }
        );
    }

    #[test]
    fn stop_releases_source_and_is_idempotent() {
        let (source, released, _) = TestSource::new(None);
        let schedule = Schedule {
            period: Duration::from_millis(1),
            max_ticks: None,
        };
        let mut worker = EstimationWorker::new(Default::default(), source, schedule).unwrap();

        worker.start().unwrap();
        assert!(worker.start().is_err());

        std::thread::sleep(Duration::from_millis(20));

        let report = worker.stop();
        assert!(released.load(Ordering::SeqCst));
        assert!(!worker.is_running());
        assert!(report.ticks > 0);
        assert_eq!(worker.stop(), report);
    }

    #[test]
    fn zero_subscribers_and_full_channels() {
        let (source, _, _) = TestSource::new(None);
        let mut worker = EstimationWorker::new(Default::default(), source, fast(6)).unwrap();

        worker.start().unwrap();
        assert_eq!(worker.join().frames, 6);

        let (source, _, _) = TestSource::new(None);
        let mut worker = EstimationWorker::new(Default::default(), source, fast(6)).unwrap();
        let small = worker.subscribe(2);
        let gone = worker.subscribe(2);
        std::mem::drop(gone);

        worker.start().unwrap();
        worker.join();

        // Only the first two estimates fit, the rest were dropped without blocking.
        assert_eq!(small.try_iter().map(|e| e.frame).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(lock(&worker.subscribers).len(), 1);
    }

    #[test]
    fn invalid_config_fails_before_start() {
        let (source, released, _) = TestSource::new(None);
        let mut config = PipelineConfig::default();
        config.smoothing.alpha = 2.0;

        assert!(EstimationWorker::new(config, source, Default::default()).is_err());
        // The source was never handed to a thread, it is dropped right away.
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn never_started_worker_stops_cleanly() {
        let (source, released, _) = TestSource::new(None);
        let mut worker = EstimationWorker::new(Default::default(), source, fast(1)).unwrap();

        assert_eq!(worker.stop(), WorkerReport::default());
        assert!(released.load(Ordering::SeqCst));
        assert!(worker.start().is_err());
    }
}
