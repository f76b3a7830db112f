use std::any::Any;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use log::debug;
use log::error;
use log::info;
use log::warn;
use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::dispatch::catalog::CatalogReport;
use crate::dispatch::catalog::Sample;
use crate::dispatch::catalog::SampleDescriptor;
use crate::dispatch::catalog::WorkCatalog;
use crate::dispatch::sink::Finalizer;
use crate::dispatch::sink::OutputSink;
use crate::dispatch::status::SegmentStatus;
use crate::runtime::Result;

/// Runs the external program for one segment of one sample. Err means the
/// segment ends up as Error; it never stops the worker
pub trait SegmentRunner: Send + Sync {
    fn run(&self, sample: &SampleDescriptor, segment: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WorkerReport {
    pub worker: usize,
    pub segments_done: usize,
    pub segments_failed: usize,
    pub samples_finalized: usize,
    pub finalize_failures: usize,
}

#[derive(Clone, Debug)]
pub enum WorkerOutcome {
    Finished(WorkerReport),
    /// The worker died outside the modelled error path. Its slot is gone for the
    /// rest of the run, and any segment it had claimed stays Busy
    Fault { worker: usize, msg: String },
}

impl WorkerOutcome {
    pub fn worker(&self) -> usize {
        match self {
            WorkerOutcome::Finished(report) => report.worker,
            WorkerOutcome::Fault { worker, .. } => *worker,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, WorkerOutcome::Fault { .. })
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkerOutcome::Finished(r) => write!(
                f,
                "Thread {} finished: {} segments done, {} failed, {} samples finalized, {} finalization failures",
                r.worker, r.segments_done, r.segments_failed, r.samples_finalized, r.finalize_failures
            ),
            WorkerOutcome::Fault { worker, msg } => write!(f, "Thread {} terminated abnormally: {}", worker, msg),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SampleSummary {
    pub name: String,
    /// The finalization record was written
    pub finalized: bool,
    /// Every segment resolved but writing the record failed
    pub finalize_failed: bool,
    pub segments: Vec<String>,
    pub statuses: Vec<SegmentStatus>,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub workers: Vec<WorkerOutcome>,
    pub samples: Vec<SampleSummary>,
    pub catalog: CatalogReport,
}

impl RunSummary {
    pub fn num_finalized(&self) -> usize {
        self.samples.iter().filter(|s| s.finalized).count()
    }

    pub fn faulted_workers(&self) -> Vec<usize> {
        self.workers.iter().filter(|w| w.is_fault()).map(|w| w.worker()).collect()
    }

    /// Samples whose finalization record could not be written
    pub fn finalize_failures(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter(|s| s.finalize_failed)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.workers.iter().all(|w| !w.is_fault()) && self.samples.iter().all(|s| !s.finalize_failed)
    }
}

///////////////////////////////
/// Shared context of one run: the sample arena, the catalog behind its
/// creation lock, and the collaborators every worker calls.
/// Samples stay in the arena after finalization so that run() can build the RunSummary
pub struct Dispatcher {
    num_workers: usize,
    samples: RwLock<Vec<Arc<Sample>>>,
    catalog: Mutex<WorkCatalog>,
    runner: Arc<dyn SegmentRunner>,
    finalizer: Finalizer,
}

impl Dispatcher {
    pub fn new(
        num_workers: usize,
        catalog: WorkCatalog,
        runner: Arc<dyn SegmentRunner>,
        sink: Arc<dyn OutputSink>,
    ) -> Dispatcher {
        Dispatcher {
            num_workers: num_workers.max(1),
            samples: RwLock::new(Vec::new()),
            catalog: Mutex::new(catalog),
            runner,
            finalizer: Finalizer::new(sink),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Sample number `index`, materializing it from the catalog if no worker has yet.
    /// None once the catalog has nothing more to give
    pub fn sample(&self, index: usize) -> Option<Arc<Sample>> {
        if let Some(sample) = self.samples.read().get(index) {
            return Some(Arc::clone(sample));
        }

        let mut catalog = self.catalog.lock();
        loop {
            // Someone may have created it while we waited for the creation lock
            if let Some(sample) = self.samples.read().get(index) {
                return Some(Arc::clone(sample));
            }
            let sample = Arc::new(catalog.next_sample()?);
            info!(
                "Created status array no. {} for '{}' ({} segments)",
                sample.descriptor.index,
                sample.descriptor.name,
                sample.len()
            );
            self.samples.write().push(sample);
        }
    }

    /// Samples materialized so far, in catalog order
    pub fn samples(&self) -> Vec<Arc<Sample>> {
        self.samples.read().clone()
    }

    /// Runs all workers to completion and collects their outcomes
    pub fn run(self) -> RunSummary {
        let num_workers = self.num_workers();
        let ctx = Arc::new(self);

        let thread_pool = threadpool::Builder::new()
            .num_threads(num_workers)
            .thread_name("dispatch-worker".to_string())
            .build();
        let (tx_outcome, rx_outcome) = crossbeam::channel::unbounded::<WorkerOutcome>();

        for worker_id in 0..num_workers {
            let ctx = Arc::clone(&ctx);
            let tx_outcome = tx_outcome.clone();
            thread_pool.execute(move || {
                debug!("Worker {} started", worker_id);
                let result = panic::catch_unwind(AssertUnwindSafe(|| Worker::new(worker_id, &ctx).run()));
                let outcome = match result {
                    Ok(Ok(report)) => WorkerOutcome::Finished(report),
                    Ok(Err(e)) => WorkerOutcome::Fault {
                        worker: worker_id,
                        msg: e.to_string(),
                    },
                    Err(payload) => WorkerOutcome::Fault {
                        worker: worker_id,
                        msg: panic_message(&*payload),
                    },
                };
                debug!("Worker {} exiting", worker_id);
                _ = tx_outcome.send(outcome);
            });
        }
        drop(tx_outcome);
        thread_pool.join();

        let mut workers: Vec<WorkerOutcome> = rx_outcome.iter().collect();
        workers.sort_by_key(|w| w.worker());
        for outcome in &workers {
            if outcome.is_fault() {
                error!("{}", outcome);
            } else {
                info!("{}", outcome);
            }
        }

        let samples: Vec<SampleSummary> = ctx
            .samples()
            .iter()
            .map(|sample| SampleSummary {
                name: sample.descriptor.name.clone(),
                finalized: sample.is_record_written(),
                finalize_failed: sample.table.is_finalized() && !sample.is_record_written(),
                segments: sample.descriptor.segments.clone(),
                statuses: sample.table.snapshot(),
            })
            .collect();
        for sample in samples.iter().filter(|s| s.finalize_failed) {
            error!("No finalization record was written for sample '{}'", sample.name);
        }
        for sample in samples.iter().filter(|s| !s.finalized && !s.finalize_failed) {
            let stuck: Vec<&str> = sample
                .segments
                .iter()
                .zip(&sample.statuses)
                .filter(|(_, status)| !status.is_terminal())
                .map(|(segment, _)| segment.as_str())
                .collect();
            warn!("Sample '{}' was never finalized; unresolved segments {:?}", sample.name, stuck);
        }

        let catalog = ctx.catalog.lock().report().clone();
        RunSummary {
            workers,
            samples,
            catalog,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

enum State {
    ClaimSample,
    ClaimSegment(Arc<Sample>),
    RunExternal(Arc<Sample>, usize),
    RecordOutcome(Arc<Sample>, usize, SegmentStatus),
    AdvanceSample,
    Terminated,
}

///////////////////////////////
/// One worker's walk over the samples. Worker t first takes its stripe
/// t, t+W, t+2W, ... of each sample, then scans ahead of the last index it
/// touched for anything still Untouched, then moves to the next sample
struct Worker<'a> {
    id: usize,
    ctx: &'a Dispatcher,
    sample_index: usize,
    stripe_next: usize,
    last_visited: Option<usize>,
    report: WorkerReport,
}

impl<'a> Worker<'a> {
    fn new(id: usize, ctx: &'a Dispatcher) -> Worker<'a> {
        Worker {
            id,
            ctx,
            sample_index: 0,
            stripe_next: id,
            last_visited: None,
            report: WorkerReport {
                worker: id,
                ..Default::default()
            },
        }
    }

    fn run(mut self) -> Result<WorkerReport> {
        let mut state = State::ClaimSample;
        loop {
            state = match state {
                State::Terminated => break,
                state => self.step(state)?,
            };
        }
        Ok(self.report)
    }

    fn step(&mut self, state: State) -> Result<State> {
        let next = match state {
            State::ClaimSample => match self.ctx.sample(self.sample_index) {
                Some(sample) => {
                    self.stripe_next = self.id;
                    self.last_visited = None;
                    State::ClaimSegment(sample)
                }
                None => {
                    debug!("Worker {} sees no more samples", self.id);
                    State::Terminated
                }
            },

            State::ClaimSegment(sample) => match self.claim_segment(&sample)? {
                Some(index) => State::RunExternal(sample, index),
                None => State::AdvanceSample,
            },

            State::RunExternal(sample, index) => {
                let descriptor = &sample.descriptor;
                let segment = &descriptor.segments[index];
                debug!("Worker {} running '{}' segment {}", self.id, descriptor.name, segment);
                let status = match self.ctx.runner.run(descriptor, segment) {
                    Ok(()) => SegmentStatus::Done,
                    Err(e) => {
                        warn!("Segment {} of sample '{}' failed: {:#}", segment, descriptor.name, e);
                        SegmentStatus::Error
                    }
                };
                State::RecordOutcome(sample, index, status)
            }

            State::RecordOutcome(sample, index, status) => {
                let won_finalize = {
                    let mut guard = sample.table.lock();
                    guard.set(index, status)?;
                    guard.try_mark_finalized()
                };
                match status {
                    SegmentStatus::Error => self.report.segments_failed += 1,
                    _ => self.report.segments_done += 1,
                }
                if won_finalize {
                    match self.ctx.finalizer.finalize(&sample) {
                        Ok(()) => self.report.samples_finalized += 1,
                        Err(e) => {
                            error!("{}", e);
                            self.report.finalize_failures += 1;
                        }
                    }
                }
                State::ClaimSegment(sample)
            }

            State::AdvanceSample => {
                self.sample_index += 1;
                State::ClaimSample
            }

            State::Terminated => State::Terminated,
        };
        Ok(next)
    }

    /// Claims the next segment of this worker's stripe, or failing that the first
    /// Untouched segment ahead of the last one it visited
    fn claim_segment(&mut self, sample: &Sample) -> Result<Option<usize>> {
        let num_segments = sample.len();
        let mut guard = sample.table.lock();

        while self.stripe_next < num_segments {
            let index = self.stripe_next;
            self.stripe_next += self.ctx.num_workers;
            self.last_visited = Some(index);
            if guard.try_claim(index)? {
                return Ok(Some(index));
            }
        }

        // An empty stripe has nothing to scan ahead of
        let Some(from) = self.last_visited else {
            return Ok(None);
        };
        match guard.next_untouched_from(from) {
            Some(index) => {
                guard.set(index, SegmentStatus::Busy)?;
                self.last_visited = Some(index);
                debug!("Worker {} picked up leftover segment {} of sample {}", self.id, index, sample.descriptor.index);
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }
}
