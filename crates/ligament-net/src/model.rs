//! Stateful volume model with background analysis runs.
//!
//! [`VolumeModel`] owns the loaded [`Volume`], the [`Pipeline`] and a
//! [`SphereTable`]. [`VolumeModel::calculate`] starts one run on a worker
//! thread and returns an [`AnalysisTask`] handle. Only one run may be in
//! flight at a time; results of a successful run replace the previous ones in
//! a single swap, and failed or cancelled runs leave them untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::config::AnalysisParams;
use crate::error::{LigamentError, LigamentResult};
use crate::pipeline::{NetworkAnalysis, Pipeline};
use crate::progress::{CancellationToken, NoOpObserver, ProgressObserver};
use crate::sphere::SphereTable;
use crate::stages::PipelineStage;
use crate::volume::Volume;

/// Called once with the outcome of a run, on the worker thread.
pub type CompletionCallback =
    Box<dyn FnOnce(&LigamentResult<Arc<NetworkAnalysis>>) + Send + 'static>;

/// Observable state of an [`AnalysisTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Running the named phase.
    Running { phase: String, percent: u8 },
    /// Finished and published results.
    Completed,
    /// Stopped through its cancellation token.
    Cancelled,
    /// Aborted with an error.
    Failed { message: String },
}

impl TaskStatus {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running { .. })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle to one background analysis run.
pub struct AnalysisTask {
    handle: Option<JoinHandle<LigamentResult<Arc<NetworkAnalysis>>>>,
    status: Arc<Mutex<TaskStatus>>,
    cancel: CancellationToken,
}

impl AnalysisTask {
    /// Current status.
    pub fn status(&self) -> TaskStatus {
        lock(&self.status).clone()
    }

    /// Whether the worker has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Request cooperative cancellation; takes effect at the next stage boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the worker.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Block until the run ends and return its outcome.
    pub fn wait(mut self) -> LigamentResult<Arc<NetworkAnalysis>> {
        let Some(handle) = self.handle.take() else {
            return Err(LigamentError::cancelled("result collection"));
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(LigamentError::stage_failure(
                PipelineStage::Aggregate,
                "analysis worker panicked".into(),
            )),
        }
    }
}

impl std::fmt::Debug for AnalysisTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisTask")
            .field("status", &self.status())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Forwards progress to the caller's observer and mirrors it into the task status.
struct StatusObserver {
    status: Arc<Mutex<TaskStatus>>,
    inner: Arc<dyn ProgressObserver>,
}

impl ProgressObserver for StatusObserver {
    fn on_progress(&self, phase: &str, percent: u8) {
        *lock(&self.status) = TaskStatus::Running {
            phase: phase.to_string(),
            percent,
        };
        self.inner.on_progress(phase, percent);
    }
}

/// Clears the busy flag when dropped, including on worker panic.
struct BusyGuard(Arc<ModelInner>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

struct ModelInner {
    volume: RwLock<Option<Arc<Volume>>>,
    pipeline: RwLock<Pipeline>,
    results: RwLock<Option<Arc<NetworkAnalysis>>>,
    spheres: SphereTable,
    busy: AtomicBool,
}

/// A loaded volume, its pipeline and the results of the last successful run.
///
/// Cloning yields another handle to the same model.
#[derive(Clone)]
pub struct VolumeModel {
    inner: Arc<ModelInner>,
}

impl std::fmt::Debug for VolumeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeModel")
            .field("dims", &self.volume().map(|v| v.dims()))
            .field("busy", &self.is_busy())
            .field("has_results", &self.results().is_some())
            .finish()
    }
}

impl VolumeModel {
    /// Create a model without a volume.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                volume: RwLock::new(None),
                pipeline: RwLock::new(pipeline),
                results: RwLock::new(None),
                spheres: SphereTable::new(),
                busy: AtomicBool::new(false),
            }),
        }
    }

    /// Create a model with `volume` loaded.
    pub fn with_volume(volume: Volume, pipeline: Pipeline) -> Self {
        let model = Self::new(pipeline);
        *write(&model.inner.volume) = Some(Arc::new(volume));
        model
    }

    /// Replace the volume and discard previous results.
    ///
    /// Fails with [`LigamentError::PipelineBusy`] while a run is in flight and
    /// holds the busy flag during the swap.
    pub fn load(&self, volume: Volume) -> LigamentResult<()> {
        let _guard = self.acquire()?;
        info!(dims = ?volume.dims(), pixel_size = volume.pixel_size(), "Loaded volume");
        *write(&self.inner.volume) = Some(Arc::new(volume));
        *write(&self.inner.results) = None;
        Ok(())
    }

    /// The loaded volume.
    pub fn volume(&self) -> Option<Arc<Volume>> {
        read(&self.inner.volume).clone()
    }

    /// Results of the last successful run.
    pub fn results(&self) -> Option<Arc<NetworkAnalysis>> {
        read(&self.inner.results).clone()
    }

    /// Replace the analysis parameters used by later runs.
    pub fn set_params(&self, params: AnalysisParams) {
        let mut pipeline = write(&self.inner.pipeline);
        *pipeline = pipeline.clone().with_params(params);
    }

    /// Parameters used by the next run.
    pub fn params(&self) -> AnalysisParams {
        *read(&self.inner.pipeline).params()
    }

    /// The model's kernel cache.
    pub fn spheres(&self) -> &SphereTable {
        &self.inner.spheres
    }

    /// Whether a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Start a run without progress reporting.
    pub fn calculate(&self) -> LigamentResult<AnalysisTask> {
        self.calculate_with(Arc::new(NoOpObserver), None)
    }

    /// Start a run reporting to `observer`, calling `on_complete` when it ends.
    ///
    /// # Errors
    ///
    /// - [`LigamentError::PipelineBusy`] if a run is already in flight
    /// - [`LigamentError::NoVolumeLoaded`] if no volume is loaded
    pub fn calculate_with(
        &self,
        observer: Arc<dyn ProgressObserver>,
        on_complete: Option<CompletionCallback>,
    ) -> LigamentResult<AnalysisTask> {
        let guard = self.acquire().inspect_err(|_| {
            warn!("Analysis requested while a run is in flight");
        })?;

        let Some(volume) = self.volume() else {
            return Err(LigamentError::no_volume_loaded());
        };
        let pipeline = read(&self.inner.pipeline).clone();

        let status = Arc::new(Mutex::new(TaskStatus::Running {
            phase: String::new(),
            percent: 0,
        }));
        let cancel = CancellationToken::new();
        let worker_status = Arc::clone(&status);
        let worker_cancel = cancel.clone();

        let handle = std::thread::spawn(move || {
            let inner = Arc::clone(&guard.0);
            let observer = StatusObserver {
                status: Arc::clone(&worker_status),
                inner: observer,
            };
            let result = pipeline
                .run(&volume, &inner.spheres, &observer, &worker_cancel)
                .map(Arc::new);

            let final_status = match &result {
                Ok(analysis) => {
                    *write(&inner.results) = Some(Arc::clone(analysis));
                    TaskStatus::Completed
                }
                Err(LigamentError::Cancelled { .. }) => TaskStatus::Cancelled,
                Err(e) => {
                    warn!(error = %e, "Analysis failed; previous results kept");
                    TaskStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            *lock(&worker_status) = final_status;
            drop(guard);

            if let Some(callback) = on_complete {
                callback(&result);
            }
            result
        });

        Ok(AnalysisTask {
            handle: Some(handle),
            status,
            cancel,
        })
    }

    /// Take the busy flag; it is released when the guard drops.
    fn acquire(&self) -> LigamentResult<BusyGuard> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| LigamentError::pipeline_busy())?;
        Ok(BusyGuard(Arc::clone(&self.inner)))
    }

    /// Run to completion on the calling thread's behalf.
    pub fn run_blocking(
        &self,
        observer: Arc<dyn ProgressObserver>,
    ) -> LigamentResult<Arc<NetworkAnalysis>> {
        self.calculate_with(observer, None)?.wait()
    }
}
