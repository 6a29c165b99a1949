use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::container::domain::container_reader::ContainerReader;
use crate::container::domain::container_writer::ContainerWriter;
use crate::container::infrastructure::ffmpeg_container_reader::FfmpegContainerReader;
use crate::container::infrastructure::ffmpeg_container_writer::FfmpegContainerWriter;
use crate::pipeline::export_job::ExportJob;
use crate::pipeline::export_logger::{ExportLogger, LogExportLogger};
use crate::pipeline::export_video_use_case::{ExportOutcome, ExportVideoUseCase, ProgressFn};
use crate::publishing::domain::publish_sink::PublishSink;
use crate::publishing::domain::storage_access::StorageAccess;
use crate::shared::constants::EXPORT_PROGRESS_SHARE;
use crate::shared::error::ExportError;

/// Messages sent from the worker thread to the caller.
#[derive(Debug)]
pub enum ExportEvent {
    Progress(f64),
    Completed(ExportOutcome),
    Failed(ExportError),
}

/// Caller's side of a running export.
pub struct ExportHandle {
    events: Receiver<ExportEvent>,
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ExportHandle {
    /// Requests cooperative cancellation. The export stops before its next
    /// sample and reports `Failed(Cancelled)`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> &Receiver<ExportEvent> {
        &self.events
    }

    /// Blocks until the export ends, forwarding progress to `on_progress`.
    pub fn wait_with_progress(
        mut self,
        mut on_progress: impl FnMut(f64),
    ) -> Result<ExportOutcome, ExportError> {
        let result = loop {
            match self.events.recv() {
                Ok(ExportEvent::Progress(value)) => on_progress(value),
                Ok(ExportEvent::Completed(outcome)) => break Ok(outcome),
                Ok(ExportEvent::Failed(err)) => break Err(err),
                Err(_) => break Err(ExportError::WorkerStopped),
            }
        };
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Export worker panicked");
            }
        }
        result
    }

    pub fn wait(self) -> Result<ExportOutcome, ExportError> {
        self.wait_with_progress(|_| {})
    }
}

/// Runs each export on its own thread.
///
/// Defaults to the ffmpeg reader and writer with no storage check and no
/// publish step.
pub struct ThreadedExportWorker {
    reader: Box<dyn ContainerReader>,
    writer: Box<dyn ContainerWriter>,
    logger: Box<dyn ExportLogger>,
    storage: Option<Box<dyn StorageAccess>>,
    publisher: Option<Box<dyn PublishSink>>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl ThreadedExportWorker {
    pub fn new() -> Self {
        Self {
            reader: Box::new(FfmpegContainerReader::new()),
            writer: Box::new(FfmpegContainerWriter::new()),
            logger: Box::new(LogExportLogger::default()),
            storage: None,
            publisher: None,
            cancelled: None,
        }
    }

    /// Starts `job` with the default components.
    pub fn spawn(job: ExportJob) -> ExportHandle {
        Self::new().start(job)
    }

    pub fn with_container(
        mut self,
        reader: Box<dyn ContainerReader>,
        writer: Box<dyn ContainerWriter>,
    ) -> Self {
        self.reader = reader;
        self.writer = writer;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn ExportLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_storage_access(mut self, storage: Box<dyn StorageAccess>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_publisher(mut self, publisher: Box<dyn PublishSink>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Shares `flag` with the export, so raising it cancels like
    /// [`ExportHandle::cancel`].
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    /// Spawns the worker thread and returns immediately.
    pub fn start(mut self, job: ExportJob) -> ExportHandle {
        let (tx, rx) = crossbeam_channel::unbounded::<ExportEvent>();
        let cancelled = self
            .cancelled
            .take()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let cancelled_clone = cancelled.clone();

        let thread = thread::spawn(move || {
            let event = match self.run(&job, &tx, &cancelled_clone) {
                Ok(outcome) => ExportEvent::Completed(outcome),
                Err(err) => ExportEvent::Failed(err),
            };
            let _ = tx.send(event);
        });

        ExportHandle {
            events: rx,
            cancelled,
            thread: Some(thread),
        }
    }

    fn run(
        self,
        job: &ExportJob,
        tx: &Sender<ExportEvent>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<ExportOutcome, ExportError> {
        if let Some(storage) = &self.storage {
            let dir = output_dir(job.output());
            if !storage.can_write(dir) {
                return Err(ExportError::PermissionDenied(dir.to_path_buf()));
            }
        }

        let share = if self.publisher.is_some() {
            EXPORT_PROGRESS_SHARE
        } else {
            1.0
        };
        let tx_progress = tx.clone();
        let progress: ProgressFn = Box::new(move |value: f64| {
            let _ = tx_progress.send(ExportEvent::Progress(value * share));
        });

        let mut use_case = ExportVideoUseCase::new(
            self.reader,
            self.writer,
            Some(self.logger),
            Some(progress),
            Some(cancelled.clone()),
        );
        let mut outcome = use_case.execute(job)?;

        let Some(mut publisher) = self.publisher else {
            return Ok(outcome);
        };

        if cancelled.load(Ordering::Relaxed) {
            remove_local(&outcome.output_path);
            return Err(ExportError::Cancelled);
        }

        let published = publisher.publish(&outcome.output_path, &mut |fraction| {
            let value = share + fraction.clamp(0.0, 1.0) * (1.0 - share);
            let _ = tx.send(ExportEvent::Progress(value));
        })?;
        remove_local(&outcome.output_path);
        outcome.output_path = published;
        Ok(outcome)
    }
}

impl Default for ThreadedExportWorker {
    fn default() -> Self {
        Self::new()
    }
}

fn output_dir(output: &Path) -> &Path {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn remove_local(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to remove local export {}: {e}", path.display());
    }
}
