//! Bulk export of remote files into a single zip archive
//!
//! [`export_archive`] downloads every descriptor through the authenticated
//! pipeline with a small worker pool and appends each file to an in-memory
//! archive as soon as it arrives. At most one downloaded file per worker is
//! held in memory at a time.
//!
//! A file that fails to download is logged and left out; only cancellation
//! or an archive writer error fails the export as a whole. Once a download
//! reports that the session has ended, the remaining files are skipped
//! without a request. An export in which every download failed still
//! produces a valid archive (see [`archive::PLACEHOLDER_ENTRY`]).

pub mod archive;
pub mod naming;

use crate::client::{ApiClient, ApiRequest};
use crate::config::{CollectOptions, ExportOptions};
use crate::error::{Error, Result};
use crate::types::{DocumentRecord, ExportPhase, ExportProgress, ExportSummary, FileDescriptor};
use archive::{ArchiveEntry, ArchiveWriter};
use futures::future::try_join_all;
use naming::{NameRegistry, is_already_compressed};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// State shared by the export workers
struct ExportJob<'a> {
    client: &'a ApiClient,
    descriptors: &'a [FileDescriptor],
    options: &'a ExportOptions,
    cursor: AtomicUsize,
    attempted: AtomicUsize,
    included: AtomicUsize,
    session_ended: AtomicBool,
    names: Mutex<NameRegistry>,
    writer: Arc<Mutex<ArchiveWriter>>,
}

impl ExportJob<'_> {
    fn check_cancelled(&self) -> Result<()> {
        match &self.options.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, phase: ExportPhase, current: usize) {
        report(self.options, phase, current, self.descriptors.len());
    }

    async fn run_worker(&self, worker: usize) -> Result<()> {
        loop {
            self.check_cancelled()?;

            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(descriptor) = self.descriptors.get(index) else {
                debug!(worker, "no descriptors left");
                return Ok(());
            };

            self.check_cancelled()?;
            self.export_one(descriptor).await?;

            let attempted = self.attempted.fetch_add(1, Ordering::SeqCst) + 1;
            self.report(ExportPhase::Downloading, attempted);
        }
    }

    async fn export_one(&self, descriptor: &FileDescriptor) -> Result<()> {
        if self.session_ended.load(Ordering::SeqCst) {
            debug!(file_id = %descriptor.id, "session ended, skipping file");
            return Ok(());
        }

        let path = self.options.download_path(&descriptor.id);
        let data = match self.client.download_bytes(&path).await {
            Ok(data) => data,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) if e.is_session_terminated() => {
                if !self.session_ended.swap(true, Ordering::SeqCst) {
                    warn!(
                        file_id = %descriptor.id,
                        error = %e,
                        "session ended during export, skipping remaining files"
                    );
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    file_id = %descriptor.id,
                    name = %descriptor.display_name,
                    error = %e,
                    "skipping file that failed to download"
                );
                return Ok(());
            }
        };

        let name = self
            .names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deduplicate(&descriptor.display_name);
        let entry = ArchiveEntry {
            store_raw: is_already_compressed(&name),
            name,
            data,
        };

        let writer = Arc::clone(&self.writer);
        spawn_blocking(move || {
            writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add_entry(entry)
        })
        .await
        .map_err(|e| Error::Archive(format!("archive task panicked: {}", e)))??;

        self.included.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn report(options: &ExportOptions, phase: ExportPhase, current: usize, total: usize) {
    if let Some(on_progress) = &options.on_progress {
        on_progress(ExportProgress {
            phase,
            current,
            total,
        });
    }
}

/// Download every file and pack them into one zip archive
///
/// Entries are named after each descriptor's display name, sanitized and
/// made unique. Archive entry order follows download completion, not input
/// order. If the session ends mid-export, the files already packed are
/// kept and the rest are counted as skipped.
///
/// # Errors
///
/// - [`Error::Cancelled`] when the cancellation token is tripped; no archive
///   is produced
/// - [`Error::Archive`] if the archive cannot be written
/// - [`Error::Config`] for invalid options
pub async fn export_archive(
    client: &ApiClient,
    descriptors: &[FileDescriptor],
    options: ExportOptions,
) -> Result<ExportSummary> {
    options.validate()?;

    let total = descriptors.len();
    let workers = options.concurrency.min(total);
    info!(total, workers, "starting archive export");

    let job = ExportJob {
        client,
        descriptors,
        options: &options,
        cursor: AtomicUsize::new(0),
        attempted: AtomicUsize::new(0),
        included: AtomicUsize::new(0),
        session_ended: AtomicBool::new(false),
        names: Mutex::new(NameRegistry::new()),
        writer: Arc::new(Mutex::new(ArchiveWriter::new(options.compression_level))),
    };

    job.check_cancelled()?;
    try_join_all((0..workers).map(|worker| job.run_worker(worker))).await?;

    let ExportJob {
        attempted,
        included,
        writer,
        ..
    } = job;
    let attempted = attempted.into_inner();
    let included = included.into_inner();
    report(&options, ExportPhase::Finalizing, attempted, total);

    let writer = Arc::try_unwrap(writer)
        .map_err(|_| Error::Archive("archive writer still in use".to_string()))?
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    let archive = spawn_blocking(move || writer.finish())
        .await
        .map_err(|e| Error::Archive(format!("archive task panicked: {}", e)))??;

    let summary = ExportSummary {
        archive,
        included,
        skipped: total - included,
        total,
    };
    report(&options, ExportPhase::Done, attempted, total);

    if summary.is_partial() {
        warn!(
            included,
            skipped = summary.skipped,
            total,
            "archive export finished with missing files"
        );
    } else {
        info!(included, size = summary.archive.len(), "archive export finished");
    }
    Ok(summary)
}

/// Export every document of a list endpoint
///
/// Collects the full list with [`ApiClient::collect_list`], using each
/// record's original upload name where one is known, then runs
/// [`export_archive`]. The collection's cancellation token is also applied
/// to the export unless the export options carry their own.
pub async fn export_documents(
    client: &ApiClient,
    list: ApiRequest,
    collect: CollectOptions,
    mut options: ExportOptions,
) -> Result<ExportSummary> {
    if options.cancel.is_none() {
        options.cancel = collect.cancel.clone();
    }

    let records: Vec<DocumentRecord> = client.collect_list(list, collect).await?;
    let descriptors: Vec<FileDescriptor> = records.into_iter().map(FileDescriptor::from).collect();
    debug!(documents = descriptors.len(), "documents collected for export");

    export_archive(client, &descriptors, options).await
}
