use crate::core::batch::{BatchDescriptor, BatchExecutor, DescriptorRewriter};
use crate::core::error::{DefaultErrorReporter, ErrorReporter, QmError};
use crate::core::results_processor::{ExtractionSummary, ResultExtractor};
use crate::core::session::{RunSession, ScratchPaths};
use crate::core::types::{Revision, RevisionRequest, RunKey, RunState};
use crate::core::workspace::SvnWorkspace;
use crate::utils::files;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Filesystem locations the coordinator works with, already resolved against the root.
#[derive(Debug, Clone)]
pub struct Layout {
    pub results_dir: PathBuf,
    pub archive_root: PathBuf,
}

impl Layout {
    pub fn archive_dir(&self, key: &RunKey) -> PathBuf {
        self.archive_root
            .join(key.revision.to_string())
            .join(&key.batch_name)
    }
}

/// How a RunKey reached the `Satisfied` state.
#[derive(Debug)]
pub enum RunOutcome {
    /// The archive already held artifacts; nothing ran.
    AlreadySatisfied { archive: PathBuf },
    Executed {
        revision: u64,
        archive: PathBuf,
        extraction: ExtractionSummary,
        archived_files: usize,
    },
}

impl RunOutcome {
    pub fn archive(&self) -> &Path {
        match self {
            RunOutcome::AlreadySatisfied { archive } | RunOutcome::Executed { archive, .. } => {
                archive
            }
        }
    }
}

/// Final record of one RunKey within a sweep.
#[derive(Debug)]
pub struct RunReport {
    pub key: RunKey,
    pub state: RunState,
    pub outcome: Result<RunOutcome, QmError>,
}

impl RunReport {
    fn new(key: RunKey, outcome: Result<RunOutcome, QmError>) -> Self {
        let state = if outcome.is_ok() {
            RunState::Satisfied
        } else {
            RunState::Failed
        };
        RunReport {
            key,
            state,
            outcome,
        }
    }

    /// Failed outright, or completed with scenarios that did not make it to the store.
    pub fn has_failures(&self) -> bool {
        match &self.outcome {
            Err(_) => true,
            Ok(RunOutcome::Executed { extraction, .. }) => !extraction.is_clean(),
            Ok(RunOutcome::AlreadySatisfied { .. }) => false,
        }
    }

    pub fn status_line(&self) -> String {
        match &self.outcome {
            Ok(RunOutcome::AlreadySatisfied { .. }) => "already archived, skipped".to_string(),
            Ok(RunOutcome::Executed { extraction, .. }) if extraction.is_clean() => {
                format!("ok, {} scenarios published", extraction.published.len())
            }
            Ok(RunOutcome::Executed { extraction, .. }) => {
                let failed: Vec<&str> = extraction
                    .failures
                    .iter()
                    .map(|f| f.scenario.as_str())
                    .collect();
                format!(
                    "completed, {} scenarios published, {} failed ({})",
                    extraction.published.len(),
                    failed.len(),
                    failed.join(", ")
                )
            }
            Err(error) => format!("failed [{}]: {}", error.code(), error),
        }
    }
}

/// Every RunKey of one sweep, in execution order.
#[derive(Debug)]
pub struct SweepReport {
    pub sweep_id: uuid::Uuid,
    pub requested: RevisionRequest,
    /// Revision the sweep ran against; `WorkingCopy` sweeps record the base revision.
    pub revision: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub runs: Vec<RunReport>,
}

impl SweepReport {
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|run| run.has_failures()).count()
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 {
            0
        } else {
            1
        }
    }
}

/// Drives one (revision, batch) pair from checkout to archived, published results.
pub struct RunCoordinator {
    layout: Layout,
    workspace: SvnWorkspace,
    rewriter: DescriptorRewriter,
    executor: BatchExecutor,
    extractor: ResultExtractor,
    reporter: Box<dyn ErrorReporter + Send + Sync>,
}

impl RunCoordinator {
    pub fn new(
        layout: Layout,
        workspace: SvnWorkspace,
        rewriter: DescriptorRewriter,
        executor: BatchExecutor,
        extractor: ResultExtractor,
    ) -> Self {
        RunCoordinator {
            layout,
            workspace,
            rewriter,
            executor,
            extractor,
            reporter: Box::new(DefaultErrorReporter::new()),
        }
    }

    pub async fn run_one(
        &self,
        revision: Revision,
        batch: &BatchDescriptor,
    ) -> Result<RunOutcome, QmError> {
        let key = RunKey::new(revision, batch.name.clone());
        let span = tracing::info_span!("run", key = %key);
        self.run_key(&key, batch).instrument(span).await
    }

    async fn run_key(&self, key: &RunKey, batch: &BatchDescriptor) -> Result<RunOutcome, QmError> {
        // The archive path only depends on the requested revision, so a satisfied
        // key is detected before the working copy is touched.
        let archive = self.layout.archive_dir(key);
        if files::dir_has_entries(&archive)? {
            tracing::info!(archive = %archive.display(), state = %RunState::Satisfied, "archive already populated, skipping");
            return Ok(RunOutcome::AlreadySatisfied { archive });
        }
        tracing::info!(state = %RunState::InProgress, "starting run");

        // The session owns the working tree too.
        let session = RunSession::acquire(ScratchPaths {
            results_dir: self.layout.results_dir.clone(),
            output_dir: self.rewriter.output_dir().to_path_buf(),
        })?;

        tracing::info!("reverting working copy");
        self.workspace.revert().await?;
        let revision = match key.revision {
            Revision::Number(expected) => {
                self.workspace.update_to_revision(expected).await?;
                let actual = self.workspace.current_revision().await?;
                if actual != expected {
                    return Err(QmError::RevisionMismatch { expected, actual });
                }
                tracing::info!(revision = actual, "updated working copy");
                actual
            }
            Revision::WorkingCopy => self.workspace.current_revision().await?,
        };

        fs::create_dir_all(&archive)
            .map_err(|e| QmError::io(format!("failed to create {}", archive.display()), e))?;
        session.purge_results()?;

        let output_dir = self.rewriter.rewrite_output_dir(&batch.path)?;
        tracing::debug!(output_dir = %output_dir.display(), "solver output redirected");
        session.prepare_output_dir()?;

        self.executor.execute(batch).await?;

        let extraction = self
            .extractor
            .extract_and_publish(revision, &batch.name)
            .await?;

        let archived_files = session.promote(&archive)?;
        drop(session);

        tracing::info!(
            archive = %archive.display(),
            archived_files,
            state = %RunState::Satisfied,
            "run complete"
        );
        Ok(RunOutcome::Executed {
            revision,
            archive,
            extraction,
            archived_files,
        })
    }

    /// Settle the sweep revision, then run every batch in order.
    ///
    /// RunKey failures are recorded and the sweep moves on; fatal errors and
    /// failures while settling the revision abort it.
    pub async fn run_sweep(
        &self,
        request: RevisionRequest,
        batches: &[BatchDescriptor],
    ) -> Result<SweepReport, QmError> {
        let sweep_id = uuid::Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("sweep", sweep_id = %sweep_id);

        async {
            self.workspace.cleanup().await?;
            let (revision, run_revision) = match request {
                RevisionRequest::Head => {
                    self.workspace.update_to_head().await?;
                    let latest = self.workspace.current_revision().await?;
                    tracing::info!(revision = latest, "found latest revision");
                    (latest, Revision::Number(latest))
                }
                RevisionRequest::Exact(Revision::Number(n)) => (n, Revision::Number(n)),
                RevisionRequest::Exact(Revision::WorkingCopy) => {
                    (self.workspace.current_revision().await?, Revision::WorkingCopy)
                }
            };

            let mut runs = Vec::with_capacity(batches.len());
            for batch in batches {
                let outcome = match self.run_one(run_revision, batch).await {
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(error) => {
                        self.reporter.report_error(&error);
                        Err(error)
                    }
                    ok => ok,
                };
                let report = RunReport::new(RunKey::new(run_revision, batch.name.clone()), outcome);
                tracing::info!(batch = %batch.name, status = %report.status_line(), "batch finished");
                runs.push(report);
            }

            let report = SweepReport {
                sweep_id,
                requested: request,
                revision,
                started_at,
                finished_at: Utc::now(),
                runs,
            };
            tracing::info!(
                revision,
                batches = report.runs.len(),
                failed = report.failed(),
                "sweep finished"
            );
            Ok::<_, QmError>(report)
        }
        .instrument(span)
        .await
    }
}
