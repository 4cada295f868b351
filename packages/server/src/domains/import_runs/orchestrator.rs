//! Import run state machine.
//!
//! Each run is one tracked tokio task holding a [`RunHandle`] from the
//! [`RunRegistry`]. Pause is a cancellation whose meaning is decided by the
//! task itself: after it stops, it re-reads the persisted status and ends as
//! `paused` if a pause was requested, `cancelled` otherwise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::cloudflare::is_cloudflare_error;
use super::events::{DailyVoteWinnerSelected, ProposalReleased};
use super::models::{ImportRun, ImportRunStatus, Proposal, RunOutcome, MAX_LIST_LIMIT};
use super::registry::{RunHandle, RunRegistry};
use super::store::ImportRunStore;
use crate::common::{ImportRunId, NovelId, ProposalId};
use crate::domains::importing::{
    ChapterProgress, Checkpoint, ImportError, ImportRequest, ImportResult, ProposalImporter,
};
use crate::kernel::{EventBus, IngestDeps, RunContext, RunContextError};

#[derive(Clone)]
pub struct ImportOrchestrator {
    deps: IngestDeps,
    registry: RunRegistry,
    tracker: TaskTracker,
}

impl ImportOrchestrator {
    pub fn new(deps: IngestDeps) -> Self {
        Self {
            deps,
            registry: RunRegistry::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Start importing on `DailyVoteWinnerSelected`. The handler only spawns
    /// the run, so the publishing job is never held up by the import.
    pub fn register(&self, bus: &EventBus) {
        let orchestrator = self.clone();
        bus.on::<DailyVoteWinnerSelected, _, _>(move |event| {
            let orchestrator = orchestrator.clone();
            async move {
                let run_id = orchestrator.start_import(event.proposal_id);
                info!(run_id = %run_id, proposal_id = %event.proposal_id, "Import triggered by daily vote winner");
                Ok(())
            }
        });
    }

    pub fn start_import(&self, proposal_id: ProposalId) -> ImportRunId {
        self.start_import_with_cookies(proposal_id, None)
    }

    /// Launch a new run in the background and return its id immediately.
    pub fn start_import_with_cookies(
        &self,
        proposal_id: ProposalId,
        cookie_header: Option<String>,
    ) -> ImportRunId {
        let run_id = ImportRunId::new();
        self.launch(run_id, proposal_id, cookie_header);
        run_id
    }

    /// Relaunch a paused run. Returns false when the run is unknown, not
    /// paused, or still live in this process.
    pub async fn resume_import(&self, run_id: ImportRunId) -> Result<bool> {
        let Some(run) = self.deps.runs.get_by_id(run_id).await? else {
            return Ok(false);
        };
        if !run.status.is_resumable() {
            debug!(run_id = %run_id, status = %run.status, "Run is not paused, not resuming");
            return Ok(false);
        }
        if self.registry.is_active(run_id) {
            debug!(run_id = %run_id, "Run is still live, not resuming");
            return Ok(false);
        }
        self.settle_pause_request(&run).await?;
        Ok(self.launch(run_id, run.proposal_id, None))
    }

    /// A `pause_requested` left by a stopped task is settled to `paused`
    /// before relaunching, so only pauses issued against the new task
    /// carry over through `create`.
    async fn settle_pause_request(&self, run: &ImportRun) -> Result<()> {
        if run.status == ImportRunStatus::PauseRequested {
            self.deps.runs.set_status(run.id, ImportRunStatus::Paused).await?;
        }
        Ok(())
    }

    /// Signal the live run. False when nothing is running under `run_id`.
    pub fn cancel_import(&self, run_id: ImportRunId) -> bool {
        self.registry.cancel(run_id)
    }

    /// Persist `pause_requested`, then cancel.
    pub async fn pause_import(&self, run_id: ImportRunId) -> Result<bool> {
        self.deps
            .runs
            .set_status(run_id, ImportRunStatus::PauseRequested)
            .await?;
        Ok(self.cancel_import(run_id))
    }

    /// Pause every live run, e.g. before shutdown so they resume on restart.
    pub async fn pause_all(&self) -> usize {
        let mut paused = 0;
        for run_id in self.registry.active_ids() {
            match self.pause_import(run_id).await {
                Ok(true) => paused += 1,
                Ok(false) => {}
                Err(e) => error!(run_id = %run_id, error = %e, "Failed to pause run"),
            }
        }
        paused
    }

    /// Wait until every spawned run task has exited.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Relaunch every persisted run left suspended by a previous process.
    pub async fn resume_paused(&self) -> Result<usize> {
        let mut resumed = 0;
        for status in [ImportRunStatus::Paused, ImportRunStatus::PauseRequested] {
            for run in self.deps.runs.list(Some(status), Some(MAX_LIST_LIMIT)).await? {
                if self.registry.is_active(run.id) {
                    continue;
                }
                self.settle_pause_request(&run).await?;
                if self.launch(run.id, run.proposal_id, None) {
                    resumed += 1;
                }
            }
        }
        if resumed > 0 {
            info!(resumed, "Resumed paused import runs");
        }
        Ok(resumed)
    }

    pub fn is_running(&self, run_id: ImportRunId) -> bool {
        self.registry.is_active(run_id)
    }

    fn launch(&self, run_id: ImportRunId, proposal_id: ProposalId, cookie_header: Option<String>) -> bool {
        let Some(handle) = self.registry.register(run_id) else {
            warn!(run_id = %run_id, "Import run already active, not launching twice");
            return false;
        };
        let orchestrator = self.clone();
        self.tracker.spawn(async move {
            orchestrator
                .handle_import_run(handle, proposal_id, cookie_header)
                .await;
        });
        true
    }

    async fn handle_import_run(
        &self,
        handle: RunHandle,
        proposal_id: ProposalId,
        cookie_header: Option<String>,
    ) {
        let run_id = handle.run_id();
        let ctx = RunContext::with_timeout(handle.token(), self.deps.run_timeout);

        let proposal = match self.deps.proposals.get_proposal_by_id(proposal_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                error!(run_id = %run_id, proposal_id = %proposal_id, "Proposal not found for import");
                return;
            }
            Err(e) => {
                error!(run_id = %run_id, proposal_id = %proposal_id, error = %e, "Failed to load proposal for import");
                return;
            }
        };

        let Some(importer) = self.deps.importers.select(&proposal.original_link) else {
            error!(
                run_id = %run_id,
                proposal_id = %proposal_id,
                original_link = %proposal.original_link,
                "No importer registered for proposal link"
            );
            return;
        };

        info!(run_id = %run_id, proposal_id = %proposal_id, importer = importer.name(), "Starting import");

        let run = match self.deps.runs.create(run_id, proposal_id, importer.name()).await {
            Ok(run) => run,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Failed to record import run");
                return;
            }
        };

        let checkpoint = match run.checkpoint.as_ref().map(Checkpoint::decode).transpose() {
            Ok(cp) => cp.flatten(),
            Err(e) => {
                let message = ImportError::from(e).to_string();
                error!(run_id = %run_id, error = %message, "Stored checkpoint unusable");
                self.record_outcome(run_id, ImportRunStatus::Failed, None, Some(message), false)
                    .await;
                return;
            }
        };

        let cookie_header = self.resolve_cookie(run_id, cookie_header).await;

        let progress = RunProgress {
            runs: self.deps.runs.clone(),
            run_id,
            total_from_db: usize::try_from(run.progress_total).unwrap_or(0),
            novel_recorded: AtomicBool::new(false),
        };
        let request = ImportRequest {
            url: &proposal.original_link,
            upload_dir: &self.deps.upload_dir,
            checkpoint,
            cookie_header,
            chapters_limit: 0,
            novels: self.deps.novels.as_ref(),
            assets: self.deps.assets.as_ref(),
        };
        let result = importer.import(&ctx, request, &progress).await;

        self.finish(run_id, &proposal, importer.as_ref(), &ctx, result)
            .await;
    }

    /// Explicit cookie wins (and is saved for later resumes), then the
    /// stored one, else none.
    async fn resolve_cookie(&self, run_id: ImportRunId, explicit: Option<String>) -> Option<String> {
        if let Some(cookie) = explicit.filter(|c| !c.trim().is_empty()) {
            if let Err(e) = self.deps.run_cookies.upsert(run_id, &cookie).await {
                warn!(run_id = %run_id, error = %e, "Failed to store run cookies");
            }
            info!(run_id = %run_id, cookie_len = cookie.len(), "Using provided cookies for import");
            return Some(cookie);
        }

        match self.deps.run_cookies.get_by_run_id(run_id).await {
            Ok(Some(cookie)) => {
                info!(run_id = %run_id, cookie_len = cookie.len(), "Loaded stored cookies for import");
                Some(cookie)
            }
            Ok(None) => {
                warn!(run_id = %run_id, "No cookies for import, protected sites may block");
                None
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Failed to load run cookies");
                None
            }
        }
    }

    async fn finish(
        &self,
        run_id: ImportRunId,
        proposal: &Proposal,
        importer: &dyn ProposalImporter,
        ctx: &RunContext,
        result: Result<ImportResult, ImportError>,
    ) {
        let imported = match result {
            Ok(imported) => imported,
            Err(e) => {
                let message = e.to_string();
                let cloudflare_blocked = is_cloudflare_error(&message);

                if ctx.err() == Some(RunContextError::Cancelled) {
                    let pause_requested = match self.deps.runs.get_by_id(run_id).await {
                        Ok(run) => run.is_some_and(|r| r.status == ImportRunStatus::PauseRequested),
                        Err(e) => {
                            error!(run_id = %run_id, error = %e, "Failed to re-read run status");
                            false
                        }
                    };
                    let status = if pause_requested {
                        warn!(run_id = %run_id, proposal_id = %proposal.id, "Import paused");
                        ImportRunStatus::Paused
                    } else {
                        warn!(run_id = %run_id, proposal_id = %proposal.id, error = %message, "Import cancelled");
                        ImportRunStatus::Cancelled
                    };
                    self.record_outcome(run_id, status, None, Some(message), cloudflare_blocked)
                        .await;
                    return;
                }

                error!(
                    run_id = %run_id,
                    proposal_id = %proposal.id,
                    importer = importer.name(),
                    cloudflare_blocked,
                    error = %message,
                    "Import failed"
                );
                self.record_outcome(run_id, ImportRunStatus::Failed, None, Some(message), cloudflare_blocked)
                    .await;
                return;
            }
        };

        let novel_id = imported.novel_id;
        if let Err(e) = self
            .deps
            .proposals
            .set_proposal_novel_id(proposal.id, novel_id)
            .await
        {
            error!(run_id = %run_id, proposal_id = %proposal.id, novel_id = %novel_id, error = %e, "Failed to link proposal to novel");
            self.record_outcome(
                run_id,
                ImportRunStatus::Failed,
                Some(novel_id),
                Some(format!("{e:#}")),
                false,
            )
            .await;
            return;
        }

        info!(
            run_id = %run_id,
            proposal_id = %proposal.id,
            novel_id = %novel_id,
            chapters_saved = imported.chapters_saved,
            chapters_total = imported.chapters_total,
            "Proposal released into novel"
        );
        self.record_outcome(run_id, ImportRunStatus::Succeeded, Some(novel_id), None, false)
            .await;

        let released = ProposalReleased {
            proposal_id: proposal.id,
            novel_id,
        };
        if let Err(e) = self.deps.bus.publish(released).await {
            warn!(run_id = %run_id, error = %e, "ProposalReleased handler failed");
        }
    }

    async fn record_outcome(
        &self,
        run_id: ImportRunId,
        status: ImportRunStatus,
        novel_id: Option<NovelId>,
        error_message: Option<String>,
        cloudflare_blocked: bool,
    ) {
        let outcome = RunOutcome {
            status,
            novel_id,
            error_message,
            cloudflare_blocked,
        };
        if let Err(e) = self.deps.runs.set_result(run_id, outcome).await {
            error!(run_id = %run_id, status = %status, error = %e, "Failed to record run result");
        }
    }
}

/// Persists the checkpoint after the novel shell and every chapter.
struct RunProgress {
    runs: Arc<dyn ImportRunStore>,
    run_id: ImportRunId,
    total_from_db: usize,
    novel_recorded: AtomicBool,
}

#[async_trait]
impl ChapterProgress for RunProgress {
    async fn record(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(novel_id) = checkpoint.novel_id {
            if !self.novel_recorded.swap(true, Ordering::SeqCst) {
                self.runs.set_novel_id(self.run_id, novel_id).await?;
            }
        }
        let total = match checkpoint.total_chapters {
            0 => self.total_from_db,
            n => n,
        };
        self.runs
            .update_progress(self.run_id, checkpoint.next_index, total, checkpoint)
            .await
    }
}
