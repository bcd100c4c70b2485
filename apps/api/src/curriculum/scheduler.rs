//! Debounced pagination scheduler, one per open session.
//!
//! Edits and measurement reports nudge the scheduler. Nudges go through a
//! channel of capacity 1 with `try_send`, so a burst collapses into a single
//! pending pass. After the debounce window the scheduler snapshots the
//! session, paginates off-lock on the blocking pool, and swaps the result in
//! only if the session revision has not moved in the meantime. A pass that
//! lost the race is dropped; the edit that bumped the revision has already
//! queued the next one.
//!
//! Only this task ever replaces the canvas list, so no two passes for a
//! session run at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::curriculum::workspace::OpenSession;
use crate::layout::pagination::{compute_layout, PaginationPlan, Reflow, UnitEstimates};
use crate::models::ids::{PageId, SessionId};

pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub debounce: Duration,
    pub estimates: UnitEstimates,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            estimates: UnitEstimates::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The layout changed and was swapped in.
    Applied,
    /// The pass reproduced the current layout.
    Unchanged,
    /// The session was edited while the pass ran.
    Stale,
}

/// Swaps a computed layout into the session if it was computed from the
/// current revision. A changed layout bumps the revision so measurement
/// reports of the old layout are dropped; reserved heights of pages that
/// survive the swap are kept.
pub fn apply_layout(
    open: &mut OpenSession,
    based_on: u64,
    plan: &PaginationPlan,
    reflow: Reflow,
) -> PassOutcome {
    if open.revision != based_on {
        open.stats.stale_passes += 1;
        return PassOutcome::Stale;
    }

    let violations = plan.check_budget();
    if !violations.is_empty() {
        warn!(
            session_id = %open.session.id,
            pages = ?violations.iter().map(|v| v.page_number).collect::<Vec<_>>(),
            "pagination produced pages over the body height"
        );
    }

    open.stats.passes += 1;
    debug!(
        session_id = %open.session.id,
        pages = plan.pages.len(),
        last_page_fill = plan.pages.last().map(|p| p.fill_ratio()),
        "pagination pass computed"
    );
    if open.session.canvases == reflow.canvases && open.assignment == reflow.assignment {
        return PassOutcome::Unchanged;
    }

    open.session.canvases = reflow.canvases;
    open.assignment = reflow.assignment;
    let live: Vec<PageId> = open.session.canvases.iter().map(|p| p.id).collect();
    open.measurements.retain_pages(&live);
    open.revision += 1;
    PassOutcome::Applied
}

/// Runs one full pass for a session: snapshot, paginate off-lock, swap.
pub async fn run_layout_pass(
    handle: &Arc<Mutex<OpenSession>>,
    estimates: UnitEstimates,
) -> Option<PassOutcome> {
    let (session, measurements, revision) = {
        let open = handle.lock().await;
        (open.session.clone(), open.measurements.clone(), open.revision)
    };
    let session_id = session.id;

    let computed =
        tokio::task::spawn_blocking(move || compute_layout(&session, &measurements, &estimates))
            .await;
    let (plan, reflow) = match computed {
        Ok(result) => result,
        Err(e) => {
            warn!(%session_id, error = %e, "pagination pass panicked or was cancelled");
            return None;
        }
    };

    let mut open = handle.lock().await;
    let outcome = apply_layout(&mut open, revision, &plan, reflow);
    match outcome {
        PassOutcome::Applied => info!(
            %session_id,
            pages = open.session.canvases.len(),
            revision = open.revision,
            "pagination applied"
        ),
        PassOutcome::Unchanged => debug!(%session_id, "pagination unchanged"),
        PassOutcome::Stale => debug!(%session_id, based_on = revision, "discarding stale pagination pass"),
    }
    Some(outcome)
}

pub struct PaginationScheduler {
    nudge_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PaginationScheduler {
    pub fn spawn(handle: Arc<Mutex<OpenSession>>, session_id: SessionId, settings: SchedulerSettings) -> Self {
        let (nudge_tx, mut nudge_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            debug!(%session_id, debounce_ms = settings.debounce.as_millis() as u64, "pagination scheduler started");
            while nudge_rx.recv().await.is_some() {
                tokio::time::sleep(settings.debounce).await;
                // Nudges that arrived during the window are covered by this pass.
                while nudge_rx.try_recv().is_ok() {}
                run_layout_pass(&handle, settings.estimates).await;
            }
            debug!(%session_id, "pagination scheduler stopped");
        });

        Self { nudge_tx, task }
    }

    /// Requests a pass. Never blocks; a pending request absorbs this one.
    pub fn nudge(&self) {
        match self.nudge_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                warn!("pagination scheduler is gone; nudge dropped");
            }
        }
    }
}

impl Drop for PaginationScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
