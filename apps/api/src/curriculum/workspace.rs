//! Registry of open sessions.
//!
//! `SessionWorkspace` is constructed once in `main` and carried in `AppState`.
//! Opening a session loads it (draft first, then the published copy), lays it
//! out, and starts its pagination scheduler. Closing it stops the scheduler
//! and saves a final draft; the in-memory model is never rewritten by close.
//!
//! All mutations of one session are serialized by its mutex.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::curriculum::draft::{DraftError, DraftSnapshot, DraftStatus, DraftStore, SaveOutcome};
use crate::curriculum::media::{resolve_session_media, MediaLibrary};
use crate::curriculum::publish::{
    validate_for_publish, PublishError, PublishReceipt, PublishStore, SessionPhase,
};
use crate::curriculum::scheduler::{apply_layout, PaginationScheduler, SchedulerSettings};
use crate::curriculum::templates::{template_definition, TemplateType};
use crate::curriculum::tree::{apply_edit, normalize_order, Edit, EditEffect, EditError};
use crate::errors::AppError;
use crate::layout::measurement::{MeasurementReport, MeasurementTable, ReportOutcome};
use crate::layout::pagination::{compute_layout, PageAssignment};
use crate::layout::projection::{project_pages, RenderedPage};
use crate::models::ids::{CourseId, SessionId};
use crate::models::session::{CourseSession, SessionMetadata};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayoutStats {
    pub passes: u64,
    pub stale_passes: u64,
}

/// Runtime state of one open session. Only `session` is ever persisted.
pub struct OpenSession {
    pub session: CourseSession,
    /// Bumped on every edit and every applied layout change.
    pub revision: u64,
    pub phase: SessionPhase,
    pub measurements: MeasurementTable,
    pub assignment: PageAssignment,
    pub draft_status: DraftStatus,
    pub stats: LayoutStats,
}

impl OpenSession {
    pub fn new(session: CourseSession) -> Self {
        Self {
            session,
            revision: 0,
            phase: SessionPhase::Editing,
            measurements: MeasurementTable::new(),
            assignment: PageAssignment::new(),
            draft_status: DraftStatus::Unsaved,
            stats: LayoutStats::default(),
        }
    }

    /// Records the result of a draft save unless a newer save already
    /// reported. Saves may complete out of order.
    pub fn record_draft_result(&mut self, saved_at: DateTime<Utc>, result: &Result<SaveOutcome, DraftError>) {
        let newest = match &self.draft_status {
            DraftStatus::Unsaved => None,
            DraftStatus::Saved { at } | DraftStatus::Failed { at, .. } => Some(*at),
        };
        if newest.is_some_and(|at| at > saved_at) {
            return;
        }
        self.draft_status = match result {
            Ok(_) => DraftStatus::Saved { at: saved_at },
            Err(e) => DraftStatus::Failed {
                at: saved_at,
                error: e.to_string(),
            },
        };
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.session.clone(),
            revision: self.revision,
            phase: self.phase,
            draft_status: self.draft_status.clone(),
            page_count: self.session.canvases.len(),
            measured_units: self.measurements.measured_unit_count(),
            layout: self.stats,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: CourseSession,
    pub revision: u64,
    pub phase: SessionPhase,
    pub draft_status: DraftStatus,
    pub page_count: usize,
    pub measured_units: usize,
    pub layout: LayoutStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub revision: u64,
    pub phase: SessionPhase,
    #[serde(flatten)]
    pub effect: EditEffect,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagesView {
    pub revision: u64,
    pub pages: Vec<RenderedPage>,
}

/// Parameters for creating a new session.
pub struct NewSession {
    pub course_id: CourseId,
    pub title: String,
    pub template_type: TemplateType,
    pub order: u32,
    pub metadata: SessionMetadata,
    pub duration_minutes: Option<u32>,
}

struct OpenEntry {
    handle: Arc<Mutex<OpenSession>>,
    scheduler: PaginationScheduler,
}

pub struct SessionWorkspace {
    sessions: RwLock<HashMap<SessionId, OpenEntry>>,
    drafts: Arc<dyn DraftStore>,
    published: Arc<dyn PublishStore>,
    settings: SchedulerSettings,
}

impl SessionWorkspace {
    pub fn new(
        drafts: Arc<dyn DraftStore>,
        published: Arc<dyn PublishStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            drafts,
            published,
            settings,
        }
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    pub async fn create(&self, params: NewSession) -> SessionView {
        let mut session = CourseSession::new(params.course_id, params.title, params.template_type);
        session.order = params.order;
        session.metadata = params.metadata;
        session.duration_minutes = params.duration_minutes;

        let id = session.id;
        let handle = self.insert(session).await;
        info!(session_id = %id, template = ?params.template_type, "session created");

        let open = handle.lock().await;
        self.spawn_draft_save(&handle, DraftSnapshot::capture(&open.session));
        open.view()
    }

    /// Returns the open session, loading it from storage on first access.
    pub async fn open(&self, id: SessionId) -> Result<Arc<Mutex<OpenSession>>, AppError> {
        if let Some(entry) = self.sessions.read().await.get(&id) {
            return Ok(entry.handle.clone());
        }

        let mut session = match self.drafts.load(id).await {
            Ok(Some(draft)) => {
                debug!(session_id = %id, last_saved = %draft.last_saved, "opening session from draft");
                draft.session
            }
            Ok(None) => self.load_published(id).await?,
            Err(e) => {
                warn!(session_id = %id, error = %e, "draft lookup failed; falling back to published copy");
                self.load_published(id).await?
            }
        };
        normalize_order(&mut session);
        Ok(self.insert(session).await)
    }

    async fn load_published(&self, id: SessionId) -> Result<CourseSession, AppError> {
        self.published
            .load_published(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))
    }

    /// Lays the session out once and registers it. If another request opened
    /// the same session first, that instance wins.
    async fn insert(&self, session: CourseSession) -> Arc<Mutex<OpenSession>> {
        let id = session.id;
        let mut open = OpenSession::new(session);
        let (plan, reflow) = compute_layout(&open.session, &open.measurements, &self.settings.estimates);
        apply_layout(&mut open, 0, &plan, reflow);

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&id) {
            return existing.handle.clone();
        }
        let handle = Arc::new(Mutex::new(open));
        let scheduler = PaginationScheduler::spawn(handle.clone(), id, self.settings);
        sessions.insert(
            id,
            OpenEntry {
                handle: handle.clone(),
                scheduler,
            },
        );
        handle
    }

    /// Stops the session's scheduler and drops it from the registry after a
    /// final draft save. Returns false if it was not open.
    pub async fn close(&self, id: SessionId) -> bool {
        let Some(entry) = self.sessions.write().await.remove(&id) else {
            return false;
        };
        drop(entry.scheduler);

        let mut open = entry.handle.lock().await;
        let snapshot = DraftSnapshot::capture(&open.session);
        let result = self.drafts.save(&snapshot).await;
        if let Err(e) = &result {
            warn!(session_id = %id, error = %e, "final draft save on close failed");
        }
        open.record_draft_result(snapshot.last_saved, &result);
        info!(session_id = %id, "session closed");
        true
    }

    pub async fn is_open(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    async fn nudge(&self, id: SessionId) {
        if let Some(entry) = self.sessions.read().await.get(&id) {
            entry.scheduler.nudge();
        }
    }

    // ── operations ──────────────────────────────────────────────────────────

    pub async fn view(&self, id: SessionId) -> Result<SessionView, AppError> {
        let handle = self.open(id).await?;
        let open = handle.lock().await;
        Ok(open.view())
    }

    pub async fn edit(&self, id: SessionId, edit: Edit) -> Result<EditOutcome, AppError> {
        let handle = self.open(id).await?;
        let outcome = {
            let mut open = handle.lock().await;
            let effect = apply_edit(&mut open.session, edit).map_err(|e: EditError| {
                debug!(session_id = %id, error = %e, "edit rejected");
                e
            })?;
            open.revision += 1;
            open.measurements.invalidate_units(&effect.touched);
            open.measurements.clear_pages();
            if open.phase == SessionPhase::Published {
                open.phase = SessionPhase::Editing;
            }
            self.spawn_draft_save(&handle, DraftSnapshot::capture(&open.session));
            EditOutcome {
                revision: open.revision,
                phase: open.phase,
                effect,
            }
        };
        if outcome.effect.reflow {
            self.nudge(id).await;
        }
        Ok(outcome)
    }

    pub async fn record_measurements(
        &self,
        id: SessionId,
        report: MeasurementReport,
    ) -> Result<ReportOutcome, AppError> {
        let handle = self.open(id).await?;
        let outcome = {
            let mut open = handle.lock().await;
            let revision = open.revision;
            open.measurements.record_report(&report, revision)
        };
        if let ReportOutcome::Applied { changed: true, .. } = outcome {
            self.nudge(id).await;
        }
        Ok(outcome)
    }

    pub async fn pages(&self, id: SessionId, media: &dyn MediaLibrary) -> Result<PagesView, AppError> {
        let handle = self.open(id).await?;
        let (session, assignment, revision) = {
            let open = handle.lock().await;
            (open.session.clone(), open.assignment.clone(), open.revision)
        };
        let resolved = resolve_session_media(media, &session).await;
        let definition = template_definition(session.template_type);
        let pages = project_pages(&session, &definition, &assignment, &resolved);
        Ok(PagesView { revision, pages })
    }

    /// Saves a draft now and waits for the result. This is the retry path
    /// after a background save failed.
    pub async fn save_draft(&self, id: SessionId) -> Result<DraftStatus, AppError> {
        let handle = self.open(id).await?;
        let snapshot = {
            let open = handle.lock().await;
            DraftSnapshot::capture(&open.session)
        };
        let result = self.drafts.save(&snapshot).await;
        let mut open = handle.lock().await;
        open.record_draft_result(snapshot.last_saved, &result);
        result?;
        Ok(open.draft_status.clone())
    }

    /// Validates and publishes the current state of the session.
    pub async fn publish(&self, id: SessionId) -> Result<PublishReceipt, AppError> {
        let handle = self.open(id).await?;
        let (session, revision, snapshot_at) = {
            let mut open = handle.lock().await;
            if open.phase == SessionPhase::Validating {
                return Err(PublishError::AlreadyValidating.into());
            }
            open.phase = SessionPhase::Validating;
            (open.session.clone(), open.revision, Utc::now())
        };

        let definition = template_definition(session.template_type);
        let issues = validate_for_publish(&session, &definition);
        if !issues.is_empty() {
            handle.lock().await.phase = SessionPhase::Editing;
            info!(session_id = %id, issues = issues.len(), "publish rejected");
            return Err(PublishError::Rejected(issues).into());
        }

        let stored = self.published.publish(&session).await;
        let mut open = handle.lock().await;
        match stored {
            Ok(receipt) => {
                // An edit that landed mid-publish is not part of what was
                // published; the session stays editing and keeps its draft.
                let unchanged = open.revision == revision;
                open.phase = if unchanged {
                    SessionPhase::Published
                } else {
                    SessionPhase::Editing
                };
                drop(open);
                if unchanged {
                    match self.drafts.clear_up_to(id, snapshot_at).await {
                        Ok(true) => debug!(session_id = %id, "draft retired after publish"),
                        Ok(false) => debug!(session_id = %id, "draft newer than publish kept"),
                        Err(e) => {
                            warn!(session_id = %id, error = %e, "failed to retire draft after publish")
                        }
                    }
                }
                Ok(receipt)
            }
            Err(e) => {
                open.phase = SessionPhase::Editing;
                warn!(session_id = %id, error = %e, "publish failed; session stays editable");
                Err(e.into())
            }
        }
    }

    /// Fire-and-forget draft save. The result lands in `draft_status`.
    fn spawn_draft_save(&self, handle: &Arc<Mutex<OpenSession>>, snapshot: DraftSnapshot) {
        let drafts = self.drafts.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            let result = drafts.save(&snapshot).await;
            match &result {
                Ok(SaveOutcome::Stored) => {
                    debug!(session_id = %snapshot.session_id, "draft saved")
                }
                Ok(SaveOutcome::Superseded) => {
                    debug!(session_id = %snapshot.session_id, "draft superseded by newer snapshot")
                }
                Err(e) => {
                    warn!(session_id = %snapshot.session_id, error = %e, "draft save failed")
                }
            }
            handle
                .lock()
                .await
                .record_draft_result(snapshot.last_saved, &result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::draft::MemoryDraftStore;
    use crate::curriculum::media::StaticMediaLibrary;
    use crate::curriculum::publish::MemoryPublishStore;
    use crate::layout::blocks::BlockKind;
    use crate::layout::measurement::{LayoutUnit, PageMeasurement, UnitMeasurement};
    use crate::models::ids::{ObjectiveId, TopicId};
    use std::time::Duration;

    struct Fixture {
        workspace: SessionWorkspace,
        drafts: Arc<MemoryDraftStore>,
        published: Arc<MemoryPublishStore>,
    }

    fn fixture() -> Fixture {
        let drafts = Arc::new(MemoryDraftStore::new());
        let published = Arc::new(MemoryPublishStore::new());
        let workspace = SessionWorkspace::new(
            drafts.clone(),
            published.clone(),
            SchedulerSettings {
                debounce: Duration::from_millis(20),
                ..SchedulerSettings::default()
            },
        );
        Fixture {
            workspace,
            drafts,
            published,
        }
    }

    fn new_lesson(title: &str) -> NewSession {
        NewSession {
            course_id: CourseId::new(),
            title: title.into(),
            template_type: TemplateType::Lesson,
            order: 0,
            metadata: SessionMetadata::default(),
            duration_minutes: Some(45),
        }
    }

    async fn build_content(ws: &SessionWorkspace, id: SessionId, tasks: usize) {
        let topic: TopicId = ws
            .edit(id, Edit::AddTopic { label: "Climate".into(), at: None })
            .await
            .unwrap()
            .effect
            .created
            .unwrap()
            .into();
        let objective: ObjectiveId = ws
            .edit(
                id,
                Edit::AddObjective {
                    topic_id: topic,
                    label: "Explain the greenhouse effect".into(),
                    at: None,
                },
            )
            .await
            .unwrap()
            .effect
            .created
            .unwrap()
            .into();
        for i in 0..tasks {
            ws.edit(
                id,
                Edit::AddTask {
                    objective_id: objective,
                    label: format!("Exercise {}", i + 1),
                    at: None,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_lays_out_one_page() {
        let f = fixture();
        let view = f.workspace.create(new_lesson("Weather")).await;
        assert_eq!(view.page_count, 1);
        assert_eq!(view.phase, SessionPhase::Editing);
        assert!(f.workspace.is_open(view.session.id).await);
    }

    #[tokio::test]
    async fn test_edits_bump_revision_and_save_drafts() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 2).await;

        let view = f.workspace.view(id).await.unwrap();
        assert_eq!(view.session.task_count(), 2);
        assert!(view.revision >= 4);

        // Background saves have had time to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let draft = f.drafts.load(id).await.unwrap().unwrap();
        assert_eq!(draft.session.task_count(), 2);
    }

    #[tokio::test]
    async fn test_measurement_report_for_old_revision_is_stale() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 1).await;
        // Let the scheduler settle so the revision stops moving.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let view = f.workspace.view(id).await.unwrap();
        let task = view.session.topics[0].objectives[0].tasks[0].id;

        let report = |revision| MeasurementReport {
            revision,
            pages: vec![PageMeasurement {
                page_id: view.session.canvases[0].id,
                reserved_height: Some(500.0),
                units: vec![UnitMeasurement {
                    unit: LayoutUnit::Task(task),
                    height: 300.0,
                }],
            }],
        };
        let stale = f
            .workspace
            .record_measurements(id, report(view.revision.saturating_sub(1)))
            .await
            .unwrap();
        assert_eq!(stale, ReportOutcome::Stale);

        let applied = f
            .workspace
            .record_measurements(id, report(view.revision))
            .await
            .unwrap();
        assert!(matches!(applied, ReportOutcome::Applied { changed: true, .. }));
    }

    #[tokio::test]
    async fn test_scheduler_reflows_after_edits() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        // Default estimate per task is 72; 20 tasks do not fit on one page.
        build_content(&f.workspace, id, 20).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let view = f.workspace.view(id).await.unwrap();
        assert!(view.page_count >= 2, "pages: {}", view.page_count);
        let pages = f
            .workspace
            .pages(id, &StaticMediaLibrary::new("http://m"))
            .await
            .unwrap();
        let placed: usize = pages.pages.iter().map(|p| p.units.len()).sum();
        assert_eq!(placed, 1 + 1 + 20);
    }

    #[tokio::test]
    async fn test_publish_rejected_then_fixed_then_published() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 1).await;
        f.workspace
            .edit(
                id,
                Edit::SetBlockVisibility {
                    block: BlockKind::Content,
                    visible: false,
                },
            )
            .await
            .unwrap();

        let err = f.workspace.publish(id).await.unwrap_err();
        let AppError::PublishRejected(issues) = err else {
            panic!("expected rejection, got {err:?}");
        };
        assert_eq!(issues[0].block, Some(BlockKind::Content));
        assert_eq!(f.workspace.view(id).await.unwrap().phase, SessionPhase::Editing);

        f.workspace
            .edit(
                id,
                Edit::SetBlockVisibility {
                    block: BlockKind::Content,
                    visible: true,
                },
            )
            .await
            .unwrap();
        let receipt = f.workspace.publish(id).await.unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(f.workspace.view(id).await.unwrap().phase, SessionPhase::Published);
        assert!(f.drafts.load(id).await.unwrap().is_none(), "published draft is retired");

        // Any edit returns the session to editing.
        f.workspace
            .edit(id, Edit::SetTitle { title: "Weather II".into() })
            .await
            .unwrap();
        assert_eq!(f.workspace.view(id).await.unwrap().phase, SessionPhase::Editing);
    }

    #[tokio::test]
    async fn test_publish_with_hidden_header_is_rejected_and_writes_nothing() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 1).await;
        f.workspace
            .edit(
                id,
                Edit::SetBlockVisibility {
                    block: BlockKind::Header,
                    visible: false,
                },
            )
            .await
            .unwrap();

        let err = f.workspace.publish(id).await.unwrap_err();
        let AppError::PublishRejected(issues) = err else {
            panic!("expected rejection, got {err:?}");
        };
        assert!(issues.iter().any(|i| i.block == Some(BlockKind::Header)));
        assert_eq!(f.workspace.view(id).await.unwrap().phase, SessionPhase::Editing);
        assert!(f.published.load_published(id).await.unwrap().is_none());
    }

    /// Holds every publish for `delay` before storing it.
    struct SlowPublishStore {
        inner: Arc<MemoryPublishStore>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl PublishStore for SlowPublishStore {
        async fn publish(&self, session: &CourseSession) -> Result<PublishReceipt, PublishError> {
            tokio::time::sleep(self.delay).await;
            self.inner.publish(session).await
        }

        async fn load_published(
            &self,
            session_id: SessionId,
        ) -> Result<Option<CourseSession>, PublishError> {
            self.inner.load_published(session_id).await
        }
    }

    #[tokio::test]
    async fn test_edit_during_publish_keeps_its_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let published = Arc::new(MemoryPublishStore::new());
        let workspace = Arc::new(SessionWorkspace::new(
            drafts.clone(),
            Arc::new(SlowPublishStore {
                inner: published.clone(),
                delay: Duration::from_millis(200),
            }),
            SchedulerSettings {
                debounce: Duration::from_millis(20),
                ..SchedulerSettings::default()
            },
        ));
        let id = workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&workspace, id, 1).await;

        let publishing = {
            let workspace = workspace.clone();
            tokio::spawn(async move { workspace.publish(id).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        workspace
            .edit(id, Edit::SetTitle { title: "Weather (revised)".into() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        publishing.await.unwrap().unwrap();
        assert_eq!(workspace.view(id).await.unwrap().phase, SessionPhase::Editing);
        let draft = drafts.load(id).await.unwrap().unwrap();
        assert_eq!(draft.session.title, "Weather (revised)");
        let stored = published.load_published(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Weather");
    }

    #[tokio::test]
    async fn test_publish_store_failure_keeps_session_editable() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 1).await;
        f.published.set_offline(true);

        let err = f.workspace.publish(id).await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
        let view = f.workspace.view(id).await.unwrap();
        assert_eq!(view.phase, SessionPhase::Editing);
        assert_eq!(view.session.task_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_draft_save_is_reported_and_retryable() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        f.drafts.set_offline(true);

        let err = f.workspace.save_draft(id).await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
        let view = f.workspace.view(id).await.unwrap();
        assert!(matches!(view.draft_status, DraftStatus::Failed { .. }));

        f.drafts.set_offline(false);
        let status = f.workspace.save_draft(id).await.unwrap();
        assert!(matches!(status, DraftStatus::Saved { .. }));
    }

    #[tokio::test]
    async fn test_close_then_reopen_from_draft() {
        let f = fixture();
        let id = f.workspace.create(new_lesson("Weather")).await.session.id;
        build_content(&f.workspace, id, 3).await;

        assert!(f.workspace.close(id).await);
        assert!(!f.workspace.is_open(id).await);
        assert!(!f.workspace.close(id).await);

        let view = f.workspace.view(id).await.unwrap();
        assert_eq!(view.session.task_count(), 3);
        assert_eq!(view.revision, 1, "fresh open starts a new revision history");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let f = fixture();
        let err = f.workspace.view(SessionId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_older_draft_result_does_not_override_newer() {
        let mut open = OpenSession::new(CourseSession::new(
            CourseId::new(),
            "x",
            TemplateType::Lesson,
        ));
        let newer = Utc::now();
        let older = newer - chrono::Duration::seconds(5);
        open.record_draft_result(newer, &Ok(SaveOutcome::Stored));
        open.record_draft_result(older, &Err(DraftError::Unavailable("late".into())));
        assert_eq!(open.draft_status, DraftStatus::Saved { at: newer });
    }
}
