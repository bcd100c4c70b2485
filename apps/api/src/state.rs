use std::sync::Arc;

use crate::curriculum::media::MediaLibrary;
use crate::curriculum::workspace::SessionWorkspace;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Open sessions, their schedulers, and the draft/publish stores behind them.
    pub workspace: Arc<SessionWorkspace>,
    /// Pluggable media library. Production: S3 presigned URLs.
    pub media: Arc<dyn MediaLibrary>,
}
