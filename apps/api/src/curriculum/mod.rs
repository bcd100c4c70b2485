// Course session editing: content tree, templates, drafts, publishing,
// and the per-session workspace that keeps pagination current.

pub mod draft;
pub mod handlers;
pub mod media;
pub mod publish;
pub mod scheduler;
pub mod templates;
pub mod tree;
pub mod workspace;
