// Page layout: geometry, measured heights, pagination of body units, and
// projection of the paginated session into renderable blocks.
// Pagination is CPU-bound and runs inside tokio::task::spawn_blocking.

pub mod blocks;
pub mod geometry;
pub mod measurement;
pub mod pagination;
pub mod projection;
