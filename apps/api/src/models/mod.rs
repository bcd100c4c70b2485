pub mod ids;
pub mod rows;
pub mod session;
