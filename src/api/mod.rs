//! API layer - HTTP endpoint handlers.

mod dashboard;
mod handlers;
mod routes;

pub use dashboard::dashboard;
pub use handlers::{health, reset, stats};
pub use routes::api_routes;
