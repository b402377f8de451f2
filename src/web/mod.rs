//! Local web surface
//!
//! Serves the landing page, the login/callback/logout flow and the
//! console-open operations.

mod router;
mod templates;
mod types;

pub use router::{AppState, create_router};
