//! Authentication state and session lifecycle.

mod manager;
mod model;

pub use manager::{AuthState, SessionManager};
pub use model::{AuthError, LoginCredentials, SessionRecord, SourceKind};
