//! Browser glue for Stride sessions: Web Storage, page navigation, the
//! session provider component and the route guard.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod navigator;
pub mod storage;

pub use auth::{RequireAuth, SessionContext, SessionProvider, use_is_authenticated, use_session};
pub use config::SessionConfig;
pub use error::SetupError;
pub use navigator::BrowserNavigator;
pub use storage::BrowserStorage;
