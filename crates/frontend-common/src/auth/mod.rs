//! Session context, hooks and route guard

pub mod context;
pub mod guard;

// Re-export commonly used items
pub use context::{
    BrowserIdentityClient, BrowserSessionController, SessionContext, SessionProvider,
    build_controller, use_is_authenticated, use_session, use_session_snapshot,
};
pub use guard::RequireAuth;
