pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{AuthSession, SESSION_COOKIE};
pub use server::{start, AppState, ServerConfig, ServerHandle};
