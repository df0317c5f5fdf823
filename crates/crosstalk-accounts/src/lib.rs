pub mod error;
pub mod sessions;
pub mod store;

pub use error::AccountError;
pub use sessions::{start_purge_task, Session, SessionRegistry};
pub use store::{AccountStore, PublicUser, UserRecord};
