pub mod bus;
pub mod config;
pub mod connection;
pub mod errors;
pub mod ids;
pub mod messages;

pub use bus::BusPublisher;
pub use config::{AppConfig, BusConfig};
pub use connection::ConnectionState;
pub use errors::RelayError;
pub use ids::{SessionId, UserId};
pub use messages::{BusMessage, HistoryEntry, LastSeen, Origin};
