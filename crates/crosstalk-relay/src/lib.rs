pub mod commands;
pub mod echo;
pub mod history;
pub mod inbound;
pub mod outbound;
pub mod state;

pub use commands::is_control_command;
pub use echo::EchoGuard;
pub use history::HistoryStore;
pub use inbound::InboundRelay;
pub use outbound::OutboundPublisher;
pub use state::RelayState;
