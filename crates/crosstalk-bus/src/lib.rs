pub mod mock;
pub mod publisher;
pub mod reconnect;
pub mod supervisor;

pub use mock::MockBus;
pub use publisher::MqttPublisher;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use supervisor::{BusHandle, BusSupervisor};
