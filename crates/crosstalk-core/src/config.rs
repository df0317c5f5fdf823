use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

/// Bus connection settings.
#[derive(Clone, Debug)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    /// The single shared topic, used for both subscribe and publish.
    pub topic: String,
    pub client_id: String,
    /// Bound on a single outbound publish attempt.
    pub publish_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "test.mosquitto.org".to_string(),
            port: 1883,
            topic: "iot/demo".to_string(),
            client_id: format!("crosstalk-{}", Uuid::now_v7()),
            publish_timeout: Duration::from_secs(30),
        }
    }
}

/// Full application configuration. Every field has a default and an
/// environment override.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub http_port: u16,
    pub history_capacity: usize,
    pub users_file: PathBuf,
    pub session_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            http_port: 5000,
            history_capacity: 100,
            users_file: PathBuf::from("data/users.json"),
            session_ttl: Duration::from_secs(60 * 60 * 24),
        }
    }
}

impl AppConfig {
    /// Build configuration from the environment, falling back to defaults.
    /// Recognized variables: MQTT_HOST, MQTT_PORT, MQTT_TOPIC,
    /// MQTT_CLIENT_ID, CHAT_MAX, PORT, USERS_FILE, SESSION_TTL_SECS.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bus = BusConfig {
            host: env_string("MQTT_HOST", defaults.bus.host),
            port: env_parse("MQTT_PORT", defaults.bus.port),
            topic: env_string("MQTT_TOPIC", defaults.bus.topic),
            client_id: env_string("MQTT_CLIENT_ID", defaults.bus.client_id),
            publish_timeout: defaults.bus.publish_timeout,
        };
        Self {
            bus,
            http_port: env_parse("PORT", defaults.http_port),
            history_capacity: env_parse("CHAT_MAX", defaults.history_capacity),
            users_file: env_string("USERS_FILE", defaults.users_file.display().to_string()).into(),
            session_ttl: Duration::from_secs(env_parse(
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )),
        }
    }
}

fn env_string(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "unparseable env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
