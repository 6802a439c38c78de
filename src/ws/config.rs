#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;
use serde_json::{Map, Value};

use super::traits::Configurator;

const DEFAULT_PING_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_RESTART_DELAY_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 3;
/// Outgoing buffer limit, matching the common 16 MiB WebSocket client default.
const DEFAULT_MAX_QUEUE_SIZE: usize = 16 * 1024 * 1024;
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);

/// Option key controlling the stored auto-reconnect preference.
pub const AUTO_RECONNECT_OPTION: &str = "autoReconnect";

/// Generic connection options as received from the command surface.
pub type Options = Map<String, Value>;

/// Transport tuning parameters.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct Config {
    /// Interval between keep-alive PING frames. A PONG must arrive before the next one.
    #[builder(default = DEFAULT_PING_INTERVAL_DURATION)]
    pub ping_interval: Duration,
    /// Delay before retrying a connect request that arrived while a session was live
    #[builder(default = DEFAULT_RESTART_DELAY_DURATION)]
    pub restart_delay: Duration,
    /// Retries after which the still-open transport is cancelled outright
    #[builder(default = DEFAULT_MAX_RESTART_ATTEMPTS)]
    pub max_restart_attempts: u32,
    /// Maximum number of outgoing bytes buffered by the transport
    #[builder(default = DEFAULT_MAX_QUEUE_SIZE)]
    pub max_queue_size: usize,
    /// Maximum time to wait for the opening handshake
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for Constant {
    fn from(config: &Config) -> Self {
        Constant::new(config.restart_delay)
    }
}

/// Derives the per-connection transport [`Config`] from the shared template.
///
/// Only the keep-alive interval is applied today. Other option keys are
/// accepted and reserved for future tuning, and are not interpreted.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionConfigurator;

impl Configurator for ConnectionConfigurator {
    fn configure(&self, base: &Config, _options: &Options) -> Config {
        Config {
            ping_interval: DEFAULT_PING_INTERVAL_DURATION,
            ..base.clone()
        }
    }
}

/// Reads `autoReconnect` from the options. Missing or non-boolean values mean `false`.
#[must_use]
pub fn auto_reconnect(options: &Options) -> bool {
    options
        .get(AUTO_RECONNECT_OPTION)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
