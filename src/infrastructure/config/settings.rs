use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PIX_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_PIX_POLL_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_PINPAD_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
	pub backend_url:          String,
	pub backend_api_token:    Option<String>,
	pub pinpad_url:           String,
	pub pinpad_timeout_ms:    u64,
	pub pix_poll_interval_ms: u64,
	pub pix_poll_timeout_ms:  u64,
	pub server_port:          u16,
	pub server_keepalive:     u64,
}

impl Config {
	pub fn load() -> Result<Self, config::ConfigError> {
		let config_builder = config::Config::builder()
			.set_default("pinpad_timeout_ms", DEFAULT_PINPAD_TIMEOUT_MS)?
			.set_default("pix_poll_interval_ms", DEFAULT_PIX_POLL_INTERVAL_MS)?
			.set_default("pix_poll_timeout_ms", DEFAULT_PIX_POLL_TIMEOUT_MS)?
			.set_default("server_port", 9999)?
			.set_default("server_keepalive", 75)?
			.add_source(config::Environment::with_prefix("APP"))
			.build()?;

		config_builder.try_deserialize()
	}

	pub fn pinpad_timeout(&self) -> Duration {
		Duration::from_millis(self.pinpad_timeout_ms)
	}

	pub fn pix_poll_interval(&self) -> Duration {
		Duration::from_millis(self.pix_poll_interval_ms)
	}

	pub fn pix_poll_timeout(&self) -> Duration {
		Duration::from_millis(self.pix_poll_timeout_ms)
	}
}
