//! Provider-level configuration.
//!
//! Decoded from the JSON provider block the host passes on configure. Every
//! field is optional and unknown keys are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::convert::int_to_wire;
use crate::defaults::DefaultsTable;
use crate::diagnostics::{has_errors, Diagnostic};
use crate::error::ProviderError;
use crate::resources::observability::scrape_config::payload::DEFAULT_SAMPLE_LIMIT_PATH;
use crate::wait::{WaitHandler, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, MAX_WAIT_TIMEOUT};

/// Provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Overall timeout for wait handlers, in seconds.
    pub wait_timeout_secs: u64,
    /// Delay between wait-handler polls, in seconds.
    pub poll_interval_secs: u64,
    /// Service defaults injected into payloads.
    pub defaults: DefaultsTable,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            defaults: DefaultsTable::default(),
        }
    }
}

impl ProviderConfig {
    /// Decode and check a provider block. A JSON `null` yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let config: Self = match value {
            serde_json::Value::Null => Self::default(),
            other => serde_json::from_value(other)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        };

        let diagnostics = config.validate();
        if has_errors(&diagnostics) {
            let message = diagnostics
                .iter()
                .filter(|d| d.is_error())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Configuration(message));
        }
        Ok(config)
    }

    /// Check value constraints serde cannot express.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.wait_timeout_secs == 0 {
            diagnostics.push(
                Diagnostic::error("wait timeout must be positive")
                    .with_attribute("wait_timeout_secs"),
            );
        } else if self.wait_timeout_secs > MAX_WAIT_TIMEOUT.as_secs() {
            diagnostics.push(
                Diagnostic::error("wait timeout is too large")
                    .with_detail(format!("at most {} seconds", MAX_WAIT_TIMEOUT.as_secs()))
                    .with_attribute("wait_timeout_secs"),
            );
        }
        if self.poll_interval_secs == 0 {
            diagnostics.push(
                Diagnostic::error("poll interval must be positive")
                    .with_attribute("poll_interval_secs"),
            );
        } else if self.poll_interval_secs > self.wait_timeout_secs {
            diagnostics.push(
                Diagnostic::warning("poll interval exceeds wait timeout")
                    .with_detail("only one poll will run before the deadline")
                    .with_attribute("poll_interval_secs"),
            );
        }
        if let Err(err) = int_to_wire(
            DEFAULT_SAMPLE_LIMIT_PATH,
            self.defaults.scrape_config().sample_limit,
        ) {
            diagnostics.push(err.into());
        }
        diagnostics
    }

    /// The overall wait timeout.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Build the wait handler resources use, observing `cancel`.
    pub fn wait_handler(&self, cancel: CancellationToken) -> WaitHandler {
        WaitHandler::new(self.wait_timeout())
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_cancellation(cancel)
    }
}
