//! Engine façade: lifecycle, mode policy and error mapping.

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::PinningError;
use crate::pinning;
use crate::policy::{PinningMode, unix_now};
use crate::store::ConfigStore;
use crate::telemetry::{self, LogLevel};

/// Certificate pinning engine.
///
/// Cheap to clone; clones share one configuration store, so a policy
/// fetched through any clone is visible to all of them. Independent
/// engines (separate `new` calls) share nothing and can be reset
/// independently.
#[derive(Clone)]
pub struct Engine {
	store: Arc<ConfigStore>,
}

impl Engine {
	pub fn new() -> Self {
		Engine {
			store: Arc::new(ConfigStore::new()),
		}
	}

	/// Engine fetching policies from a non-default CDN base; used by tests
	/// and self-hosted deployments.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Engine {
			store: Arc::new(ConfigStore::with_base_url(base_url)),
		}
	}

	/// Install credentials and warm the policy cache.
	///
	/// Inputs are trimmed; any empty string is rejected. The prefetch runs
	/// in the background and its failure is not surfaced here — the next
	/// `verify` will retry it.
	pub async fn setup(
		&self,
		organization_id: &str,
		project_id: &str,
		public_key_b64: &str,
		mode: PinningMode,
	) -> Result<(), PinningError> {
		self.store
			.set_credentials(organization_id, project_id, public_key_b64, mode)
			.await?;
		let store = self.store.clone();
		tokio::spawn(async move {
			if let Err(err) = store.get_policy().await {
				info!("policy prefetch failed: {err}");
			}
		});
		Ok(())
	}

	/// Decide whether `certificate_pem` is trusted for `host` under the
	/// current policy.
	///
	/// Every failure emits exactly one ERROR-level log line naming the
	/// host before it is returned.
	pub async fn verify(&self, host: &str, certificate_pem: &str) -> Result<(), PinningError> {
		self
			.verify_inner(host, certificate_pem)
			.await
			.inspect_err(|err| {
				error!(%host, "pinning verification failed: {err}");
			})
	}

	async fn verify_inner(&self, host: &str, certificate_pem: &str) -> Result<(), PinningError> {
		let Some(mode) = self.store.mode().await else {
			return Err(PinningError::InvalidProjectConfig(
				"setup has not been called".to_string(),
			));
		};
		let policy = self.store.get_policy().await.map_err(|err| match err {
			err @ (PinningError::ConfigurationValidationFailed(_)
			| PinningError::InvalidProjectConfig(_)
			| PinningError::ErrorFetchingPinningInfo(_)) => err,
			other => PinningError::ErrorFetchingPinningInfo(other.to_string()),
		})?;

		let canonical = pinning::normalize_host(host);
		let der = pinning::der_from_pem(certificate_pem)?;

		let mut entries = policy.entries_for(&canonical);
		let Some(entry) = entries.next() else {
			return match mode {
				PinningMode::Strict => Err(PinningError::DomainNotRegistered),
				PinningMode::Permissive => {
					info!(host = %canonical, "host not registered, allowed by permissive mode");
					Ok(())
				},
			};
		};
		if entries.next().is_some() {
			return Err(PinningError::InvalidProjectConfig(format!(
				"multiple policy entries for domain {canonical}"
			)));
		}
		pinning::match_pins(&der, entry, unix_now())
	}

	/// Clear credentials, cache and in-flight fetch. Test hook.
	pub async fn reset(&self) {
		self.store.reset().await;
	}

	/// Adjust the process-wide log severity.
	pub fn set_log_level(&self, level: LogLevel) {
		telemetry::set_level(level);
	}
}

impl Default for Engine {
	fn default() -> Self {
		Self::new()
	}
}
