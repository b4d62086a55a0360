//! Signed policy acquisition: fetch, signature check, time-bounded cache
//! and single-flight coordination.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use p256::ecdsa::VerifyingKey;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::PinningError;
use crate::jws::verify::{parse_public_key, verify};
use crate::jws::{EXPECTED_ALG, EnvelopeError, SignedEnvelope};
use crate::policy::{PinningMode, Policy, unix_now};

/// Default CDN serving signed pinning policies.
pub const DEFAULT_CDN_BASE: &str = "https://cdn.trustpin.cloud";

/// How long a fetched policy is served without revalidation.
pub const CACHE_TTL: Duration = Duration::from_secs(600);

/// Oldest cache entry usable as a last resort when every fetch attempt
/// fails.
pub const STALE_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Total fetch attempts per refresh, transient failures only.
pub const MAX_ATTEMPTS: u32 = 3;

/// Per-attempt HTTP timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the first retry; doubles per attempt.
const RETRY_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Credentials configured through `setup`. The public key is parsed once,
/// eagerly, so later fetches cannot fail on key material.
#[derive(Clone)]
pub struct Credentials {
	pub organization_id: String,
	pub project_id: String,
	pub public_key: VerifyingKey,
	pub mode: PinningMode,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("organization_id", &self.organization_id)
			.field("project_id", &self.project_id)
			.field("mode", &self.mode)
			.finish_non_exhaustive()
	}
}

#[derive(Clone)]
struct CacheEntry {
	policy: Arc<Policy>,
	fetched_at: Instant,
}

type PolicyFuture = Shared<BoxFuture<'static, Result<Arc<Policy>, PinningError>>>;

#[derive(Default)]
struct StoreState {
	credentials: Option<Credentials>,
	cache: Option<CacheEntry>,
	in_flight: Option<PolicyFuture>,
	/// Bumped whenever credentials change so a fetch started under old
	/// credentials can never publish into the new state.
	epoch: u64,
}

/// Owns the policy cache and the single in-flight fetch. All mutable state
/// sits behind one async mutex; nothing holds it across network awaits.
pub struct ConfigStore {
	state: Arc<Mutex<StoreState>>,
	client: reqwest::Client,
	base_url: String,
	cache_ttl: Duration,
	stale_max_age: Duration,
	retry_backoff: Duration,
}

impl ConfigStore {
	pub fn new() -> Self {
		Self::with_base_url(DEFAULT_CDN_BASE)
	}

	/// Store fetching from a non-default CDN base; used by tests and
	/// self-hosted deployments.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		// Ephemeral connection semantics: no cookies, no response cache,
		// no idle connections kept around between fetches.
		let client = reqwest::Client::builder()
			.timeout(HTTP_TIMEOUT)
			.pool_max_idle_per_host(0)
			.build()
			.expect("http client must be valid");
		ConfigStore {
			state: Arc::new(Mutex::new(StoreState::default())),
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			cache_ttl: CACHE_TTL,
			stale_max_age: STALE_MAX_AGE,
			retry_backoff: RETRY_INITIAL_BACKOFF,
		}
	}

	/// Validate and install credentials, dropping any cached policy and
	/// in-flight fetch tied to the previous ones.
	pub async fn set_credentials(
		&self,
		organization_id: &str,
		project_id: &str,
		public_key_b64: &str,
		mode: PinningMode,
	) -> Result<(), PinningError> {
		let organization_id = organization_id.trim();
		let project_id = project_id.trim();
		let public_key_b64 = public_key_b64.trim();
		if organization_id.is_empty() || project_id.is_empty() || public_key_b64.is_empty() {
			return Err(PinningError::InvalidProjectConfig(
				"organization id, project id and public key must be non-empty".to_string(),
			));
		}
		let key_der = STANDARD.decode(public_key_b64).map_err(|e| {
			PinningError::InvalidProjectConfig(format!("public key is not valid base64: {e}"))
		})?;
		let public_key = parse_public_key(&key_der).map_err(|_| {
			PinningError::InvalidProjectConfig(
				"public key is not a valid ECDSA P-256 key".to_string(),
			)
		})?;

		let mut state = self.state.lock().await;
		state.credentials = Some(Credentials {
			organization_id: organization_id.to_string(),
			project_id: project_id.to_string(),
			public_key,
			mode,
		});
		state.cache = None;
		state.in_flight = None;
		state.epoch += 1;
		Ok(())
	}

	/// The configured mode, if credentials are set.
	pub async fn mode(&self) -> Option<PinningMode> {
		self.state.lock().await.credentials.as_ref().map(|c| c.mode)
	}

	/// Clear credentials, cache and in-flight fetch. Test hook.
	pub async fn reset(&self) {
		let mut state = self.state.lock().await;
		state.credentials = None;
		state.cache = None;
		state.in_flight = None;
		state.epoch += 1;
	}

	/// Return the current policy, fetching it if the cache is missing or
	/// past its TTL. Concurrent callers share a single fetch.
	pub async fn get_policy(&self) -> Result<Arc<Policy>, PinningError> {
		let fetch = {
			let mut state = self.state.lock().await;
			let Some(credentials) = state.credentials.clone() else {
				return Err(PinningError::InvalidProjectConfig(
					"setup has not been called".to_string(),
				));
			};
			if let Some(cache) = &state.cache
				&& cache.fetched_at.elapsed() < self.cache_ttl
			{
				return Ok(cache.policy.clone());
			}
			match &state.in_flight {
				Some(fetch) => fetch.clone(),
				None => {
					let fetch = self.spawn_fetch(credentials, state.epoch);
					state.in_flight = Some(fetch.clone());
					fetch
				},
			}
		};
		fetch.await
	}

	/// Run the fetch in its own task so a cancelled waiter never cancels
	/// the fetch out from under the remaining waiters.
	fn spawn_fetch(&self, credentials: Credentials, epoch: u64) -> PolicyFuture {
		let state = self.state.clone();
		let client = self.client.clone();
		let stale_max_age = self.stale_max_age;
		let retry_backoff = self.retry_backoff;
		let url = format!(
			"{}/{}/{}/jws.b64",
			self.base_url, credentials.organization_id, credentials.project_id
		);
		let task = tokio::spawn(async move {
			let outcome =
				fetch_policy(&client, &url, &credentials.public_key, retry_backoff).await;
			let mut state = state.lock().await;
			// Credentials may have changed while the fetch ran; the result
			// still answers the waiters but must not touch the new state.
			let current = state.epoch == epoch;
			let result = match outcome {
				Ok(policy) => {
					let policy = Arc::new(policy);
					if current {
						state.cache = Some(CacheEntry {
							policy: policy.clone(),
							fetched_at: Instant::now(),
						});
					}
					Ok(policy)
				},
				Err(FetchFailure::Fatal(err)) => Err(err),
				Err(FetchFailure::Transient(reason)) => match &state.cache {
					// An entry past its TTL is still a usable last resort.
					Some(cache) if current && cache.fetched_at.elapsed() <= stale_max_age => {
						info!("policy refresh failed ({reason}), serving stale cache");
						Ok(cache.policy.clone())
					},
					_ => Err(PinningError::ErrorFetchingPinningInfo(reason)),
				},
			};
			if current {
				state.in_flight = None;
			}
			result
		});
		async move {
			match task.await {
				Ok(result) => result,
				Err(e) => Err(PinningError::ErrorFetchingPinningInfo(format!(
					"policy fetch task failed: {e}"
				))),
			}
		}
		.boxed()
		.shared()
	}
}

impl Default for ConfigStore {
	fn default() -> Self {
		Self::new()
	}
}

enum FetchFailure {
	/// Network-shaped failure; retried, then eligible for stale fallback.
	Transient(String),
	/// Integrity or structural failure; never retried, never masked by a
	/// stale cache entry.
	Fatal(PinningError),
}

async fn fetch_policy(
	client: &reqwest::Client,
	url: &str,
	public_key: &VerifyingKey,
	initial_backoff: Duration,
) -> Result<Policy, FetchFailure> {
	let mut backoff = initial_backoff;
	let mut last_error = String::new();
	for attempt in 1..=MAX_ATTEMPTS {
		if attempt > 1 {
			tokio::time::sleep(backoff).await;
			backoff *= 2;
		}
		match fetch_attempt(client, url, public_key).await {
			Ok(policy) => {
				debug!(%url, attempt, "fetched pinning policy");
				return Ok(policy);
			},
			Err(FetchFailure::Transient(reason)) => {
				warn!(%url, attempt, "policy fetch attempt failed: {reason}");
				last_error = reason;
			},
			Err(fatal) => return Err(fatal),
		}
	}
	Err(FetchFailure::Transient(last_error))
}

async fn fetch_attempt(
	client: &reqwest::Client,
	url: &str,
	public_key: &VerifyingKey,
) -> Result<Policy, FetchFailure> {
	let response = client
		.get(url)
		.send()
		.await
		.and_then(|r| r.error_for_status())
		.map_err(|e| FetchFailure::Transient(e.to_string()))?;
	let body = response
		.text()
		.await
		.map_err(|e| FetchFailure::Transient(e.to_string()))?;
	decode_envelope(&body, public_key).map_err(|e| FetchFailure::Fatal(e.into()))
}

/// Decode and signature-check a compact JWS body into a policy.
fn decode_envelope(token: &str, public_key: &VerifyingKey) -> Result<Policy, EnvelopeError> {
	let envelope = SignedEnvelope::parse(token)?;
	let header = envelope.header()?;
	if header.alg != EXPECTED_ALG {
		return Err(EnvelopeError::UnsupportedAlgorithm(header.alg));
	}
	let signature = envelope.signature()?;
	verify(public_key, &envelope.signing_input(), &signature)?;
	let policy = envelope.payload()?;
	// iat/nbf/exp are informational; only per-pin expiry gates matching
	if let Some(exp) = policy.exp
		&& exp < unix_now()
	{
		debug!("accepted pinning policy whose exp is in the past");
	}
	Ok(policy)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
