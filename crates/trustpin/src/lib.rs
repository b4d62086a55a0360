//! Client-side certificate pinning against a remotely delivered, signed
//! pinning policy.
//!
//! A policy document listing pinned domains is fetched from a CDN as a
//! compact JWS, its ECDSA P-256 signature checked against a caller-supplied
//! public key, and cached. [`Engine::verify`] then decides whether a
//! server's leaf certificate is trusted for a hostname: the leaf DER is
//! hashed under each configured algorithm and compared against the domain's
//! unexpired pins. Pinning detects interception beyond what the host PKI
//! can; it never replaces the TLS stack's own chain validation.
//!
//! ```no_run
//! use trustpin::{Engine, PinningMode};
//!
//! # async fn run(certificate_pem: &str) -> Result<(), trustpin::PinningError> {
//! let engine = Engine::new();
//! engine
//! 	.setup("my-org", "my-project", "BASE64_SPKI_KEY", PinningMode::Strict)
//! 	.await?;
//! engine.verify("api.example.com", certificate_pem).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The free functions below operate on a process-wide default engine for
//! hosts that want a singleton; independent [`Engine`] values share nothing.

use std::sync::OnceLock;

pub mod adapter;
pub mod engine;
mod errors;
pub mod jws;
pub mod pinning;
pub mod policy;
pub mod store;
pub mod telemetry;

pub use engine::Engine;
pub use errors::PinningError;
pub use policy::PinningMode;
pub use telemetry::LogLevel;

static DEFAULT_ENGINE: OnceLock<Engine> = OnceLock::new();

/// The process-wide default engine shared by [`setup`] and [`verify`].
pub fn default_engine() -> &'static Engine {
	DEFAULT_ENGINE.get_or_init(Engine::new)
}

/// Configure the default engine. See [`Engine::setup`].
pub async fn setup(
	organization_id: &str,
	project_id: &str,
	public_key_b64: &str,
	mode: PinningMode,
) -> Result<(), PinningError> {
	default_engine()
		.setup(organization_id, project_id, public_key_b64, mode)
		.await
}

/// Verify `certificate_pem` for `host` with the default engine. See
/// [`Engine::verify`].
pub async fn verify(host: &str, certificate_pem: &str) -> Result<(), PinningError> {
	default_engine().verify(host, certificate_pem).await
}

/// Clear the default engine's credentials and cache. Test hook.
pub async fn reset() {
	default_engine().reset().await;
}

/// Adjust the process-wide log severity.
pub fn set_log_level(level: LogLevel) {
	telemetry::set_level(level);
}
