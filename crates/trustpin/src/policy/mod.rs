//! Typed model of the signed pinning policy payload.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Engine-wide behavior for hosts absent from the pinning policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinningMode {
	/// Unregistered hosts fail verification.
	#[default]
	Strict,
	/// Unregistered hosts pass verification.
	Permissive,
}

impl FromStr for PinningMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"strict" => Ok(PinningMode::Strict),
			"permissive" => Ok(PinningMode::Permissive),
			other => Err(format!("unknown pinning mode {other:?}")),
		}
	}
}

/// Hash algorithm a pin was computed with.
///
/// Policies may carry algorithms this build does not know; they deserialize
/// as [`PinAlgorithm::Unknown`] so the matcher can skip them instead of
/// rejecting the whole policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PinAlgorithm {
	Sha256,
	Sha512,
	Unknown(String),
}

impl From<String> for PinAlgorithm {
	fn from(s: String) -> Self {
		match s.as_str() {
			"sha256" => PinAlgorithm::Sha256,
			"sha512" => PinAlgorithm::Sha512,
			_ => PinAlgorithm::Unknown(s),
		}
	}
}

impl From<PinAlgorithm> for String {
	fn from(alg: PinAlgorithm) -> Self {
		alg.to_string()
	}
}

impl fmt::Display for PinAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PinAlgorithm::Sha256 => write!(f, "sha256"),
			PinAlgorithm::Sha512 => write!(f, "sha512"),
			PinAlgorithm::Unknown(other) => write!(f, "{other}"),
		}
	}
}

/// A single certificate pin: the base64 hash of a legitimate leaf
/// certificate's full DER under `alg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
	/// Standard (padded) base64 of the certificate hash.
	pub pin: String,
	pub alg: PinAlgorithm,
	/// Unix seconds after which this pin stops matching.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<u64>,
}

impl Pin {
	/// A pin is expired iff `expires_at` is present and strictly in the past.
	pub fn is_expired(&self, now: u64) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at < now)
	}
}

/// Pins registered for one exact domain. `domain` is stored lowercase with
/// no scheme or path; at most one entry per domain is legal in a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
	pub domain: String,
	pub last_updated: u64,
	pub pins: Vec<Pin>,
}

/// Decoded payload of the signed policy envelope.
///
/// `iat`/`nbf`/`exp` are informational; the signature is what gates trust
/// and only per-pin `expires_at` gates matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
	pub version: u32,
	pub domains: Vec<DomainEntry>,
	pub iat: u64,
	pub nbf: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<u64>,
}

impl Policy {
	/// Entries matching `domain` exactly. The policy invariant allows at
	/// most one; callers surface duplicates as a configuration error.
	pub fn entries_for<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a DomainEntry> {
		self.domains.iter().filter(move |entry| entry.domain == domain)
	}
}

/// Current wall time as unix seconds.
pub(crate) fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
