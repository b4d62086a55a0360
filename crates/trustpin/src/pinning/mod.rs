//! Leaf certificate handling: PEM extraction, hostname normalization and
//! pin matching. Everything here is CPU-only and never suspends.

use std::io::{BufReader, Cursor};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls_pemfile::Item;
use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, error};

use crate::errors::PinningError;
use crate::policy::{DomainEntry, PinAlgorithm};

/// Extract the DER bytes of the first certificate in a PEM document.
///
/// Bundles are tolerated; only the first `CERTIFICATE` block is used.
pub fn der_from_pem(pem: &str) -> Result<Vec<u8>, PinningError> {
	let mut reader = BufReader::new(Cursor::new(pem.as_bytes()));
	let parsed = rustls_pemfile::read_one(&mut reader)
		.map_err(|e| PinningError::InvalidServerCert(e.to_string()))?
		.ok_or_else(|| {
			PinningError::InvalidServerCert("no CERTIFICATE block found".to_string())
		})?;
	let Item::X509Certificate(der) = parsed else {
		return Err(PinningError::InvalidServerCert(
			"first PEM block is not a certificate".to_string(),
		));
	};
	if der.as_ref().is_empty() {
		return Err(PinningError::InvalidServerCert(
			"certificate body is empty".to_string(),
		));
	}
	Ok(der.as_ref().to_vec())
}

/// Canonicalize a hostname for policy lookup: lowercase, scheme stripped,
/// path stripped, surrounding whitespace trimmed.
///
/// The result is compared byte-exactly against policy domains; `*.` entries
/// are literal labels, not wildcards.
pub fn normalize_host(host: &str) -> String {
	let mut host = host.trim().to_ascii_lowercase();
	for scheme in ["https://", "http://"] {
		if let Some(rest) = host.strip_prefix(scheme) {
			host = rest.to_string();
			break;
		}
	}
	let host = host.split('/').next().unwrap_or_default();
	host.trim().to_string()
}

/// Match leaf DER bytes against every pin registered for a domain.
///
/// Expired pins never cause a mismatch (a maintenance problem must stay
/// distinguishable from an attack) and unknown algorithms are skipped for
/// forward compatibility.
pub fn match_pins(der: &[u8], entry: &DomainEntry, now: u64) -> Result<(), PinningError> {
	let mut any_unexpired = false;
	for pin in &entry.pins {
		if pin.is_expired(now) {
			debug!(domain = %entry.domain, "skipping expired pin");
			continue;
		}
		any_unexpired = true;
		let digest = match &pin.alg {
			PinAlgorithm::Sha256 => Sha256::digest(der).to_vec(),
			PinAlgorithm::Sha512 => Sha512::digest(der).to_vec(),
			PinAlgorithm::Unknown(other) => {
				error!(domain = %entry.domain, alg = %other, "unsupported pin algorithm");
				continue;
			},
		};
		if STANDARD.encode(&digest) == pin.pin {
			debug!(domain = %entry.domain, alg = %pin.alg, "certificate matches pin");
			return Ok(());
		}
	}
	if any_unexpired {
		Err(PinningError::PinsMismatch)
	} else {
		Err(PinningError::AllPinsExpired)
	}
}
