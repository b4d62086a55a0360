//! Bridge between a TLS stack's server-trust callback and the engine.
//!
//! The host TLS stack is expected to finish its default chain, time and
//! hostname validation before handing the leaf here; pinning is a second
//! gate on top of that, not a replacement for it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rustls_pki_types::CertificateDer;

use crate::engine::Engine;
use crate::errors::PinningError;

/// Body line width of an RFC 7468 PEM document.
const PEM_LINE_WIDTH: usize = 64;

/// Wrap leaf certificate DER in PEM markers with 64-character body lines.
pub fn pem_from_der(der: &[u8]) -> String {
	let body = STANDARD.encode(der);
	let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
	pem.push_str("-----BEGIN CERTIFICATE-----\n");
	for chunk in body.as_bytes().chunks(PEM_LINE_WIDTH) {
		// base64 output is ASCII, chunks always fall on char boundaries
		pem.push_str(std::str::from_utf8(chunk).unwrap_or_default());
		pem.push('\n');
	}
	pem.push_str("-----END CERTIFICATE-----\n");
	pem
}

impl Engine {
	/// Verify a hostname against a leaf certificate already in DER form,
	/// as handed over by a TLS stack.
	pub async fn verify_leaf_der(
		&self,
		host: &str,
		leaf: &CertificateDer<'_>,
	) -> Result<(), PinningError> {
		self.verify(host, &pem_from_der(leaf.as_ref())).await
	}
}
