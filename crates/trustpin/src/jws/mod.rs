//! Compact JWS handling for the signed policy envelope.
//!
//! The policy ships as three base64url segments `header.payload.signature`
//! where the signature covers the ASCII bytes of `header.payload`. The
//! signature segment is a raw 64-byte `r‖s` pair, not ASN.1 DER.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::errors::PinningError;
use crate::policy::Policy;

pub mod verify;

/// Signature algorithm every policy envelope is signed with.
pub const EXPECTED_ALG: &str = "ES256";

/// Why an envelope failed to decode or validate. Surfaced to callers as
/// [`PinningError::ConfigurationValidationFailed`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
	#[error("expected 3 dot-separated segments, found {0}")]
	SegmentCount(usize),

	#[error("segment is not valid base64url: {0}")]
	Base64(#[from] base64::DecodeError),

	#[error("header is not valid JSON: {0}")]
	Header(serde_json::Error),

	#[error("unsupported signature algorithm {0:?}")]
	UnsupportedAlgorithm(String),

	#[error("payload is not a valid pinning policy: {0}")]
	Payload(serde_json::Error),

	#[error("signature must be 64 raw bytes, found {0}")]
	SignatureLength(usize),

	#[error("signature does not verify")]
	BadSignature,

	#[error("public key is not a valid ECDSA P-256 key")]
	BadPublicKey,
}

impl From<EnvelopeError> for PinningError {
	fn from(err: EnvelopeError) -> Self {
		PinningError::ConfigurationValidationFailed(err.to_string())
	}
}

/// Recognized envelope header fields. Anything else is ignored.
#[derive(Debug, Deserialize)]
pub struct JwsHeader {
	pub alg: String,
	#[serde(default)]
	pub typ: Option<String>,
}

/// The three segments of a compact JWS, still base64url-encoded.
#[derive(Debug)]
pub struct SignedEnvelope<'a> {
	header: &'a str,
	payload: &'a str,
	signature: &'a str,
}

impl<'a> SignedEnvelope<'a> {
	pub fn parse(token: &'a str) -> Result<Self, EnvelopeError> {
		let segments: Vec<&str> = token.trim().split('.').collect();
		let [header, payload, signature] = segments[..] else {
			return Err(EnvelopeError::SegmentCount(segments.len()));
		};
		Ok(SignedEnvelope {
			header,
			payload,
			signature,
		})
	}

	/// The ASCII bytes the signature covers: `header.payload`.
	pub fn signing_input(&self) -> Vec<u8> {
		format!("{}.{}", self.header, self.payload).into_bytes()
	}

	pub fn header(&self) -> Result<JwsHeader, EnvelopeError> {
		let raw = decode_segment(self.header)?;
		serde_json::from_slice(&raw).map_err(EnvelopeError::Header)
	}

	pub fn payload(&self) -> Result<Policy, EnvelopeError> {
		let raw = decode_segment(self.payload)?;
		serde_json::from_slice(&raw).map_err(EnvelopeError::Payload)
	}

	/// The raw signature bytes; length is checked by the verifier.
	pub fn signature(&self) -> Result<Vec<u8>, EnvelopeError> {
		decode_segment(self.signature)
	}
}

/// RFC 4648 §5 (base64url, no padding). A `len % 4 == 1` segment can never
/// be valid and is rejected.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, EnvelopeError> {
	Ok(URL_SAFE_NO_PAD.decode(segment.as_bytes())?)
}

#[cfg(test)]
mod tests {
	use base64::engine::general_purpose::STANDARD;

	use super::*;

	#[test]
	fn decodes_all_valid_padding_classes() {
		// len % 4 in {0, 2, 3} are the only lengths base64url can produce
		for original in [&b""[..], b"f", b"fo", b"foo", b"foob", b"fooba", b"foobar"] {
			let encoded = URL_SAFE_NO_PAD.encode(original);
			assert!(encoded.len() % 4 != 1);
			assert_eq!(decode_segment(&encoded).unwrap(), original);
		}
	}

	#[test]
	fn url_safe_alphabet_round_trips() {
		let bytes: Vec<u8> = (0u8..=255).collect();
		let encoded = URL_SAFE_NO_PAD.encode(&bytes);
		assert!(!encoded.contains('+'));
		assert!(!encoded.contains('/'));
		assert!(!encoded.contains('='));
		assert_eq!(decode_segment(&encoded).unwrap(), bytes);
		// the same bytes under the standard alphabet differ, so the engines
		// are not interchangeable
		assert_ne!(encoded, STANDARD.encode(&bytes));
	}

	#[test]
	fn rejects_impossible_length() {
		assert!(decode_segment("QQQQQ").is_err());
		assert!(decode_segment("A").is_err());
	}

	#[test]
	fn rejects_padded_or_foreign_input() {
		assert!(decode_segment("QQ==").is_err());
		assert!(decode_segment("a+b/").is_err());
	}

	#[test]
	fn splits_envelope_segments() {
		let envelope = SignedEnvelope::parse("aGVhZGVy.cGF5bG9hZA.c2ln").unwrap();
		assert_eq!(envelope.signing_input(), b"aGVhZGVy.cGF5bG9hZA");
		assert_eq!(envelope.signature().unwrap(), b"sig");
	}

	#[test]
	fn rejects_wrong_segment_count() {
		assert!(matches!(
			SignedEnvelope::parse("a.b"),
			Err(EnvelopeError::SegmentCount(2))
		));
		assert!(matches!(
			SignedEnvelope::parse("a.b.c.d"),
			Err(EnvelopeError::SegmentCount(4))
		));
	}

	#[test]
	fn parses_recognized_header() {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"JWT","extra":1}"#);
		let token = format!("{header}.e30.AA");
		let envelope = SignedEnvelope::parse(&token).unwrap();
		let header = envelope.header().unwrap();
		assert_eq!(header.alg, EXPECTED_ALG);
		assert_eq!(header.typ.as_deref(), Some("JWT"));
	}
}
