//! ECDSA P-256 verification of the policy envelope signature.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

use super::EnvelopeError;

/// Raw wire signature length: 32-byte `r` followed by 32-byte `s`.
pub const RAW_SIGNATURE_LEN: usize = 64;

/// SEC1 point lengths accepted by the legacy key fallback.
const SEC1_POINT_LENS: [usize; 2] = [65, 33];

/// Parse an ECDSA P-256 public key.
///
/// SubjectPublicKeyInfo DER is the supported form. For legacy key material
/// that is not a well-formed SPKI document, the trailing SEC1 point bytes
/// (uncompressed or compressed) are tried as a fallback.
pub fn parse_public_key(der: &[u8]) -> Result<VerifyingKey, EnvelopeError> {
	if let Ok(key) = VerifyingKey::from_public_key_der(der) {
		return Ok(key);
	}
	for len in SEC1_POINT_LENS {
		if der.len() >= len
			&& let Ok(key) = VerifyingKey::from_sec1_bytes(&der[der.len() - len..])
		{
			return Ok(key);
		}
	}
	Err(EnvelopeError::BadPublicKey)
}

/// Verify a raw `r‖s` signature over `message`.
///
/// The wire format is the 64-byte fixed encoding; it is re-encoded as an
/// ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }` (minimal integers, zero
/// byte prefixed when the high bit is set) before verification.
pub fn verify(
	key: &VerifyingKey,
	message: &[u8],
	signature_raw: &[u8],
) -> Result<(), EnvelopeError> {
	if signature_raw.len() != RAW_SIGNATURE_LEN {
		return Err(EnvelopeError::SignatureLength(signature_raw.len()));
	}
	let signature =
		Signature::from_slice(signature_raw).map_err(|_| EnvelopeError::BadSignature)?;
	let der = signature.to_der();
	key.verify(message, &der)
		.map_err(|_| EnvelopeError::BadSignature)
}

#[cfg(test)]
mod tests {
	use p256::ecdsa::SigningKey;
	use p256::ecdsa::signature::Signer;
	use p256::pkcs8::EncodePublicKey;

	use super::*;

	fn test_key() -> SigningKey {
		SigningKey::from_slice(&[0x42; 32]).unwrap()
	}

	fn raw_signature(key: &SigningKey, message: &[u8]) -> Vec<u8> {
		let signature: Signature = key.sign(message);
		signature.to_bytes().to_vec()
	}

	#[test]
	fn verifies_raw_signature() {
		let key = test_key();
		let message = b"header.payload";
		let raw = raw_signature(&key, message);
		assert_eq!(raw.len(), RAW_SIGNATURE_LEN);
		verify(key.verifying_key(), message, &raw).unwrap();
	}

	#[test]
	fn rejects_tampered_message() {
		let key = test_key();
		let raw = raw_signature(&key, b"header.payload");
		assert!(matches!(
			verify(key.verifying_key(), b"header.payloae", &raw),
			Err(EnvelopeError::BadSignature)
		));
	}

	#[test]
	fn rejects_flipped_signature_bit() {
		let key = test_key();
		let message = b"header.payload";
		let mut raw = raw_signature(&key, message);
		raw[17] ^= 0x01;
		assert!(verify(key.verifying_key(), message, &raw).is_err());
	}

	#[test]
	fn rejects_wrong_length() {
		let key = test_key();
		assert!(matches!(
			verify(key.verifying_key(), b"m", &[0u8; 63]),
			Err(EnvelopeError::SignatureLength(63))
		));
		assert!(matches!(
			verify(key.verifying_key(), b"m", &[0u8; 72]),
			Err(EnvelopeError::SignatureLength(72))
		));
	}

	#[test]
	fn parses_spki_der() {
		let key = test_key();
		let spki = key.verifying_key().to_public_key_der().unwrap();
		let parsed = parse_public_key(spki.as_bytes()).unwrap();
		assert_eq!(&parsed, key.verifying_key());
	}

	#[test]
	fn falls_back_to_trailing_sec1_point() {
		let key = test_key();
		let spki = key.verifying_key().to_public_key_der().unwrap();
		// corrupt the SPKI framing but keep the trailing point intact
		let mut der = spki.as_bytes().to_vec();
		der[0] = 0xff;
		let parsed = parse_public_key(&der).unwrap();
		assert_eq!(&parsed, key.verifying_key());
	}

	#[test]
	fn rejects_garbage_key() {
		assert!(matches!(
			parse_public_key(&[0u8; 16]),
			Err(EnvelopeError::BadPublicKey)
		));
	}
}
