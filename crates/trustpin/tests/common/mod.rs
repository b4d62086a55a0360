// Shared helpers: a deterministic signing identity, JWS construction and
// freshly minted leaf certificates.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use serde_json::json;
use sha2::{Digest, Sha256, Sha512};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ORG: &str = "test-org";
pub const PROJECT: &str = "test-project";

/// Deterministic P-256 key pair used to sign test policies.
pub fn signing_key() -> SigningKey {
	SigningKey::from_slice(&[0x42; 32]).expect("static scalar is a valid key")
}

/// The signing key's public half, as the engine expects it: base64 of the
/// SubjectPublicKeyInfo DER.
pub fn public_key_b64() -> String {
	let spki = signing_key()
		.verifying_key()
		.to_public_key_der()
		.expect("spki encodes");
	STANDARD.encode(spki.as_bytes())
}

pub fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap()
		.as_secs()
}

/// Compact JWS over `payload`, signed with the shared test key.
pub fn sign_envelope(payload: &serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"JWT"}"#);
	let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
	let signing_input = format!("{header}.{body}");
	let signature: Signature = signing_key().sign(signing_input.as_bytes());
	let sig = URL_SAFE_NO_PAD.encode(signature.to_bytes());
	format!("{signing_input}.{sig}")
}

/// Policy payload with a single domain entry.
pub fn policy_payload(domain: &str, pins: serde_json::Value) -> serde_json::Value {
	json!({
		"version": 1,
		"iat": unix_now(),
		"nbf": unix_now(),
		"domains": [{
			"domain": domain,
			"last_updated": unix_now(),
			"pins": pins,
		}],
	})
}

pub fn sha256_pin(der: &[u8]) -> String {
	STANDARD.encode(Sha256::digest(der))
}

pub fn sha512_pin(der: &[u8]) -> String {
	STANDARD.encode(Sha512::digest(der))
}

/// A freshly minted self-signed leaf certificate: `(der, pem)`.
pub fn leaf_certificate(host: &str) -> (Vec<u8>, String) {
	let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
	let cert = rcgen::CertificateParams::new(vec![host.to_string()])
		.unwrap()
		.self_signed(&key)
		.unwrap();
	(cert.der().to_vec(), cert.pem())
}

/// Serve `token` at the path the store fetches for [`ORG`]/[`PROJECT`].
pub async fn serve_policy(server: &MockServer, token: String) {
	Mock::given(method("GET"))
		.and(path(format!("/{ORG}/{PROJECT}/jws.b64")))
		.respond_with(ResponseTemplate::new(200).set_body_string(token))
		.mount(server)
		.await;
}
