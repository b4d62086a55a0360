/// Classified outcome of a pinning operation.
///
/// This is a closed set: every failure the engine can produce maps to
/// exactly one of these kinds. Reason payloads are diagnostic only and do
/// not participate in classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinningError {
	/// Credentials are missing, malformed, or the engine was used before
	/// `setup`. Also raised when the policy carries multiple entries for a
	/// single domain.
	#[error("invalid project configuration: {0}")]
	InvalidProjectConfig(String),

	/// Every fetch attempt failed and no usable cache entry remained.
	/// The only kind worth retrying.
	#[error("unable to fetch pinning information: {0}")]
	ErrorFetchingPinningInfo(String),

	/// The signed policy did not pass integrity checks: malformed envelope,
	/// bad signature, or invalid payload.
	#[error("pinning configuration validation failed: {0}")]
	ConfigurationValidationFailed(String),

	/// The presented certificate could not be reduced to leaf DER bytes.
	#[error("invalid server certificate: {0}")]
	InvalidServerCert(String),

	/// Strict mode and the host has no entry in the policy.
	#[error("domain is not registered in the pinning policy")]
	DomainNotRegistered,

	/// At least one unexpired pin exists for the host, but none matched.
	/// Treat as a potential man-in-the-middle.
	#[error("no configured pin matches the server certificate")]
	PinsMismatch,

	/// Every pin for the host is expired. A maintenance problem, not an
	/// attack signal.
	#[error("all pins for the domain are expired")]
	AllPinsExpired,
}
