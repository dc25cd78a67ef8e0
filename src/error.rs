#[derive(Debug, thiserror::Error, thiserror_ext::Construct)]
#[non_exhaustive]
pub enum Error {
	#[error("failed to encrypt plaintext")]
	Encryption,

	#[error("invalid length: expected {expected} bytes, got {actual}")]
	InvalidLength { expected: usize, actual: usize },

	#[error("invalid {encoding} text: {cause}")]
	InvalidEncoding { encoding: String, cause: String },

	#[error("invalid key: {0}")]
	InvalidKey(String),

	#[error("Invalid Token")]
	InvalidToken,

	#[error("envelope decoding failure on {element}: {cause}")]
	Decoding { element: String, cause: String },

	#[error("encapsulated key {index} uses algorithm {actual}, but the box uses {expected}")]
	AlgorithmMismatch {
		index: usize,
		expected: String,
		actual: String,
	},

	#[error("encapsulated key {index} was not encrypted by the box's sender")]
	SenderKeyMismatch { index: usize },

	#[error("unsupported algorithm: {0}")]
	UnsupportedAlgorithm(String),

	#[error("unsupported operation: {0}")]
	UnsupportedOperation(String),

	#[error("CAN'T HAPPEN: {0}")]
	Insanity(String),
}
