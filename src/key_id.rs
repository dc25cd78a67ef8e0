use super::{Error, HashAlgorithm, PublicMaterial as _, SignaturePublicKey};

type Kid = [u8; 32];

/// A short, public name for a [`SignaturePublicKey`]: the SHA-256 of its bytes.
///
/// Comparison is constant-time, because the other side of a comparison is usually an ID that
/// arrived from outside.
#[allow(clippy::derived_hash_with_manual_eq)] // k1 == k2 => hash(k1) == hash(k2) will hold
#[derive(Clone, Copy, Debug, Hash)]
#[repr(transparent)]
pub struct KeyId(Kid);

impl KeyId {
	pub fn as_bytes(&self) -> &Kid {
		&self.0
	}

	/// Parse the hex form produced by `Display`.
	pub fn from_hex(text: impl AsRef<[u8]>) -> Result<Self, Error> {
		let mut kid: Kid = Default::default();

		hex::decode_to_slice(text.as_ref(), &mut kid)
			.map_err(|e| Error::invalid_encoding("hex", e.to_string()))?;

		Ok(Self(kid))
	}
}

impl PartialEq for KeyId {
	fn eq(&self, other: &Self) -> bool {
		constant_time_eq::constant_time_eq_n(&self.0, &other.0)
	}
}

impl Eq for KeyId {}

impl std::fmt::Display for KeyId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		for b in &self.0 {
			f.write_fmt(format_args!("{b:02x}"))?;
		}

		Ok(())
	}
}

impl std::str::FromStr for KeyId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		Self::from_hex(s)
	}
}

/// Get the ID of a signature key
#[tracing::instrument(level = "trace")]
pub(super) fn key_id(key: &SignaturePublicKey) -> KeyId {
	let mut kid: Kid = Default::default();
	kid.copy_from_slice(HashAlgorithm::Sha256.digest(key.as_bytes()).as_ref());

	KeyId(kid)
}
