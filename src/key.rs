use super::{Encoding, Error, SecretMaterial, SensitiveArray};

/// Length, in bytes, of every [`SharedKey`].
pub const KEY_SIZE: usize = 32;

/// A symmetric key, used by the [`SymmetricEngine`](super::SymmetricEngine) for encrypting,
/// decrypting, signing and verifying data.
#[derive(Debug)]
pub struct SharedKey(SensitiveArray<KEY_SIZE>);

impl SharedKey {
	pub fn expose_secret(&self) -> Result<&[u8; KEY_SIZE], Error> {
		self.0.expose_secret()
	}

	pub fn try_from_slice(bytes: &[u8]) -> Result<Self, Error> {
		SensitiveArray::try_from_slice(bytes).map(Self)
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		SensitiveArray::import(text, encoding).map(Self)
	}

	pub fn wipe(&mut self) {
		self.0.wipe();
	}

	pub fn is_wiped(&self) -> bool {
		self.0.is_wiped()
	}
}

impl Clone for SharedKey {
	fn clone(&self) -> Self {
		match self.expose_secret() {
			Ok(k) => Self(Box::new(*k).into()),
			// A wiped key stays wiped
			Err(_) => {
				let mut k = Self(Box::new([0u8; KEY_SIZE]).into());
				k.wipe();
				k
			}
		}
	}
}

impl From<Box<[u8; KEY_SIZE]>> for SharedKey {
	fn from(k: Box<[u8; KEY_SIZE]>) -> Self {
		Self(k.into())
	}
}

impl From<SensitiveArray<KEY_SIZE>> for SharedKey {
	fn from(k: SensitiveArray<KEY_SIZE>) -> Self {
		Self(k)
	}
}

impl SecretMaterial for SharedKey {
	fn expose_bytes(&self) -> Result<&[u8], Error> {
		self.0.expose_bytes()
	}
}

/// Create a key suitable for use with a [`SymmetricEngine`](super::SymmetricEngine), or as the
/// root of a [`KeyChain`](super::KeyChain).
///
/// This isn't usually required in real-world usage, as you'll *usually* have your root key
/// stored somewhere out of the way.  However, for testing use, or the odd occasion when
/// encryption/decryption is very temporary, a simple function to generate a secure key
/// is useful to have laying around.
#[tracing::instrument(level = "debug")]
pub fn generate_key() -> SharedKey {
	SharedKey(SensitiveArray::random())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_keys_differ() {
		let k1 = generate_key();
		let k2 = generate_key();

		assert_ne!(k1.expose_secret().unwrap(), k2.expose_secret().unwrap());
	}

	#[test]
	fn clones_are_independent() {
		let mut k1 = generate_key();
		let k2 = k1.clone();

		assert_eq!(k1.expose_secret().unwrap(), k2.expose_secret().unwrap());

		k1.wipe();
		assert!(k1.is_wiped());
		assert!(k2.expose_secret().is_ok());
		assert!(k1.clone().is_wiped());
	}

	#[test]
	fn short_keys_are_rejected() {
		assert!(matches!(
			SharedKey::try_from_slice(b"too short"),
			Err(Error::InvalidLength {
				expected: KEY_SIZE,
				actual: 9
			})
		));
	}
}
