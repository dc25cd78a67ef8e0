//! Containers for secret bytes.
//!
//! Everything secret in this crate (keys, key seeds, shared secrets) lives in one of these
//! containers.  The bytes are kept on the heap inside a [`secrecy::SecretBox`], which overwrites
//! them with zeroes when the container is dropped.  If you need the memory gone *now*, rather than
//! when the owner goes out of scope, call `wipe()`; any later attempt to read the container is a
//! bug, and is reported as [`Error::Insanity`].
//!
//! None of these types implement `serde::Serialize` or `Display`, and their `Debug` output is
//! redacted.  Getting the bytes out as text requires going through
//! [`SecretMaterial::export_secret`], which is easy to spot in code review.
use rand::{RngCore as _, rng};
use secrecy::{ExposeSecret as _, SecretBox, SecretSlice};
use zeroize::Zeroizing;

use super::{Encoding, Error};

/// Values that are safe to share with the world, such as public keys and signatures.
pub trait PublicMaterial {
	fn as_bytes(&self) -> &[u8];

	fn export(&self, encoding: Encoding) -> String {
		encoding.encode(self.as_bytes())
	}
}

/// Values that must never leak by accident.
pub trait SecretMaterial {
	/// Get at the secret bytes, unless they've already been wiped.
	fn expose_bytes(&self) -> Result<&[u8], Error>;

	/// Deliberately render the secret as text.
	fn export_secret(&self, encoding: Encoding) -> Result<Zeroizing<String>, Error> {
		Ok(Zeroizing::new(encoding.encode(self.expose_bytes()?)))
	}
}

/// A secret of exactly `N` bytes.
pub struct SensitiveArray<const N: usize>(Option<SecretBox<[u8; N]>>);

impl<const N: usize> SensitiveArray<N> {
	pub const LEN: usize = N;

	#[tracing::instrument(level = "trace", name = "SensitiveArray::random")]
	pub fn random() -> Self {
		let mut bytes = Box::new([0u8; N]);
		rng().fill_bytes(&mut bytes[..]);

		bytes.into()
	}

	pub fn try_from_slice(bytes: &[u8]) -> Result<Self, Error> {
		if bytes.len() != N {
			return Err(Error::invalid_length(N, bytes.len()));
		}

		let mut buf = Box::new([0u8; N]);
		buf.copy_from_slice(bytes);

		Ok(buf.into())
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		Self::try_from_slice(&encoding.decode(text)?)
	}

	pub fn expose_secret(&self) -> Result<&[u8; N], Error> {
		self.0
			.as_ref()
			.map(|b| b.expose_secret())
			.ok_or_else(|| Error::insanity("read of a wiped secret"))
	}

	/// Zero the secret right now, rather than waiting for it to be dropped.
	pub fn wipe(&mut self) {
		// SecretBox zeroizes on drop
		self.0 = None;
	}

	pub fn is_wiped(&self) -> bool {
		self.0.is_none()
	}
}

impl<const N: usize> From<Box<[u8; N]>> for SensitiveArray<N> {
	fn from(bytes: Box<[u8; N]>) -> Self {
		Self(Some(SecretBox::new(bytes)))
	}
}

impl<const N: usize> SecretMaterial for SensitiveArray<N> {
	fn expose_bytes(&self) -> Result<&[u8], Error> {
		self.expose_secret().map(|b| &b[..])
	}
}

impl<const N: usize> std::fmt::Debug for SensitiveArray<N> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_wiped() {
			write!(f, "SensitiveArray<{N}>([WIPED])")
		} else {
			write!(f, "SensitiveArray<{N}>([REDACTED])")
		}
	}
}

/// A secret of whatever length it happens to be.
pub struct SensitiveVec(Option<SecretSlice<u8>>);

impl SensitiveVec {
	pub fn random(len: usize) -> Self {
		let mut bytes = vec![0u8; len];
		rng().fill_bytes(&mut bytes);

		bytes.into()
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		// Exact-size copy; `decoded` is zeroed on drop
		let decoded = encoding.decode(text)?;

		Ok(SensitiveVec::from(&decoded[..]))
	}

	pub fn expose_secret(&self) -> Result<&[u8], Error> {
		self.0
			.as_ref()
			.map(|b| b.expose_secret())
			.ok_or_else(|| Error::insanity("read of a wiped secret"))
	}

	pub fn len(&self) -> usize {
		self.0.as_ref().map_or(0, |b| b.expose_secret().len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn wipe(&mut self) {
		self.0 = None;
	}

	pub fn is_wiped(&self) -> bool {
		self.0.is_none()
	}
}

impl From<Vec<u8>> for SensitiveVec {
	fn from(bytes: Vec<u8>) -> Self {
		Self(Some(bytes.into()))
	}
}

impl From<&[u8]> for SensitiveVec {
	fn from(bytes: &[u8]) -> Self {
		bytes.to_vec().into()
	}
}

impl SecretMaterial for SensitiveVec {
	fn expose_bytes(&self) -> Result<&[u8], Error> {
		self.expose_secret()
	}
}

impl std::fmt::Debug for SensitiveVec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_wiped() {
			write!(f, "SensitiveVec([WIPED])")
		} else {
			write!(f, "SensitiveVec({} bytes, [REDACTED])", self.len())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_length_is_enforced() {
		let result = SensitiveArray::<32>::try_from_slice(&[0u8; 31]);
		assert!(matches!(
			result,
			Err(Error::InvalidLength {
				expected: 32,
				actual: 31
			})
		));

		assert!(SensitiveArray::<32>::try_from_slice(&[7u8; 32]).is_ok());
	}

	#[test]
	fn export_import_round_trip() {
		let secret = SensitiveArray::<32>::random();

		for encoding in [
			Encoding::Hex,
			Encoding::Base64,
			Encoding::Base64Url,
			Encoding::Base64UrlNoPadding,
		] {
			let text = secret.export_secret(encoding).unwrap();
			let imported = SensitiveArray::<32>::import(text.as_str(), encoding).unwrap();
			assert_eq!(
				secret.expose_secret().unwrap(),
				imported.expose_secret().unwrap()
			);
		}
	}

	#[test]
	fn import_of_the_wrong_length_fails() {
		let text = Encoding::Hex.encode([1u8; 16]);
		let result = SensitiveArray::<32>::import(text, Encoding::Hex);
		assert!(matches!(result, Err(Error::InvalidLength { .. })));
	}

	#[test]
	fn wiped_secrets_cannot_be_read() {
		let mut secret = SensitiveArray::<32>::random();
		assert!(secret.expose_secret().is_ok());

		secret.wipe();

		assert!(secret.is_wiped());
		assert!(matches!(secret.expose_secret(), Err(Error::Insanity(_))));
		assert!(matches!(
			secret.export_secret(Encoding::Hex),
			Err(Error::Insanity(_))
		));

		// Wiping twice is harmless
		secret.wipe();
		assert!(secret.is_wiped());
	}

	#[test]
	fn variable_length_secrets() {
		let mut secret = SensitiveVec::from(&b"hunter2"[..]);
		assert_eq!(7, secret.len());
		assert_eq!(b"hunter2", secret.expose_secret().unwrap());

		let text = secret.export_secret(Encoding::Base64).unwrap();
		let imported = SensitiveVec::import(text.as_str(), Encoding::Base64).unwrap();
		assert_eq!(b"hunter2", imported.expose_secret().unwrap());

		secret.wipe();
		assert!(secret.is_empty());
		assert!(matches!(secret.expose_bytes(), Err(Error::Insanity(_))));
	}

	#[test]
	fn variable_length_import_keeps_exactly_the_decoded_bytes() {
		for len in [0usize, 1, 2, 5, 31, 33, 100] {
			let bytes: Vec<u8> = (0..len).map(|i| i as u8).collect();

			for encoding in [
				Encoding::Hex,
				Encoding::Base64,
				Encoding::Base64Url,
				Encoding::Base64UrlNoPadding,
			] {
				let imported = SensitiveVec::import(encoding.encode(&bytes), encoding).unwrap();
				assert_eq!(len, imported.len(), "{encoding:?} / {len}");
				assert_eq!(&bytes[..], imported.expose_secret().unwrap());
			}
		}
	}

	#[test]
	fn debug_output_is_redacted() {
		let secret = SensitiveArray::<4>::try_from_slice(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
		let debug = format!("{secret:?}");
		assert!(!debug.contains("deadbeef"));
		assert!(debug.contains("REDACTED"));

		let secret = SensitiveVec::random(8);
		assert!(format!("{secret:?}").contains("REDACTED"));
	}
}
