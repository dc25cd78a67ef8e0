//! Public/private key pairs, for key exchange (X25519) and signatures (Ed25519).
//!
//! The public halves are ordinary values: they compare, hash, print, and (de)serialize as
//! base64url text.  The private halves live in [`SensitiveArray`]s and do none of those things.
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{RngCore as _, rng};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

use super::{Encoding, Error, PublicMaterial, SecretMaterial, SensitiveArray};

macro_rules! public_key_serde {
	($ty:ident) => {
		impl serde::Serialize for $ty {
			fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
				s.serialize_str(&self.export(Encoding::Base64Url))
			}
		}

		impl<'de> serde::Deserialize<'de> for $ty {
			fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
				let text = <std::borrow::Cow<'de, str>>::deserialize(d)?;
				Self::import(&*text, Encoding::Base64Url).map_err(serde::de::Error::custom)
			}
		}

		impl std::fmt::Display for $ty {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.export(Encoding::Base64Url))
			}
		}

		impl std::fmt::Debug for $ty {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}({self})", stringify!($ty))
			}
		}
	};
}

/// The public half of an [`EncryptionKeyPair`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionPublicKey([u8; 32]);

impl EncryptionPublicKey {
	pub const SIZE: usize = 32;

	pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
		bytes
			.try_into()
			.map(Self)
			.map_err(|_| Error::invalid_length(Self::SIZE, bytes.len()))
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		Self::from_slice(&encoding.decode(text)?)
	}

	pub fn to_bytes(&self) -> [u8; 32] {
		self.0
	}

	/// Constant-time equality, for when one side of the comparison came from outside.
	pub fn ct_eq(&self, other: &Self) -> bool {
		constant_time_eq::constant_time_eq_n(&self.0, &other.0)
	}

	pub(crate) fn dalek(&self) -> PublicKey {
		PublicKey::from(self.0)
	}
}

impl PublicMaterial for EncryptionPublicKey {
	fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl From<PublicKey> for EncryptionPublicKey {
	fn from(key: PublicKey) -> Self {
		Self(key.to_bytes())
	}
}

public_key_serde!(EncryptionPublicKey);

/// An X25519 key pair, for use with the [`AsymmetricEngine`](super::AsymmetricEngine).
pub struct EncryptionKeyPair {
	secret: SensitiveArray<32>,
	public: EncryptionPublicKey,
}

impl EncryptionKeyPair {
	#[tracing::instrument(level = "debug", name = "EncryptionKeyPair::generate")]
	pub fn generate() -> Self {
		let secret = random_secret();
		let public = public_x25519(&secret);

		Self {
			secret: secret.into(),
			public,
		}
	}

	/// Rebuild a key pair from its secret half.
	pub fn from_secret(secret: SensitiveArray<32>) -> Result<Self, Error> {
		let public = public_x25519(secret.expose_secret()?);

		Ok(Self { secret, public })
	}

	pub fn public(&self) -> &EncryptionPublicKey {
		&self.public
	}

	pub fn secret(&self) -> &SensitiveArray<32> {
		&self.secret
	}

	/// X25519 with `their_public`; low-order points are refused.
	pub(crate) fn diffie_hellman(
		&self,
		their_public: &EncryptionPublicKey,
	) -> Result<SharedSecret, Error> {
		let secret = StaticSecret::from(*self.secret.expose_secret()?);
		let shared = secret.diffie_hellman(&their_public.dalek());

		if !shared.was_contributory() {
			return Err(Error::invalid_key("public key is a low-order point"));
		}

		Ok(shared)
	}
}

impl SecretMaterial for EncryptionKeyPair {
	fn expose_bytes(&self) -> Result<&[u8], Error> {
		self.secret.expose_bytes()
	}
}

impl std::fmt::Debug for EncryptionKeyPair {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		f.debug_struct("EncryptionKeyPair")
			.field("public", &self.public)
			.finish()
	}
}

fn random_secret() -> Box<[u8; 32]> {
	let mut bytes = Box::new([0u8; 32]);
	rng().fill_bytes(&mut bytes[..]);
	bytes
}

fn public_x25519(secret: &[u8; 32]) -> EncryptionPublicKey {
	let secret = StaticSecret::from(*secret);
	PublicKey::from(&secret).into()
}

/// The public half of a [`SignatureKeyPair`]; always a valid Ed25519 point.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignaturePublicKey([u8; 32]);

impl SignaturePublicKey {
	pub const SIZE: usize = 32;

	pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
		let bytes: [u8; 32] = bytes
			.try_into()
			.map_err(|_| Error::invalid_length(Self::SIZE, bytes.len()))?;

		VerifyingKey::from_bytes(&bytes).map_err(|e| Error::invalid_key(e.to_string()))?;

		Ok(Self(bytes))
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		Self::from_slice(&encoding.decode(text)?)
	}

	pub fn to_bytes(&self) -> [u8; 32] {
		self.0
	}

	pub(crate) fn dalek(&self) -> Result<VerifyingKey, Error> {
		VerifyingKey::from_bytes(&self.0).map_err(|e| Error::insanity(e.to_string()))
	}
}

impl PublicMaterial for SignaturePublicKey {
	fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

public_key_serde!(SignaturePublicKey);

/// An Ed25519 key pair.  The secret half is the 32 byte seed.
pub struct SignatureKeyPair {
	secret: SensitiveArray<32>,
	public: SignaturePublicKey,
}

impl SignatureKeyPair {
	#[tracing::instrument(level = "debug", name = "SignatureKeyPair::generate")]
	pub fn generate() -> Self {
		let seed = random_secret();
		let public = public_ed25519(&seed);

		Self {
			secret: seed.into(),
			public,
		}
	}

	pub fn from_secret(secret: SensitiveArray<32>) -> Result<Self, Error> {
		let public = public_ed25519(secret.expose_secret()?);

		Ok(Self { secret, public })
	}

	pub fn public(&self) -> &SignaturePublicKey {
		&self.public
	}

	pub fn secret(&self) -> &SensitiveArray<32> {
		&self.secret
	}

	pub(crate) fn signing_key(&self) -> Result<SigningKey, Error> {
		Ok(SigningKey::from_bytes(self.secret.expose_secret()?))
	}
}

impl SecretMaterial for SignatureKeyPair {
	fn expose_bytes(&self) -> Result<&[u8], Error> {
		self.secret.expose_bytes()
	}
}

impl std::fmt::Debug for SignatureKeyPair {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		f.debug_struct("SignatureKeyPair")
			.field("public", &self.public)
			.finish()
	}
}

fn public_ed25519(seed: &[u8; 32]) -> SignaturePublicKey {
	SignaturePublicKey(SigningKey::from_bytes(seed).verifying_key().to_bytes())
}

/// An Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
	pub const SIZE: usize = 64;

	pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
		bytes
			.try_into()
			.map(Self)
			.map_err(|_| Error::invalid_length(Self::SIZE, bytes.len()))
	}

	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		Self::from_slice(&encoding.decode(text)?)
	}

	pub fn to_bytes(&self) -> [u8; 64] {
		self.0
	}
}

impl From<ed25519_dalek::Signature> for Signature {
	fn from(sig: ed25519_dalek::Signature) -> Self {
		Self(sig.to_bytes())
	}
}

impl PublicMaterial for Signature {
	fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl AsRef<[u8]> for Signature {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

public_key_serde!(Signature);
