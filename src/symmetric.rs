use rand::{RngCore as _, rng};
use std::fmt::Debug;

use super::{Encoding, Error, PublicMaterial, SharedKey, cipher};

/// The authenticated encryption algorithms a [`SymmetricEngine`] can use.
///
/// The algorithm is recorded in every [`EncryptedMessage`], so that decryption always uses the
/// same algorithm as encryption did, regardless of what the decrypting engine would have picked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum SymmetricAlgorithm {
	/// XChaCha20 encrypt-then-MAC with keyed BLAKE2b (the v4.local PASETO construction)
	XChaCha20Blake2b,
	#[default]
	XChaCha20Poly1305,
	XSalsa20Poly1305,
	Aes256Gcm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherInfo {
	pub name: &'static str,
	pub nonce_bytes: usize,
	pub tag_bytes: usize,
	/// Whether nonces are wide enough to be picked at random for any number of messages
	pub random_nonce_safe: bool,
}

// Same order as the enum
static CIPHER_INFO: [CipherInfo; 4] = [
	CipherInfo {
		name: "xchacha20-blake2b",
		nonce_bytes: cipher::xchacha20_blake2b::NONCE_SIZE,
		tag_bytes: cipher::xchacha20_blake2b::TAG_SIZE,
		random_nonce_safe: true,
	},
	CipherInfo {
		name: "xchacha20-poly1305",
		nonce_bytes: 24,
		tag_bytes: 16,
		random_nonce_safe: true,
	},
	CipherInfo {
		name: "xsalsa20-poly1305",
		nonce_bytes: 24,
		tag_bytes: 16,
		random_nonce_safe: true,
	},
	CipherInfo {
		name: "aes-256-gcm",
		nonce_bytes: 12,
		tag_bytes: 16,
		random_nonce_safe: false,
	},
];

impl SymmetricAlgorithm {
	pub const ALL: [SymmetricAlgorithm; 4] = [
		Self::XChaCha20Blake2b,
		Self::XChaCha20Poly1305,
		Self::XSalsa20Poly1305,
		Self::Aes256Gcm,
	];

	pub fn info(self) -> &'static CipherInfo {
		&CIPHER_INFO[self as usize]
	}

	pub fn name(self) -> &'static str {
		self.info().name
	}

	pub fn nonce_bytes(self) -> usize {
		self.info().nonce_bytes
	}

	pub fn tag_bytes(self) -> usize {
		self.info().tag_bytes
	}

	/// The shortest envelope that could possibly be valid for this algorithm.
	pub fn min_envelope_bytes(self) -> usize {
		self.nonce_bytes() + self.tag_bytes()
	}

	pub fn from_name(name: &str) -> Result<Self, Error> {
		Self::ALL
			.into_iter()
			.find(|alg| alg.name() == name)
			.ok_or_else(|| Error::unsupported_algorithm(name))
	}

	fn random_nonce(self) -> Vec<u8> {
		let mut nonce = vec![0u8; self.nonce_bytes()];
		rng().fill_bytes(&mut nonce);
		nonce
	}
}

impl std::fmt::Display for SymmetricAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for SymmetricAlgorithm {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		Self::from_name(s)
	}
}

impl TryFrom<String> for SymmetricAlgorithm {
	type Error = Error;

	fn try_from(s: String) -> Result<Self, Error> {
		Self::from_name(&s)
	}
}

impl From<SymmetricAlgorithm> for String {
	fn from(alg: SymmetricAlgorithm) -> String {
		alg.name().to_string()
	}
}

/// The output of [`SymmetricEngine::encrypt`].
///
/// As bytes, an encrypted message is the nonce followed by the ciphertext (which has the
/// authentication tag on the end).  The algorithm isn't part of the bytes; whoever stores them
/// needs to know which algorithm they're for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMessage {
	algorithm: SymmetricAlgorithm,
	nonce: Vec<u8>,
	ciphertext: Vec<u8>,
}

impl EncryptedMessage {
	pub fn new(
		algorithm: SymmetricAlgorithm,
		nonce: impl Into<Vec<u8>>,
		ciphertext: impl Into<Vec<u8>>,
	) -> Result<Self, Error> {
		let nonce = nonce.into();
		let ciphertext = ciphertext.into();

		if nonce.len() != algorithm.nonce_bytes() {
			return Err(Error::invalid_length(algorithm.nonce_bytes(), nonce.len()));
		}

		if ciphertext.len() < algorithm.tag_bytes() {
			return Err(Error::invalid_length(
				algorithm.min_envelope_bytes(),
				nonce.len() + ciphertext.len(),
			));
		}

		Ok(Self {
			algorithm,
			nonce,
			ciphertext,
		})
	}

	/// Split `bytes` into nonce and ciphertext.
	pub fn from_bytes(algorithm: SymmetricAlgorithm, bytes: &[u8]) -> Result<Self, Error> {
		if bytes.len() < algorithm.min_envelope_bytes() {
			return Err(Error::invalid_length(algorithm.min_envelope_bytes(), bytes.len()));
		}

		let (nonce, ciphertext) = bytes.split_at(algorithm.nonce_bytes());

		Self::new(algorithm, nonce, ciphertext)
	}

	pub fn import(
		algorithm: SymmetricAlgorithm,
		text: impl AsRef<[u8]>,
		encoding: Encoding,
	) -> Result<Self, Error> {
		Self::from_bytes(algorithm, &encoding.decode(text)?)
	}

	pub fn algorithm(&self) -> SymmetricAlgorithm {
		self.algorithm
	}

	pub fn nonce(&self) -> &[u8] {
		&self.nonce
	}

	pub fn ciphertext(&self) -> &[u8] {
		&self.ciphertext
	}

	/// `nonce || ciphertext`
	pub fn bytes(&self) -> Vec<u8> {
		let mut v = Vec::with_capacity(self.len());
		v.extend_from_slice(&self.nonce);
		v.extend_from_slice(&self.ciphertext);
		v
	}

	pub fn len(&self) -> usize {
		self.nonce.len() + self.ciphertext.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn export(&self, encoding: Encoding) -> String {
		encoding.encode(self.bytes())
	}
}

impl std::fmt::Display for EncryptedMessage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.export(Encoding::Base64Url))
	}
}

/// A message authentication code produced by [`SymmetricEngine::sign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mac([u8; cipher::MAC_SIZE]);

impl Mac {
	pub const SIZE: usize = cipher::MAC_SIZE;

	pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
		let arr: [u8; Self::SIZE] = bytes
			.try_into()
			.map_err(|_| Error::invalid_length(Self::SIZE, bytes.len()))?;

		Ok(Self(arr))
	}

	pub fn to_bytes(self) -> [u8; Self::SIZE] {
		self.0
	}
}

impl PublicMaterial for Mac {
	fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl std::fmt::Display for Mac {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.export(Encoding::Base64Url))
	}
}

/// Encrypts, decrypts, signs and verifies with [`SharedKey`]s.
///
/// # Example
///
/// ```rust
/// use strong_envelope::{SymmetricAlgorithm, SymmetricEngine};
/// # fn main() -> Result<(), strong_envelope::Error> {
///
/// let key = strong_envelope::generate_key();
/// let engine = SymmetricEngine::new(SymmetricAlgorithm::XChaCha20Poly1305);
///
/// let message = engine.encrypt(&key, b"Hello, world!", b"user:42")?;
///
/// assert_eq!(
///     Some(b"Hello, world!".to_vec()),
///     engine.decrypt(&key, &message.bytes(), b"user:42")?
/// );
///
/// // The wrong context isn't an error, it's just a failed decryption
/// assert_eq!(None, engine.decrypt(&key, &message.bytes(), b"user:43")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymmetricEngine {
	algorithm: SymmetricAlgorithm,
}

impl SymmetricEngine {
	pub fn new(algorithm: SymmetricAlgorithm) -> Self {
		Self { algorithm }
	}

	pub fn algorithm(&self) -> SymmetricAlgorithm {
		self.algorithm
	}

	/// Encrypt `plaintext`, under a freshly-generated nonce, binding `additional_data` to the
	/// ciphertext.
	///
	/// # Errors
	///
	/// [`Error::Insanity`] if `key` has been wiped; [`Error::Encryption`] in the (extremely
	/// unlikely) event the cipher refuses to encrypt.
	#[tracing::instrument(level = "debug", skip(key, plaintext))]
	pub fn encrypt(
		&self,
		key: &SharedKey,
		plaintext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<EncryptedMessage, Error> {
		let nonce = self.algorithm.random_nonce();
		let ciphertext = cipher::seal(
			self.algorithm,
			key.expose_secret()?,
			&nonce,
			plaintext.as_ref(),
			additional_data.as_ref(),
		)?;

		Ok(EncryptedMessage {
			algorithm: self.algorithm,
			nonce,
			ciphertext,
		})
	}

	/// Decrypt the bytes of an [`EncryptedMessage`] made with this engine's algorithm.
	///
	/// Anything that stops the plaintext coming back (the wrong key, the wrong
	/// `additional_data`, a modified ciphertext, or something too short to be a ciphertext at
	/// all) is reported as `Ok(None)`.  Errors are reserved for misuse, such as a wiped key.
	#[tracing::instrument(level = "debug", skip(key, ciphertext))]
	pub fn decrypt(
		&self,
		key: &SharedKey,
		ciphertext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		let key = key.expose_secret()?;

		match EncryptedMessage::from_bytes(self.algorithm, ciphertext.as_ref()) {
			Ok(message) => Ok(open_message(key, &message, additional_data.as_ref())),
			Err(e) => {
				tracing::debug!(%e, "Not a valid ciphertext");
				Ok(None)
			}
		}
	}

	/// Decrypt an [`EncryptedMessage`], using whatever algorithm it was encrypted with.
	#[tracing::instrument(level = "debug", skip(key, message))]
	pub fn open(
		&self,
		key: &SharedKey,
		message: &EncryptedMessage,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		Ok(open_message(
			key.expose_secret()?,
			message,
			additional_data.as_ref(),
		))
	}

	/// Produce a MAC over `message`.
	#[tracing::instrument(level = "debug", skip(key, message))]
	pub fn sign(&self, key: &SharedKey, message: impl AsRef<[u8]>) -> Result<Mac, Error> {
		cipher::mac(self.algorithm, key.expose_secret()?, message.as_ref()).map(Mac)
	}

	/// Check, in constant time, that `mac` is the MAC of `message`.  MACs of the wrong length
	/// simply don't verify.
	#[tracing::instrument(level = "debug", skip(key, mac, message))]
	pub fn verify(
		&self,
		key: &SharedKey,
		mac: impl AsRef<[u8]>,
		message: impl AsRef<[u8]>,
	) -> Result<bool, Error> {
		let expected = cipher::mac(self.algorithm, key.expose_secret()?, message.as_ref())?;

		Ok(constant_time_eq::constant_time_eq(&expected, mac.as_ref()))
	}
}

impl AsRef<[u8]> for Mac {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

fn open_message(key: &[u8; 32], message: &EncryptedMessage, aad: &[u8]) -> Option<Vec<u8>> {
	cipher::open(
		message.algorithm,
		key,
		&message.nonce,
		&message.ciphertext,
		aad,
	)
}
