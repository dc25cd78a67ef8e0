use ed25519_dalek::Signer as _;
use rand::{RngCore as _, rng};
use std::fmt::Debug;
use x25519_dalek::{EphemeralSecret, PublicKey};

use super::{
	Encoding, EncryptedMessage, EncryptionKeyPair, EncryptionPublicKey, Error, PublicMaterial,
	SharedKey, Signature, SignatureKeyPair, SignaturePublicKey, SymmetricAlgorithm, cipher, kdf,
};

/// The public-key encryption schemes an [`AsymmetricEngine`] can use.
///
/// All of them agree on a key with X25519, and then encrypt with one of the
/// [`SymmetricAlgorithm`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum AsymmetricAlgorithm {
	X25519XChaCha20Blake2b,
	#[default]
	X25519XChaCha20Poly1305,
	X25519XSalsa20Poly1305,
	X25519Aes256Gcm,
}

impl AsymmetricAlgorithm {
	pub const ALL: [AsymmetricAlgorithm; 4] = [
		Self::X25519XChaCha20Blake2b,
		Self::X25519XChaCha20Poly1305,
		Self::X25519XSalsa20Poly1305,
		Self::X25519Aes256Gcm,
	];

	pub fn name(self) -> &'static str {
		match self {
			Self::X25519XChaCha20Blake2b => "x25519-xchacha20-blake2b",
			Self::X25519XChaCha20Poly1305 => "x25519-xchacha20-poly1305",
			Self::X25519XSalsa20Poly1305 => "x25519-xsalsa20-poly1305",
			Self::X25519Aes256Gcm => "x25519-aes-256-gcm",
		}
	}

	pub fn symmetric(self) -> SymmetricAlgorithm {
		match self {
			Self::X25519XChaCha20Blake2b => SymmetricAlgorithm::XChaCha20Blake2b,
			Self::X25519XChaCha20Poly1305 => SymmetricAlgorithm::XChaCha20Poly1305,
			Self::X25519XSalsa20Poly1305 => SymmetricAlgorithm::XSalsa20Poly1305,
			Self::X25519Aes256Gcm => SymmetricAlgorithm::Aes256Gcm,
		}
	}

	/// Anonymous encryption picks every nonce at random, with no way of coordinating between
	/// senders, so it's only on offer when the nonce space is big enough for that to be safe.
	pub fn supports_seal(self) -> bool {
		self.symmetric().info().random_nonce_safe
	}

	pub fn from_name(name: &str) -> Result<Self, Error> {
		Self::ALL
			.into_iter()
			.find(|alg| alg.name() == name)
			.ok_or_else(|| Error::unsupported_algorithm(name))
	}

	fn box_key(
		self,
		shared_secret: &[u8],
		sender: &EncryptionPublicKey,
		recipient: &EncryptionPublicKey,
	) -> Result<SharedKey, Error> {
		let mut salt = Vec::with_capacity(64);
		salt.extend_from_slice(sender.as_bytes());
		salt.extend_from_slice(recipient.as_bytes());

		let mut context = b"box::".to_vec();
		context.extend_from_slice(self.name().as_bytes());

		kdf::extract_and_expand(shared_secret, &salt, &context)
	}

	fn seal_key(
		self,
		shared_secret: &[u8],
		ephemeral: &EncryptionPublicKey,
		recipient: &EncryptionPublicKey,
	) -> Result<SharedKey, Error> {
		let mut salt = Vec::with_capacity(64);
		salt.extend_from_slice(ephemeral.as_bytes());
		salt.extend_from_slice(recipient.as_bytes());

		let mut context = b"seal::".to_vec();
		context.extend_from_slice(self.name().as_bytes());

		kdf::extract_and_expand(shared_secret, &salt, &context)
	}
}

impl std::fmt::Display for AsymmetricAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for AsymmetricAlgorithm {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		Self::from_name(s)
	}
}

impl TryFrom<String> for AsymmetricAlgorithm {
	type Error = Error;

	fn try_from(s: String) -> Result<Self, Error> {
		Self::from_name(&s)
	}
}

impl From<AsymmetricAlgorithm> for String {
	fn from(alg: AsymmetricAlgorithm) -> String {
		alg.name().to_string()
	}
}

/// The output of [`AsymmetricEngine::encrypt`].
///
/// Carries both public keys, so the recipient knows whose public key to use when decrypting.  As
/// bytes, it's the same as an [`EncryptedMessage`]: nonce, then ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMessageBox {
	algorithm: AsymmetricAlgorithm,
	sender_public_key: EncryptionPublicKey,
	recipient_public_key: EncryptionPublicKey,
	nonce: Vec<u8>,
	ciphertext: Vec<u8>,
}

impl EncryptedMessageBox {
	pub fn from_bytes(
		algorithm: AsymmetricAlgorithm,
		sender_public_key: EncryptionPublicKey,
		recipient_public_key: EncryptionPublicKey,
		bytes: &[u8],
	) -> Result<Self, Error> {
		let message = EncryptedMessage::from_bytes(algorithm.symmetric(), bytes)?;

		Ok(Self {
			algorithm,
			sender_public_key,
			recipient_public_key,
			nonce: message.nonce().to_vec(),
			ciphertext: message.ciphertext().to_vec(),
		})
	}

	pub fn algorithm(&self) -> AsymmetricAlgorithm {
		self.algorithm
	}

	pub fn sender_public_key(&self) -> &EncryptionPublicKey {
		&self.sender_public_key
	}

	pub fn recipient_public_key(&self) -> &EncryptionPublicKey {
		&self.recipient_public_key
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

impl std::fmt::Display for EncryptedMessageBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.export(Encoding::Base64Url))
	}
}

/// Public-key encryption, signatures, and anonymous "sealed" messages.
///
/// # Example
///
/// ```rust
/// use strong_envelope::{AsymmetricEngine, EncryptionKeyPair};
/// # fn main() -> Result<(), strong_envelope::Error> {
///
/// let alice = EncryptionKeyPair::generate();
/// let bob = EncryptionKeyPair::generate();
/// let engine = AsymmetricEngine::default();
///
/// let message = engine.encrypt(&alice, bob.public(), b"Hi Bob!", b"")?;
///
/// // Bob needs Alice's public key (which the box carries) to read it
/// assert_eq!(
///     Some(b"Hi Bob!".to_vec()),
///     engine.decrypt(&bob, alice.public(), &message.bytes(), b"")?
/// );
///
/// // Anyone can seal a message for Bob, but only Bob can unseal it
/// let sealed = engine.seal(bob.public(), b"guess who", b"")?;
/// assert_eq!(Some(b"guess who".to_vec()), engine.unseal(&bob, &sealed, b"")?);
/// assert_eq!(None, engine.unseal(&alice, &sealed, b"")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AsymmetricEngine {
	algorithm: AsymmetricAlgorithm,
}

impl AsymmetricEngine {
	pub fn new(algorithm: AsymmetricAlgorithm) -> Self {
		Self { algorithm }
	}

	pub fn algorithm(&self) -> AsymmetricAlgorithm {
		self.algorithm
	}

	/// Encrypt `plaintext` from `sender` to the holder of `recipient`'s private key.
	///
	/// # Errors
	///
	/// [`Error::InvalidKey`] if `recipient` is a low-order point, and the same failures as
	/// [`SymmetricEngine::encrypt`](super::SymmetricEngine::encrypt).
	#[tracing::instrument(level = "debug", skip(sender, plaintext))]
	pub fn encrypt(
		&self,
		sender: &EncryptionKeyPair,
		recipient: &EncryptionPublicKey,
		plaintext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<EncryptedMessageBox, Error> {
		let shared = sender.diffie_hellman(recipient)?;
		let key = self
			.algorithm
			.box_key(shared.as_bytes(), sender.public(), recipient)?;

		let symmetric = self.algorithm.symmetric();
		let mut nonce = vec![0u8; symmetric.nonce_bytes()];
		rng().fill_bytes(&mut nonce);

		let ciphertext = cipher::seal(
			symmetric,
			key.expose_secret()?,
			&nonce,
			plaintext.as_ref(),
			additional_data.as_ref(),
		)?;

		Ok(EncryptedMessageBox {
			algorithm: self.algorithm,
			sender_public_key: *sender.public(),
			recipient_public_key: *recipient,
			nonce,
			ciphertext,
		})
	}

	/// Decrypt the bytes of an [`EncryptedMessageBox`] that `sender` sent to `recipient`.
	///
	/// As with symmetric decryption, every reason for not getting the plaintext back comes out
	/// as `Ok(None)`.
	#[tracing::instrument(level = "debug", skip(recipient, ciphertext))]
	pub fn decrypt(
		&self,
		recipient: &EncryptionKeyPair,
		sender: &EncryptionPublicKey,
		ciphertext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		let message = match EncryptedMessageBox::from_bytes(
			self.algorithm,
			*sender,
			*recipient.public(),
			ciphertext.as_ref(),
		) {
			Ok(m) => m,
			Err(e) => {
				tracing::debug!(%e, "Not a valid ciphertext");
				return Ok(None);
			}
		};

		self.open(recipient, &message, additional_data)
	}

	/// Decrypt an [`EncryptedMessageBox`], using the algorithm and sender recorded in it.
	#[tracing::instrument(level = "debug", skip(recipient, message))]
	pub fn open(
		&self,
		recipient: &EncryptionKeyPair,
		message: &EncryptedMessageBox,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		if !message.recipient_public_key.ct_eq(recipient.public()) {
			tracing::debug!(recipient=%message.recipient_public_key, "Message is for someone else");
			return Ok(None);
		}

		let shared = match recipient.diffie_hellman(&message.sender_public_key) {
			Ok(s) => s,
			Err(Error::InvalidKey(_)) => {
				tracing::debug!(
					sender = %message.sender_public_key,
					"Sender key is a low-order point"
				);
				return Ok(None);
			}
			Err(e) => return Err(e),
		};

		let key = message.algorithm.box_key(
			shared.as_bytes(),
			&message.sender_public_key,
			recipient.public(),
		)?;

		Ok(cipher::open(
			message.algorithm.symmetric(),
			key.expose_secret()?,
			&message.nonce,
			&message.ciphertext,
			additional_data.as_ref(),
		))
	}

	/// Sign `message` with Ed25519.
	#[tracing::instrument(level = "debug", skip(keypair, message))]
	pub fn sign(
		&self,
		keypair: &SignatureKeyPair,
		message: impl AsRef<[u8]>,
	) -> Result<Signature, Error> {
		Ok(keypair.signing_key()?.sign(message.as_ref()).into())
	}

	/// Check that `signature` is `public_key`'s signature over `message`.
	#[tracing::instrument(level = "debug", skip(signature, message))]
	pub fn verify(
		&self,
		public_key: &SignaturePublicKey,
		signature: impl AsRef<[u8]>,
		message: impl AsRef<[u8]>,
	) -> bool {
		let Ok(signature) = ed25519_dalek::Signature::from_slice(signature.as_ref()) else {
			tracing::debug!("Malformed signature");
			return false;
		};

		let Ok(verifying_key) = public_key.dalek() else {
			return false;
		};

		verifying_key
			.verify_strict(message.as_ref(), &signature)
			.inspect_err(|e| tracing::debug!(%e, "Signature verification failed"))
			.is_ok()
	}

	/// Encrypt `plaintext` so that only `recipient` can read it, without saying who it's from.
	///
	/// The output is `ephemeral public key || nonce || ciphertext`.
	///
	/// # Errors
	///
	/// [`Error::UnsupportedOperation`] if the engine's algorithm has too small a nonce space to
	/// pick nonces at random (that's AES-GCM).
	#[tracing::instrument(level = "debug", skip(plaintext))]
	pub fn seal(
		&self,
		recipient: &EncryptionPublicKey,
		plaintext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Vec<u8>, Error> {
		self.check_seal_support()?;

		let ephemeral = EphemeralSecret::random();
		let ephemeral_public = EncryptionPublicKey::from(PublicKey::from(&ephemeral));

		let shared = ephemeral.diffie_hellman(&recipient.dalek());
		if !shared.was_contributory() {
			return Err(Error::invalid_key("public key is a low-order point"));
		}

		let key = self
			.algorithm
			.seal_key(shared.as_bytes(), &ephemeral_public, recipient)?;

		let symmetric = self.algorithm.symmetric();
		let mut nonce = vec![0u8; symmetric.nonce_bytes()];
		rng().fill_bytes(&mut nonce);

		let ciphertext = cipher::seal(
			symmetric,
			key.expose_secret()?,
			&nonce,
			plaintext.as_ref(),
			additional_data.as_ref(),
		)?;

		let mut out =
			Vec::with_capacity(EncryptionPublicKey::SIZE + nonce.len() + ciphertext.len());
		out.extend_from_slice(ephemeral_public.as_bytes());
		out.extend_from_slice(&nonce);
		out.extend_from_slice(&ciphertext);

		Ok(out)
	}

	/// Reverse [`seal`](Self::seal).
	#[tracing::instrument(level = "debug", skip(recipient, ciphertext))]
	pub fn unseal(
		&self,
		recipient: &EncryptionKeyPair,
		ciphertext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		self.check_seal_support()?;

		let ciphertext = ciphertext.as_ref();
		let symmetric = self.algorithm.symmetric();

		if ciphertext.len() < EncryptionPublicKey::SIZE + symmetric.min_envelope_bytes() {
			tracing::debug!(len = ciphertext.len(), "Sealed box too short");
			return Ok(None);
		}

		let (ephemeral_public, rest) = ciphertext.split_at(EncryptionPublicKey::SIZE);
		let ephemeral_public = EncryptionPublicKey::from_slice(ephemeral_public)?;
		let (nonce, body) = rest.split_at(symmetric.nonce_bytes());

		let shared = match recipient.diffie_hellman(&ephemeral_public) {
			Ok(s) => s,
			Err(Error::InvalidKey(_)) => return Ok(None),
			Err(e) => return Err(e),
		};

		let key = self
			.algorithm
			.seal_key(shared.as_bytes(), &ephemeral_public, recipient.public())?;

		Ok(cipher::open(
			symmetric,
			key.expose_secret()?,
			nonce,
			body,
			additional_data.as_ref(),
		))
	}

	fn check_seal_support(&self) -> Result<(), Error> {
		if self.algorithm.supports_seal() {
			Ok(())
		} else {
			Err(Error::unsupported_operation(format!(
				"{} nonces are too small to pick at random, so seal/unseal is not available",
				self.algorithm
			)))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_init;
	use proptest::prelude::*;

	#[test]
	fn every_algorithm_round_trips() {
		test_init();
		let alice = EncryptionKeyPair::generate();
		let bob = EncryptionKeyPair::generate();

		for alg in AsymmetricAlgorithm::ALL {
			let engine = AsymmetricEngine::new(alg);

			for plaintext in [&b""[..], &b"hello, bob"[..]] {
				let message = engine.encrypt(&alice, bob.public(), plaintext, b"ad").unwrap();

				assert_eq!(alg, message.algorithm());
				assert_eq!(alice.public(), message.sender_public_key());
				assert_eq!(bob.public(), message.recipient_public_key());
				assert_eq!(message.len(), message.bytes().len());

				assert_eq!(
					Some(plaintext.to_vec()),
					engine.decrypt(&bob, alice.public(), message.bytes(), b"ad").unwrap(),
					"{alg}"
				);
				assert_eq!(
					Some(plaintext.to_vec()),
					engine.open(&bob, &message, b"ad").unwrap(),
					"{alg}"
				);
			}
		}
	}

	#[test]
	fn the_wrong_people_cannot_decrypt() {
		let alice = EncryptionKeyPair::generate();
		let bob = EncryptionKeyPair::generate();
		let eve = EncryptionKeyPair::generate();
		let engine = AsymmetricEngine::default();

		let message = engine.encrypt(&alice, bob.public(), b"for bob", b"").unwrap();

		assert_eq!(None, engine.open(&eve, &message, b"").unwrap());
		assert_eq!(
			None,
			engine.decrypt(&eve, alice.public(), message.bytes(), b"").unwrap()
		);
		// Right recipient, wrong idea about who sent it
		assert_eq!(
			None,
			engine.decrypt(&bob, eve.public(), message.bytes(), b"").unwrap()
		);
		// Wrong additional data
		assert_eq!(None, engine.open(&bob, &message, b"x").unwrap());
	}

	#[test]
	fn short_boxes_are_rejected_quietly() {
		let alice = EncryptionKeyPair::generate();
		let bob = EncryptionKeyPair::generate();

		for alg in AsymmetricAlgorithm::ALL {
			let engine = AsymmetricEngine::new(alg);
			let short = vec![0u8; alg.symmetric().min_envelope_bytes() - 1];

			assert_eq!(None, engine.decrypt(&bob, alice.public(), &short, b"").unwrap());
		}
	}

	#[test]
	fn signatures() {
		let signer = SignatureKeyPair::generate();
		let engine = AsymmetricEngine::default();

		let sig = engine.sign(&signer, b"release v1.0").unwrap();

		assert!(engine.verify(signer.public(), sig, b"release v1.0"));
		assert!(!engine.verify(signer.public(), sig, b"release v1.1"));
		assert!(!engine.verify(SignatureKeyPair::generate().public(), sig, b"release v1.0"));
		assert!(!engine.verify(signer.public(), &sig.to_bytes()[..63], b"release v1.0"));
	}

	#[test]
	fn seal_round_trip() {
		let bob = EncryptionKeyPair::generate();

		for alg in AsymmetricAlgorithm::ALL.into_iter().filter(|a| a.supports_seal()) {
			let engine = AsymmetricEngine::new(alg);
			let sealed = engine.seal(bob.public(), b"anonymous tip", b"tips").unwrap();

			assert_eq!(
				Some(b"anonymous tip".to_vec()),
				engine.unseal(&bob, &sealed, b"tips").unwrap(),
				"{alg}"
			);
			assert_eq!(None, engine.unseal(&bob, &sealed, b"not tips").unwrap());
			assert_eq!(None, engine.unseal(&bob, &sealed[..40], b"tips").unwrap());

			let mut tampered = sealed.clone();
			let last = tampered.len() - 1;
			tampered[last] ^= 1;
			assert_eq!(None, engine.unseal(&bob, &tampered, b"tips").unwrap());
		}
	}

	#[test]
	fn aes_gcm_refuses_to_seal() {
		let bob = EncryptionKeyPair::generate();
		let engine = AsymmetricEngine::new(AsymmetricAlgorithm::X25519Aes256Gcm);

		assert!(!AsymmetricAlgorithm::X25519Aes256Gcm.supports_seal());
		assert!(matches!(
			engine.seal(bob.public(), b"x", b""),
			Err(Error::UnsupportedOperation(_))
		));
		assert!(matches!(
			engine.unseal(&bob, vec![0u8; 128], b""),
			Err(Error::UnsupportedOperation(_))
		));

		// Regular boxes are fine, though
		let alice = EncryptionKeyPair::generate();
		let message = engine.encrypt(&alice, bob.public(), b"x", b"").unwrap();
		assert_eq!(Some(b"x".to_vec()), engine.open(&bob, &message, b"").unwrap());
	}

	#[test]
	fn low_order_recipients_are_refused() {
		let alice = EncryptionKeyPair::generate();
		let zero = EncryptionPublicKey::from_slice(&[0u8; 32]).unwrap();
		let engine = AsymmetricEngine::default();

		assert!(matches!(
			engine.encrypt(&alice, &zero, b"x", b""),
			Err(Error::InvalidKey(_))
		));
		assert!(matches!(engine.seal(&zero, b"x", b""), Err(Error::InvalidKey(_))));
	}

	proptest! {
		#[test]
		fn flipped_bytes_never_decrypt(
			plaintext in prop::collection::vec(any::<u8>(), 0..64),
			index: prop::sample::Index,
			flip in 1u8..=255,
		) {
			let alice = EncryptionKeyPair::generate();
			let bob = EncryptionKeyPair::generate();
			let engine = AsymmetricEngine::default();

			let mut bytes = engine.encrypt(&alice, bob.public(), &plaintext, b"").unwrap().bytes();
			let i = index.index(bytes.len());
			bytes[i] ^= flip;

			prop_assert_eq!(None, engine.decrypt(&bob, alice.public(), &bytes, b"").unwrap());
		}
	}
}
