//! One message, many recipients.
//!
//! The payload is encrypted once, with a fresh [`SharedKey`], and that key is then boxed
//! separately for each recipient.  The result has no flat byte form; it travels as JSON:
//!
//! ```text
//! {"v":1,"alg":"<name>","pub":"<b64>","k":[{"pub":"<b64>","box":"<b64>"},...],
//!  "m":{"alg":"<name>","n":"<b64>","c":"<b64>"}}
//! ```
use std::fmt::Debug;

use super::{
	AsymmetricAlgorithm, AsymmetricEngine, Encoding, EncryptedMessage, EncryptedMessageBox,
	EncryptionKeyPair, EncryptionPublicKey, Error, SecretMaterial as _, SharedKey,
	SymmetricAlgorithm, SymmetricEngine, generate_key,
};

const WIRE_VERSION: u8 = 1;

/// A symmetrically-encrypted payload, plus its key encrypted to each recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipleRecipientMessageBox {
	algorithm: AsymmetricAlgorithm,
	sender_public_key: EncryptionPublicKey,
	keys: Vec<EncryptedMessageBox>,
	message: EncryptedMessage,
}

impl MultipleRecipientMessageBox {
	/// Assemble a box from its parts.
	///
	/// # Errors
	///
	/// [`Error::AlgorithmMismatch`] if any of `keys` wasn't made with `algorithm`, and
	/// [`Error::SenderKeyMismatch`] if any of them wasn't sent by `sender_public_key`.  The first
	/// offending key (in order) is the one reported.
	pub fn new(
		algorithm: AsymmetricAlgorithm,
		sender_public_key: EncryptionPublicKey,
		keys: Vec<EncryptedMessageBox>,
		message: EncryptedMessage,
	) -> Result<Self, Error> {
		for (index, key) in keys.iter().enumerate() {
			if key.algorithm() != algorithm {
				return Err(Error::algorithm_mismatch(
					index,
					algorithm.name(),
					key.algorithm().name(),
				));
			}

			if key.sender_public_key() != &sender_public_key {
				return Err(Error::sender_key_mismatch(index));
			}
		}

		Ok(Self {
			algorithm,
			sender_public_key,
			keys,
			message,
		})
	}

	pub fn algorithm(&self) -> AsymmetricAlgorithm {
		self.algorithm
	}

	pub fn sender_public_key(&self) -> &EncryptionPublicKey {
		&self.sender_public_key
	}

	pub fn keys(&self) -> &[EncryptedMessageBox] {
		&self.keys
	}

	pub fn message(&self) -> &EncryptedMessage {
		&self.message
	}

	/// The public keys of everyone who can open this box, in order.
	pub fn recipients(&self) -> impl Iterator<Item = &EncryptionPublicKey> {
		self.keys.iter().map(EncryptedMessageBox::recipient_public_key)
	}

	pub fn to_json(&self) -> Result<String, Error> {
		serde_json::to_string(self)
			.map_err(|e| Error::insanity(format!("JSON encoding failed: {e}")))
	}

	/// Decode the JSON form, checking everything [`new`](Self::new) checks.
	///
	/// # Errors
	///
	/// [`Error::UnsupportedAlgorithm`] if either algorithm name isn't one we know (or still
	/// support), and [`Error::Decoding`] for anything else that doesn't parse.
	pub fn from_json(json: impl AsRef<str>) -> Result<Self, Error> {
		let wire: wire::Envelope = serde_json::from_str(json.as_ref())
			.map_err(|e| Error::decoding("JSON", e.to_string()))?;

		Self::try_from(wire)
	}
}

impl serde::Serialize for MultipleRecipientMessageBox {
	fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		wire::Envelope::from(self).serialize(s)
	}
}

impl<'de> serde::Deserialize<'de> for MultipleRecipientMessageBox {
	fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
		let wire = wire::Envelope::deserialize(d)?;
		Self::try_from(wire).map_err(serde::de::Error::custom)
	}
}

impl TryFrom<wire::Envelope> for MultipleRecipientMessageBox {
	type Error = Error;

	fn try_from(wire: wire::Envelope) -> Result<Self, Error> {
		if wire.v != WIRE_VERSION {
			return Err(Error::decoding("v", format!("unknown version {}", wire.v)));
		}

		let algorithm = AsymmetricAlgorithm::from_name(&wire.alg)?;
		let sender_public_key = EncryptionPublicKey::import(&wire.public_key, Encoding::Base64Url)
			.map_err(|e| Error::decoding("pub", e.to_string()))?;

		let keys = wire
			.k
			.iter()
			.enumerate()
			.map(|(i, k)| {
				let recipient = EncryptionPublicKey::import(&k.public_key, Encoding::Base64Url)
					.map_err(|e| Error::decoding(format!("k[{i}].pub"), e.to_string()))?;
				let bytes = Encoding::Base64Url
					.decode(&k.encrypted_key)
					.map_err(|e| Error::decoding(format!("k[{i}].box"), e.to_string()))?;

				EncryptedMessageBox::from_bytes(algorithm, sender_public_key, recipient, &bytes)
					.map_err(|e| Error::decoding(format!("k[{i}].box"), e.to_string()))
			})
			.collect::<Result<Vec<_>, Error>>()?;

		let message_algorithm = SymmetricAlgorithm::from_name(&wire.m.alg)?;
		let nonce = Encoding::Base64Url
			.decode(&wire.m.n)
			.map_err(|e| Error::decoding("m.n", e.to_string()))?;
		let ciphertext = Encoding::Base64Url
			.decode(&wire.m.c)
			.map_err(|e| Error::decoding("m.c", e.to_string()))?;
		let message = EncryptedMessage::new(message_algorithm, nonce.to_vec(), ciphertext.to_vec())
			.map_err(|e| Error::decoding("m", e.to_string()))?;

		Self::new(algorithm, sender_public_key, keys, message)
	}
}

mod wire {
	use serde::{Deserialize, Serialize};

	use super::{Encoding, MultipleRecipientMessageBox, WIRE_VERSION};
	use crate::PublicMaterial as _;

	#[derive(Debug, Serialize, Deserialize)]
	pub(super) struct Envelope {
		pub(super) v: u8,
		pub(super) alg: String,
		#[serde(rename = "pub")]
		pub(super) public_key: String,
		pub(super) k: Vec<Key>,
		pub(super) m: Message,
	}

	#[derive(Debug, Serialize, Deserialize)]
	pub(super) struct Key {
		#[serde(rename = "pub")]
		pub(super) public_key: String,
		#[serde(rename = "box")]
		pub(super) encrypted_key: String,
	}

	#[derive(Debug, Serialize, Deserialize)]
	pub(super) struct Message {
		pub(super) alg: String,
		pub(super) n: String,
		pub(super) c: String,
	}

	impl From<&MultipleRecipientMessageBox> for Envelope {
		fn from(b: &MultipleRecipientMessageBox) -> Self {
			Self {
				v: WIRE_VERSION,
				alg: b.algorithm.name().to_string(),
				public_key: b.sender_public_key.export(Encoding::Base64Url),
				k: b
					.keys
					.iter()
					.map(|k| Key {
						public_key: k.recipient_public_key().export(Encoding::Base64Url),
						encrypted_key: k.export(Encoding::Base64Url),
					})
					.collect(),
				m: Message {
					alg: b.message.algorithm().name().to_string(),
					n: Encoding::Base64Url.encode(b.message.nonce()),
					c: Encoding::Base64Url.encode(b.message.ciphertext()),
				},
			}
		}
	}
}

impl AsymmetricEngine {
	/// Encrypt `plaintext` once, so that any of `recipients` can decrypt it.
	#[tracing::instrument(level = "debug", skip(sender, plaintext))]
	pub fn encrypt_for_recipients(
		&self,
		sender: &EncryptionKeyPair,
		recipients: &[EncryptionPublicKey],
		plaintext: impl AsRef<[u8]>,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<MultipleRecipientMessageBox, Error> {
		let payload_key = generate_key();
		let message = SymmetricEngine::new(self.algorithm().symmetric()).encrypt(
			&payload_key,
			plaintext,
			additional_data.as_ref(),
		)?;

		let keys = recipients
			.iter()
			.map(|recipient| {
				self.encrypt(
					sender,
					recipient,
					payload_key.expose_bytes()?,
					additional_data.as_ref(),
				)
			})
			.collect::<Result<Vec<_>, Error>>()?;

		MultipleRecipientMessageBox::new(self.algorithm(), *sender.public(), keys, message)
	}

	/// Decrypt a [`MultipleRecipientMessageBox`], if `recipient` is one of its recipients.
	#[tracing::instrument(level = "debug", skip(recipient, message))]
	pub fn decrypt_for_recipient(
		&self,
		recipient: &EncryptionKeyPair,
		message: &MultipleRecipientMessageBox,
		additional_data: impl AsRef<[u8]> + Debug,
	) -> Result<Option<Vec<u8>>, Error> {
		let Some(key_box) = message
			.keys
			.iter()
			.find(|k| k.recipient_public_key().ct_eq(recipient.public()))
		else {
			tracing::debug!(recipient=%recipient.public(), "Not a recipient of this message");
			return Ok(None);
		};

		let Some(key_bytes) = self.open(recipient, key_box, additional_data.as_ref())? else {
			return Ok(None);
		};
		let key_bytes = zeroize::Zeroizing::new(key_bytes);

		let Ok(payload_key) = SharedKey::try_from_slice(&key_bytes) else {
			tracing::debug!(len = key_bytes.len(), "Encapsulated key is the wrong size");
			return Ok(None);
		};

		SymmetricEngine::default().open(&payload_key, &message.message, additional_data.as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_init;

	fn three_recipients() -> (EncryptionKeyPair, Vec<EncryptionKeyPair>) {
		(
			EncryptionKeyPair::generate(),
			(0..3).map(|_| EncryptionKeyPair::generate()).collect(),
		)
	}

	#[test]
	fn every_recipient_can_read_it() {
		test_init();
		let (sender, recipients) = three_recipients();
		let publics: Vec<_> = recipients.iter().map(|r| *r.public()).collect();

		for alg in AsymmetricAlgorithm::ALL {
			let engine = AsymmetricEngine::new(alg);
			let b = engine
				.encrypt_for_recipients(&sender, &publics, b"team update", b"ad")
				.unwrap();

			assert_eq!(3, b.keys().len());
			assert_eq!(publics, b.recipients().copied().collect::<Vec<_>>());

			for r in &recipients {
				assert_eq!(
					Some(b"team update".to_vec()),
					engine.decrypt_for_recipient(r, &b, b"ad").unwrap(),
					"{alg}"
				);
				assert_eq!(None, engine.decrypt_for_recipient(r, &b, b"nope").unwrap());
			}

			let outsider = EncryptionKeyPair::generate();
			assert_eq!(None, engine.decrypt_for_recipient(&outsider, &b, b"ad").unwrap());
		}
	}

	#[test]
	fn mismatched_algorithms_are_rejected() {
		let (sender, recipients) = three_recipients();
		let payload = SymmetricEngine::default().encrypt(&generate_key(), b"x", b"").unwrap();

		let good = AsymmetricEngine::default()
			.encrypt(&sender, recipients[0].public(), b"k", b"")
			.unwrap();
		let odd = AsymmetricEngine::new(AsymmetricAlgorithm::X25519XSalsa20Poly1305)
			.encrypt(&sender, recipients[1].public(), b"k", b"")
			.unwrap();

		let err = MultipleRecipientMessageBox::new(
			AsymmetricAlgorithm::default(),
			*sender.public(),
			vec![good, odd],
			payload,
		)
		.unwrap_err();

		assert!(
			matches!(
				err,
				Error::AlgorithmMismatch { index: 1, ref actual, .. }
					if actual == "x25519-xsalsa20-poly1305"
			),
			"{err:?}"
		);
	}

	#[test]
	fn mismatched_senders_are_rejected() {
		let (sender, recipients) = three_recipients();
		let imposter = EncryptionKeyPair::generate();
		let payload = SymmetricEngine::default().encrypt(&generate_key(), b"x", b"").unwrap();
		let engine = AsymmetricEngine::default();

		let keys = vec![
			engine.encrypt(&imposter, recipients[0].public(), b"k", b"").unwrap(),
			engine.encrypt(&sender, recipients[1].public(), b"k", b"").unwrap(),
		];

		assert!(matches!(
			MultipleRecipientMessageBox::new(
				AsymmetricAlgorithm::default(),
				*sender.public(),
				keys,
				payload,
			),
			Err(Error::SenderKeyMismatch { index: 0 })
		));
	}

	#[test]
	fn json_round_trip() {
		let (sender, recipients) = three_recipients();
		let publics: Vec<_> = recipients.iter().map(|r| *r.public()).collect();
		let engine = AsymmetricEngine::default();

		let b = engine.encrypt_for_recipients(&sender, &publics, b"hi all", b"").unwrap();
		let json = b.to_json().unwrap();

		let value: serde_json::Value = serde_json::from_str(&json).unwrap();
		assert_eq!(1, value["v"]);
		assert_eq!("x25519-xchacha20-poly1305", value["alg"]);
		assert_eq!(sender.public().to_string(), value["pub"]);
		assert_eq!(3, value["k"].as_array().unwrap().len());
		assert_eq!("xchacha20-poly1305", value["m"]["alg"]);

		let back = MultipleRecipientMessageBox::from_json(&json).unwrap();
		assert_eq!(b, back);
		assert_eq!(
			Some(b"hi all".to_vec()),
			engine.decrypt_for_recipient(&recipients[2], &back, b"").unwrap()
		);

		let via_serde: MultipleRecipientMessageBox = serde_json::from_str(&json).unwrap();
		assert_eq!(b, via_serde);
	}

	#[test]
	fn bad_json_is_rejected() {
		let (sender, recipients) = three_recipients();
		let b = AsymmetricEngine::default()
			.encrypt_for_recipients(&sender, &[*recipients[0].public()], b"x", b"")
			.unwrap();
		let good: serde_json::Value = serde_json::from_str(&b.to_json().unwrap()).unwrap();

		let mutate = |f: &dyn Fn(&mut serde_json::Value)| {
			let mut v = good.clone();
			f(&mut v);
			MultipleRecipientMessageBox::from_json(v.to_string())
		};

		assert!(matches!(
			mutate(&|v| v["v"] = 2.into()),
			Err(Error::Decoding { ref element, .. }) if element == "v"
		));
		assert!(matches!(
			mutate(&|v| v["alg"] = "x25519-retired-cipher".into()),
			Err(Error::UnsupportedAlgorithm(_))
		));
		assert!(matches!(
			mutate(&|v| v["m"]["alg"] = "retired-cipher".into()),
			Err(Error::UnsupportedAlgorithm(_))
		));
		assert!(matches!(
			mutate(&|v| v["pub"] = "AAAA".into()),
			Err(Error::Decoding { ref element, .. }) if element == "pub"
		));
		assert!(matches!(
			mutate(&|v| v["k"][0]["box"] = "AAAA".into()),
			Err(Error::Decoding { ref element, .. }) if element == "k[0].box"
		));
		assert!(matches!(
			mutate(&|v| v["m"]["n"] = "AAAA".into()),
			Err(Error::Decoding { ref element, .. }) if element == "m"
		));
		assert!(matches!(
			MultipleRecipientMessageBox::from_json("{\"v\":1}"),
			Err(Error::Decoding { .. })
		));
	}
}
