use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

use super::{
	Encoding, EncryptionKeyPair, Error, KeyId, SensitiveArray, SharedKey, SignatureKeyPair,
	SignaturePublicKey, kdf, key_id,
};

/// Every key an application needs, derived from a single "app key".
///
/// Rather than managing a separate secret for every purpose, an application holds one root key
/// and asks the [`KeyChain`] for what it needs: any number of purpose-specific [`SharedKey`]s
/// (via [`shared`](Self::shared)), one [`EncryptionKeyPair`], and one [`SignatureKeyPair`].
/// Only the two key pairs have public halves that get handed out, so there are only ever two
/// long-lived public keys to worry about.
///
/// Derivation is deterministic: two key chains built from the same app key produce the same keys.
/// Derived keys are cached after first use, and the cache is shared amongst all the clones of a
/// given [`KeyChain`], so that everyone asking for the same key gets the very same [`Arc`].
///
/// # Example
///
/// ```rust
/// use strong_envelope::{KeyChain, generate_key};
/// # fn main() -> Result<(), strong_envelope::Error> {
///
/// let keys = KeyChain::new(generate_key())?;
///
/// let cookies = keys.shared(Some("cookies"))?;
/// assert!(std::sync::Arc::ptr_eq(&cookies, &keys.shared(Some("cookies"))?));
///
/// let id = keys.key_id()?.to_string();
/// assert_eq!(Some(*keys.signature()?.public()), keys.lookup(&id)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct KeyChain {
	app_key: Arc<SharedKey>,
	derived: Arc<RwLock<DerivedKeys>>,
}

// We don't panic while holding the lock
impl std::panic::UnwindSafe for KeyChain {}

#[derive(Debug, Default)]
struct DerivedKeys {
	shared: HashMap<String, Arc<SharedKey>>,
	encryption: Option<Arc<EncryptionKeyPair>>,
	signature: Option<Arc<SignatureKeyPair>>,
}

impl KeyChain {
	#[tracing::instrument(level = "debug", name = "KeyChain::new")]
	pub fn new(app_key: SharedKey) -> Result<Self, Error> {
		if app_key.is_wiped() {
			return Err(Error::invalid_key("app key has been wiped"));
		}

		Ok(Self {
			app_key: Arc::new(app_key),
			derived: Arc::new(RwLock::new(DerivedKeys::default())),
		})
	}

	/// Build a key chain from the text form of an app key, such as one read from configuration.
	pub fn import(text: impl AsRef<[u8]>, encoding: Encoding) -> Result<Self, Error> {
		Self::new(SharedKey::import(text, encoding)?)
	}

	/// The app key itself when `context` is `None`, otherwise a key for the purpose named by
	/// `context`.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn shared(&self, context: Option<&str>) -> Result<Arc<SharedKey>, Error> {
		let Some(context) = context else {
			return Ok(Arc::clone(&self.app_key));
		};

		if let Some(key) = self.derived.read_arc().shared.get(context) {
			return Ok(Arc::clone(key));
		}

		let mut derived = self.derived.write_arc();

		// Someone may have beaten us to it while we waited for the write lock
		if let Some(key) = derived.shared.get(context) {
			return Ok(Arc::clone(key));
		}

		tracing::debug!(context, "Deriving shared key");
		let key = Arc::new(kdf::derive_key(
			&self.app_key,
			format!("keychain::shared::{context}").as_bytes(),
		)?);
		derived.shared.insert(context.to_string(), Arc::clone(&key));

		Ok(key)
	}

	/// The key pair that other parties encrypt messages to us with.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn encryption(&self) -> Result<Arc<EncryptionKeyPair>, Error> {
		if let Some(kp) = &self.derived.read_arc().encryption {
			return Ok(Arc::clone(kp));
		}

		let mut derived = self.derived.write_arc();

		if let Some(kp) = &derived.encryption {
			return Ok(Arc::clone(kp));
		}

		tracing::debug!("Deriving encryption key pair");
		let kp = Arc::new(EncryptionKeyPair::from_secret(
			self.derive_seed(b"keychain::encryption")?,
		)?);
		derived.encryption = Some(Arc::clone(&kp));

		Ok(kp)
	}

	/// The key pair that we sign things with.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn signature(&self) -> Result<Arc<SignatureKeyPair>, Error> {
		if let Some(kp) = &self.derived.read_arc().signature {
			return Ok(Arc::clone(kp));
		}

		let mut derived = self.derived.write_arc();

		if let Some(kp) = &derived.signature {
			return Ok(Arc::clone(kp));
		}

		tracing::debug!("Deriving signature key pair");
		let kp = Arc::new(SignatureKeyPair::from_secret(
			self.derive_seed(b"keychain::signature")?,
		)?);
		derived.signature = Some(Arc::clone(&kp));

		Ok(kp)
	}

	/// The ID of our signature public key, for putting in places where the full key won't fit.
	pub fn key_id(&self) -> Result<KeyId, Error> {
		Ok(key_id(self.signature()?.public()))
	}

	/// Find our signature public key by its (hex) ID.
	///
	/// Malformed IDs and IDs that aren't ours both produce `Ok(None)`.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn lookup(&self, key_id_hex: &str) -> Result<Option<SignaturePublicKey>, Error> {
		let claimed = match KeyId::from_hex(key_id_hex) {
			Ok(id) => id,
			Err(e) => {
				tracing::debug!(%e, "Malformed key ID");
				return Ok(None);
			}
		};

		let kp = self.signature()?;

		if key_id(kp.public()) == claimed {
			Ok(Some(*kp.public()))
		} else {
			tracing::debug!(%claimed, "Unknown key ID");
			Ok(None)
		}
	}

	/// Forget every derived key.  They'll be derived again the next time they're asked for.
	///
	/// The app key is kept.  Keys already handed out stay valid for as long as their holders keep
	/// them.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn clear(&self) {
		*self.derived.write_arc() = DerivedKeys::default();
	}

	fn derive_seed(&self, label: &[u8]) -> Result<SensitiveArray<32>, Error> {
		let seed = kdf::derive_key(&self.app_key, label)?;

		Ok(Box::new(*seed.expose_secret()?).into())
	}
}
