use serde::Deserialize as _;
use zeroize::Zeroizing;

use super::{
	AsymmetricAlgorithm, AsymmetricEngine, Encoding, Error, KeyChain, SymmetricAlgorithm,
	SymmetricEngine,
};

/// Everything needed to get an application's cryptography going, in a form that can be loaded
/// from a config file with any `serde` format.
///
/// Only `app_key` is required:
///
/// ```rust
/// use strong_envelope::{Config, SymmetricAlgorithm};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
///
/// let config: Config = serde_json::from_str(r#"{
///     "app_key": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=",
///     "symmetric": "xsalsa20-poly1305"
/// }"#)?;
///
/// assert_eq!(SymmetricAlgorithm::XSalsa20Poly1305, config.symmetric_engine().algorithm());
/// config.key_chain()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(deserialize_with = "deserialize_secret")]
	app_key: Zeroizing<String>,
	#[serde(default)]
	key_encoding: Encoding,
	#[serde(default)]
	symmetric: SymmetricAlgorithm,
	#[serde(default)]
	asymmetric: AsymmetricAlgorithm,
}

impl Config {
	pub fn new(app_key: impl Into<String>) -> Self {
		Self {
			app_key: Zeroizing::new(app_key.into()),
			key_encoding: Encoding::default(),
			symmetric: SymmetricAlgorithm::default(),
			asymmetric: AsymmetricAlgorithm::default(),
		}
	}

	pub fn with_key_encoding(mut self, encoding: Encoding) -> Self {
		self.key_encoding = encoding;
		self
	}

	pub fn with_symmetric(mut self, algorithm: SymmetricAlgorithm) -> Self {
		self.symmetric = algorithm;
		self
	}

	pub fn with_asymmetric(mut self, algorithm: AsymmetricAlgorithm) -> Self {
		self.asymmetric = algorithm;
		self
	}

	pub fn key_encoding(&self) -> Encoding {
		self.key_encoding
	}

	/// A fresh [`KeyChain`] rooted at the configured app key.
	///
	/// # Errors
	///
	/// [`Error::InvalidEncoding`] or [`Error::InvalidLength`] if `app_key` isn't a 32 byte key in
	/// `key_encoding`.
	#[tracing::instrument(level = "debug")]
	pub fn key_chain(&self) -> Result<KeyChain, Error> {
		KeyChain::import(self.app_key.as_bytes(), self.key_encoding)
	}

	pub fn symmetric_engine(&self) -> SymmetricEngine {
		SymmetricEngine::new(self.symmetric)
	}

	pub fn asymmetric_engine(&self) -> AsymmetricEngine {
		AsymmetricEngine::new(self.asymmetric)
	}
}

impl std::fmt::Debug for Config {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Config")
			.field("app_key", &"[REDACTED]")
			.field("key_encoding", &self.key_encoding)
			.field("symmetric", &self.symmetric)
			.field("asymmetric", &self.asymmetric)
			.finish()
	}
}

fn deserialize_secret<'de, D: serde::Deserializer<'de>>(
	d: D,
) -> Result<Zeroizing<String>, D::Error> {
	String::deserialize(d).map(Zeroizing::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{PublicMaterial as _, SecretMaterial as _, generate_key};

	#[test]
	fn defaults() {
		let key = generate_key().export_secret(Encoding::Base64Url).unwrap();
		let config: Config =
			serde_json::from_value(serde_json::json!({ "app_key": key.as_str() })).unwrap();

		assert_eq!(Encoding::Base64Url, config.key_encoding());
		assert_eq!(SymmetricAlgorithm::XChaCha20Poly1305, config.symmetric_engine().algorithm());
		assert_eq!(
			AsymmetricAlgorithm::X25519XChaCha20Poly1305,
			config.asymmetric_engine().algorithm()
		);
		assert!(config.key_chain().is_ok());
	}

	#[test]
	fn everything_set() {
		let key = generate_key();
		let config: Config = serde_json::from_value(serde_json::json!({
			"app_key": key.export_secret(Encoding::Hex).unwrap().as_str(),
			"key_encoding": "hex",
			"symmetric": "aes-256-gcm",
			"asymmetric": "x25519-xsalsa20-poly1305",
		}))
		.unwrap();

		assert_eq!(SymmetricAlgorithm::Aes256Gcm, config.symmetric_engine().algorithm());
		assert_eq!(
			AsymmetricAlgorithm::X25519XSalsa20Poly1305,
			config.asymmetric_engine().algorithm()
		);

		let keys = config.key_chain().unwrap();
		assert_eq!(
			key.expose_secret().unwrap(),
			keys.shared(None).unwrap().expose_secret().unwrap()
		);
	}

	#[test]
	fn builder_matches_deserialized() {
		let key = generate_key().export_secret(Encoding::Base64).unwrap();
		let config = Config::new(key.as_str())
			.with_key_encoding(Encoding::Base64)
			.with_symmetric(SymmetricAlgorithm::XChaCha20Blake2b)
			.with_asymmetric(AsymmetricAlgorithm::X25519XChaCha20Blake2b);

		let a = config.key_chain().unwrap();
		let b = config.key_chain().unwrap();
		assert_eq!(
			a.signature().unwrap().public().as_bytes(),
			b.signature().unwrap().public().as_bytes()
		);
		assert_eq!(
			SymmetricAlgorithm::XChaCha20Blake2b,
			config.symmetric_engine().algorithm()
		);
	}

	#[test]
	fn bad_configs() {
		assert!(serde_json::from_str::<Config>("{}").is_err());
		assert!(serde_json::from_str::<Config>(r#"{"app_key":"x","symmetric":"rot13"}"#).is_err());
		assert!(serde_json::from_str::<Config>(r#"{"app_key":"x","colour":"blue"}"#).is_err());

		assert!(matches!(
			Config::new("AAAA").key_chain(),
			Err(Error::InvalidLength {
				expected: 32,
				actual: 3
			})
		));
		assert!(matches!(
			Config::new("not base64!").key_chain(),
			Err(Error::InvalidEncoding { .. })
		));
	}

	#[test]
	fn debug_hides_the_key() {
		let key = generate_key().export_secret(Encoding::Hex).unwrap();
		let config = Config::new(key.as_str()).with_key_encoding(Encoding::Hex);

		assert!(!format!("{config:?}").contains(key.as_str()));
	}
}
