//! Authenticated encryption, signatures, key management and tokens, with as few ways to hold it
//! wrong as we could manage.
//!
//! If you want to encrypt something, sign something, or hand out a token, and you'd rather not
//! have to know which nonce size goes with which cipher, then this crate is for you.
//!
//! The pieces fit together like this:
//!
//! * A [`KeyChain`] is built from a single root secret (the "app key", typically read from
//!   configuration via [`Config`]), and derives every other key your application needs:
//!   purpose-specific [`SharedKey`]s, an [`EncryptionKeyPair`] and a [`SignatureKeyPair`].
//!
//! * A [`SymmetricEngine`] encrypts, decrypts, signs and verifies with a [`SharedKey`].  Every
//!   encryption takes *additional data*, which isn't encrypted but must be supplied, unchanged, to
//!   decrypt.
//!   [This Security StackExchange answer](https://security.stackexchange.com/a/179279/167630)
//!   is an excellent explanation of why that's useful.  If for whatever reason you don't have any
//!   appropriate additional data, you can use `b""`, but remember that the same additional data
//!   must be specified for both encryption *and* decryption.
//!
//! * An [`AsymmetricEngine`] does public-key encryption between key pairs, Ed25519 signatures,
//!   and anonymous "sealed" messages, which anyone can send but only the recipient can read.  A
//!   [`MultipleRecipientMessageBox`] sends one message to many recipients at once.
//!
//! * The [`paseto`] module reads and writes PASETO tokens, and creates and checks `v4` tokens.
//!
//! Decryption and verification never tell you *why* something didn't decrypt or verify: a
//! ciphertext that's too short, one that's been tampered with, and one encrypted with a different
//! key all come back as `Ok(None)` (or `false`).  An `Err` always means something is wrong with
//! what *you* asked for, rather than with what someone sent you.
//!
//! Secret values live in [`SensitiveArray`]s and [`SensitiveVec`]s, which zero their memory when
//! they're dropped (or [wiped](SensitiveArray::wipe)), don't show up in `Debug` output, and can't
//! be serialized.  Public values implement [`PublicMaterial`] and can be exported freely; secret
//! ones implement [`SecretMaterial`], and have to be exported explicitly.
mod asymmetric;
mod cipher;
mod config;
mod encoding;
mod error;
mod hash;
mod kdf;
mod key;
mod key_id;
mod keychain;
mod keypair;
mod multi_recipient;
pub mod paseto;
mod sensitive;
mod symmetric;

pub use asymmetric::{AsymmetricAlgorithm, AsymmetricEngine, EncryptedMessageBox};
pub use config::Config;
pub use encoding::Encoding;
pub use error::Error;
pub use hash::{HashAlgorithm, HashInfo, MessageDigest};
pub use key::{KEY_SIZE, SharedKey, generate_key};
pub use key_id::KeyId;
pub use keychain::KeyChain;
pub use keypair::{
	EncryptionKeyPair, EncryptionPublicKey, Signature, SignatureKeyPair, SignaturePublicKey,
};
pub use multi_recipient::MultipleRecipientMessageBox;
pub use paseto::Token;
pub use sensitive::{PublicMaterial, SecretMaterial, SensitiveArray, SensitiveVec};
pub use symmetric::{CipherInfo, EncryptedMessage, Mac, SymmetricAlgorithm, SymmetricEngine};

use key_id::key_id;

#[cfg(test)]
pub(crate) fn test_init() {
	use std::sync::Once;
	use tracing_subscriber::{layer::SubscriberExt as _, registry::Registry};

	static INIT: Once = Once::new();

	INIT.call_once(|| {
		let layer = tracing_tree::HierarchicalLayer::default()
			.with_writer(tracing_subscriber::fmt::TestWriter::new())
			.with_indent_lines(true)
			.with_indent_amount(2)
			.with_targets(true);

		let sub = Registry::default().with(layer);
		// Doc-tests and other harnesses may have got there first
		let _ = tracing::subscriber::set_global_default(sub);
	});
}
