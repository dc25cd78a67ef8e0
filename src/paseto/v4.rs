//! Version 4 PASETO tokens.
//!
//! `v4.local` tokens are encrypted with XChaCha20 and authenticated with keyed BLAKE2b;
//! `v4.public` tokens are signed with Ed25519.  Both can carry a footer (readable by anyone, but
//! authenticated) and bind an *implicit assertion*, which isn't stored in the token at all but
//! has to be supplied again to check it.
use ed25519_dalek::Signer as _;
use rand::{RngCore as _, rng};

use super::{Purpose, Token, Version, header, pae};
use crate::{Error, SharedKey, SignatureKeyPair, SignaturePublicKey, cipher::xchacha20_blake2b};

const SIGNATURE_SIZE: usize = 64;

/// Encrypt `message` into a `v4.local` token.
#[tracing::instrument(level = "debug", skip(key, message, footer, implicit_assertion))]
pub fn encrypt(
	key: &SharedKey,
	message: impl AsRef<[u8]>,
	footer: impl AsRef<[u8]>,
	implicit_assertion: impl AsRef<[u8]>,
) -> Result<Token, Error> {
	let h = header(Version::V4, Purpose::Local);

	let mut nonce = [0u8; xchacha20_blake2b::NONCE_SIZE];
	rng().fill_bytes(&mut nonce);

	let sealed = xchacha20_blake2b::seal(
		key.expose_secret()?,
		&nonce,
		message.as_ref(),
		&[h.as_bytes(), &nonce],
		&[footer.as_ref(), implicit_assertion.as_ref()],
	)?;

	let mut payload = Vec::with_capacity(nonce.len() + sealed.len());
	payload.extend_from_slice(&nonce);
	payload.extend_from_slice(&sealed);

	Token::new(Version::V4, Purpose::Local, payload, footer)
}

/// Decrypt a `v4.local` token.
///
/// Returns `Ok(None)` if the token doesn't authenticate under `key` (including when the
/// implicit assertion differs from the one it was made with).
///
/// # Errors
///
/// [`Error::UnsupportedAlgorithm`] if `token` isn't a `v4.local` token.
#[tracing::instrument(level = "debug", skip(key, token, implicit_assertion))]
pub fn decrypt(
	key: &SharedKey,
	token: &Token,
	implicit_assertion: impl AsRef<[u8]>,
) -> Result<Option<Vec<u8>>, Error> {
	check_header(token, Purpose::Local)?;
	let key = key.expose_secret()?;

	let Some((payload, footer)) = decode(token) else {
		return Ok(None);
	};

	if payload.len() < xchacha20_blake2b::NONCE_SIZE + xchacha20_blake2b::TAG_SIZE {
		tracing::debug!(len = payload.len(), "Token payload too short");
		return Ok(None);
	}

	let (nonce, ciphertext) = payload.split_at(xchacha20_blake2b::NONCE_SIZE);
	let h = token.header();

	Ok(xchacha20_blake2b::open(
		key,
		nonce,
		ciphertext,
		&[h.as_bytes(), nonce],
		&[footer, implicit_assertion.as_ref()],
	))
}

/// Sign `message` into a `v4.public` token.  The message is *not* encrypted.
#[tracing::instrument(level = "debug", skip(keypair, message, footer, implicit_assertion))]
pub fn sign(
	keypair: &SignatureKeyPair,
	message: impl AsRef<[u8]>,
	footer: impl AsRef<[u8]>,
	implicit_assertion: impl AsRef<[u8]>,
) -> Result<Token, Error> {
	let h = header(Version::V4, Purpose::Public);
	let message = message.as_ref();

	let m2 = pae(&[
		h.as_bytes(),
		message,
		footer.as_ref(),
		implicit_assertion.as_ref(),
	]);
	let signature = keypair.signing_key()?.sign(&m2);

	let mut payload = Vec::with_capacity(message.len() + SIGNATURE_SIZE);
	payload.extend_from_slice(message);
	payload.extend_from_slice(&signature.to_bytes());

	Token::new(Version::V4, Purpose::Public, payload, footer)
}

/// Check a `v4.public` token, and return the message it carries if the signature is good.
///
/// # Errors
///
/// [`Error::UnsupportedAlgorithm`] if `token` isn't a `v4.public` token.
#[tracing::instrument(level = "debug", skip(token, implicit_assertion))]
pub fn verify(
	public_key: &SignaturePublicKey,
	token: &Token,
	implicit_assertion: impl AsRef<[u8]>,
) -> Result<Option<Vec<u8>>, Error> {
	check_header(token, Purpose::Public)?;

	let Some((payload, footer)) = decode(token) else {
		return Ok(None);
	};

	if payload.len() < SIGNATURE_SIZE {
		tracing::debug!(len = payload.len(), "Token payload too short");
		return Ok(None);
	}

	let (message, signature) = payload.split_at(payload.len() - SIGNATURE_SIZE);
	let signature = ed25519_dalek::Signature::from_slice(signature)
		.map_err(|e| Error::insanity(format!("64 byte signature refused: {e}")))?;

	let h = token.header();
	let m2 = pae(&[h.as_bytes(), message, footer, implicit_assertion.as_ref()]);

	match public_key.dalek()?.verify_strict(&m2, &signature) {
		Ok(()) => Ok(Some(message.to_vec())),
		Err(e) => {
			tracing::debug!(%e, "Token signature verification failed");
			Ok(None)
		}
	}
}

fn check_header(token: &Token, purpose: Purpose) -> Result<(), Error> {
	if token.version() == Version::V4 && token.purpose() == purpose {
		Ok(())
	} else {
		Err(Error::unsupported_algorithm(format!(
			"expected v4.{purpose} token, got {}",
			token.header()
		)))
	}
}

fn decode(token: &Token) -> Option<(Vec<u8>, &[u8])> {
	let payload = token
		.decode_payload()
		.inspect_err(|_| tracing::debug!("Token payload is not valid base64url"))
		.ok()?;
	let footer = token
		.footer()
		.inspect_err(|_| tracing::debug!("Token footer is not valid base64url"))
		.ok()?;

	Some((payload, footer))
}
