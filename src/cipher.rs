//! The raw primitives behind every [`SymmetricAlgorithm`].
//!
//! Nothing in here knows about envelopes; it's "key + nonce + bytes in, bytes out".  The
//! functions that open ciphertexts return `None` for *every* failure, so that callers can't
//! accidentally turn a failure reason into an oracle.
use aes_gcm::Aes256Gcm;
use blake2::Blake2bMac;
use chacha20::{
	XChaCha20,
	cipher::{KeyIvInit as _, StreamCipher as _},
};
use chacha20poly1305::{
	KeyInit, XChaCha20Poly1305,
	aead::{Aead as _, Payload, generic_array::GenericArray},
};
use crypto_secretbox::XSalsa20Poly1305;
use hmac::{Hmac, Mac as _};
use sha2::{Sha256, Sha512};
use typenum::{U32, U56};
use zeroize::Zeroizing;

use super::{Error, SymmetricAlgorithm, paseto::pae};

/// Size of every MAC produced by [`mac`].
pub(crate) const MAC_SIZE: usize = 32;

/// Encrypt `plaintext`; `nonce` must be exactly `algorithm.nonce_bytes()` long.
pub(crate) fn seal(
	algorithm: SymmetricAlgorithm,
	key: &[u8; 32],
	nonce: &[u8],
	plaintext: &[u8],
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	if nonce.len() != algorithm.nonce_bytes() {
		return Err(Error::insanity(format!(
			"{algorithm} nonce must be {} bytes, got {}",
			algorithm.nonce_bytes(),
			nonce.len()
		)));
	}

	let payload = Payload {
		msg: plaintext,
		aad,
	};

	match algorithm {
		SymmetricAlgorithm::XChaCha20Blake2b => {
			xchacha20_blake2b::seal(key, nonce, plaintext, &[nonce], &[aad])
		}
		SymmetricAlgorithm::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.into())
			.encrypt(GenericArray::from_slice(nonce), payload)
			.map_err(|_| Error::Encryption),
		SymmetricAlgorithm::XSalsa20Poly1305 => {
			let message_key = xsalsa20_message_key(key, aad)?;
			XSalsa20Poly1305::new((&*message_key).into())
				.encrypt(GenericArray::from_slice(nonce), plaintext)
				.map_err(|_| Error::Encryption)
		}
		SymmetricAlgorithm::Aes256Gcm => Aes256Gcm::new(key.into())
			.encrypt(GenericArray::from_slice(nonce), payload)
			.map_err(|_| Error::Encryption),
	}
}

/// Decrypt `ciphertext` (which includes the authentication tag).
pub(crate) fn open(
	algorithm: SymmetricAlgorithm,
	key: &[u8; 32],
	nonce: &[u8],
	ciphertext: &[u8],
	aad: &[u8],
) -> Option<Vec<u8>> {
	if nonce.len() != algorithm.nonce_bytes() || ciphertext.len() < algorithm.tag_bytes() {
		tracing::debug!(
			%algorithm,
			nonce_len = nonce.len(),
			ct_len = ciphertext.len(),
			"Malformed ciphertext"
		);
		return None;
	}

	let payload = Payload {
		msg: ciphertext,
		aad,
	};

	let result = match algorithm {
		SymmetricAlgorithm::XChaCha20Blake2b => {
			return xchacha20_blake2b::open(key, nonce, ciphertext, &[nonce], &[aad]);
		}
		SymmetricAlgorithm::XChaCha20Poly1305 => XChaCha20Poly1305::new(key.into())
			.decrypt(GenericArray::from_slice(nonce), payload),
		SymmetricAlgorithm::XSalsa20Poly1305 => {
			let message_key = xsalsa20_message_key(key, aad).ok()?;
			XSalsa20Poly1305::new((&*message_key).into())
				.decrypt(GenericArray::from_slice(nonce), ciphertext)
		}
		SymmetricAlgorithm::Aes256Gcm => {
			Aes256Gcm::new(key.into()).decrypt(GenericArray::from_slice(nonce), payload)
		}
	};

	result
		.inspect_err(|_| tracing::debug!(%algorithm, "Authentication failed"))
		.ok()
}

/// Compute a MAC of `message` with the MAC that goes with `algorithm`.
pub(crate) fn mac(
	algorithm: SymmetricAlgorithm,
	key: &[u8; 32],
	message: &[u8],
) -> Result<[u8; MAC_SIZE], Error> {
	match algorithm {
		SymmetricAlgorithm::XChaCha20Blake2b => blake2b_mac_32(key, &[b"mac".as_slice(), message]),
		// HMAC-SHA-512/256, same as libsodium's crypto_auth
		SymmetricAlgorithm::XChaCha20Poly1305 | SymmetricAlgorithm::XSalsa20Poly1305 => {
			let mut mac = <Hmac<Sha512> as KeyInit>::new_from_slice(key)
				.map_err(|_| Error::insanity("HMAC refused a 32 byte key"))?;
			mac.update(message);

			let mut out = [0u8; MAC_SIZE];
			out.copy_from_slice(&mac.finalize().into_bytes()[..MAC_SIZE]);
			Ok(out)
		}
		SymmetricAlgorithm::Aes256Gcm => {
			let mut mac = <Hmac<Sha256> as KeyInit>::new_from_slice(key)
				.map_err(|_| Error::insanity("HMAC refused a 32 byte key"))?;
			mac.update(message);

			let mut out = [0u8; MAC_SIZE];
			out.copy_from_slice(&mac.finalize().into_bytes());
			Ok(out)
		}
	}
}

/// Keyed BLAKE2b with a 32 byte output, over the concatenation of `pieces`.
pub(crate) fn blake2b_mac_32(key: &[u8], pieces: &[&[u8]]) -> Result<[u8; 32], Error> {
	let mut mac = <Blake2bMac<U32> as KeyInit>::new_from_slice(key)
		.map_err(|_| Error::insanity("BLAKE2b key too long"))?;

	for piece in pieces {
		mac.update(piece);
	}

	let mut out = [0u8; 32];
	out.copy_from_slice(&mac.finalize().into_bytes());

	Ok(out)
}

fn blake2b_mac_56(key: &[u8], pieces: &[&[u8]]) -> Result<Zeroizing<[u8; 56]>, Error> {
	let mut mac = <Blake2bMac<U56> as KeyInit>::new_from_slice(key)
		.map_err(|_| Error::insanity("BLAKE2b key too long"))?;

	for piece in pieces {
		mac.update(piece);
	}

	let mut out = Zeroizing::new([0u8; 56]);
	out.copy_from_slice(&mac.finalize().into_bytes());

	Ok(out)
}

// XSalsa20-Poly1305 has no room for associated data, so we bind it into the key instead
fn xsalsa20_message_key(key: &[u8; 32], aad: &[u8]) -> Result<Zeroizing<[u8; 32]>, Error> {
	blake2b_mac_32(
		key,
		&[b"xsalsa20poly1305-aad".as_slice(), pae(&[aad]).as_slice()],
	)
	.map(Zeroizing::new)
}

/// Encrypt-then-MAC with XChaCha20 and keyed BLAKE2b.
///
/// Each 32 byte nonce yields its own encryption key, XChaCha20 nonce and authentication key.  The
/// tag is keyed BLAKE2b over the pre-authentication encoding of the ciphertext and whatever
/// else the caller wants bound to it; v4.local PASETO tokens use exactly this construction.
pub(crate) mod xchacha20_blake2b {
	use super::*;

	pub(crate) const NONCE_SIZE: usize = 32;
	pub(crate) const TAG_SIZE: usize = 32;

	const ENCRYPTION_KEY_LABEL: &[u8] = b"paseto-encryption-key";
	const AUTH_KEY_LABEL: &[u8] = b"paseto-auth-key-for-aead";

	struct SubKeys {
		encryption_key: Zeroizing<[u8; 32]>,
		stream_nonce: [u8; 24],
		auth_key: Zeroizing<[u8; 32]>,
	}

	fn split(key: &[u8; 32], nonce: &[u8]) -> Result<SubKeys, Error> {
		let tmp = blake2b_mac_56(key, &[ENCRYPTION_KEY_LABEL, nonce])?;

		let mut encryption_key = Zeroizing::new([0u8; 32]);
		encryption_key.copy_from_slice(&tmp[..32]);
		let mut stream_nonce = [0u8; 24];
		stream_nonce.copy_from_slice(&tmp[32..]);

		let auth_key = Zeroizing::new(blake2b_mac_32(key, &[AUTH_KEY_LABEL, nonce])?);

		Ok(SubKeys {
			encryption_key,
			stream_nonce,
			auth_key,
		})
	}

	fn tag(
		keys: &SubKeys,
		before: &[&[u8]],
		ciphertext: &[u8],
		after: &[&[u8]],
	) -> Result<[u8; TAG_SIZE], Error> {
		let mut pieces = before.to_vec();
		pieces.push(ciphertext);
		pieces.extend_from_slice(after);

		blake2b_mac_32(&keys.auth_key[..], &[pae(&pieces).as_slice()])
	}

	/// Returns `ciphertext || tag`, where the tag covers `PAE(before.., ciphertext, after..)`.
	pub(crate) fn seal(
		key: &[u8; 32],
		nonce: &[u8],
		plaintext: &[u8],
		before: &[&[u8]],
		after: &[&[u8]],
	) -> Result<Vec<u8>, Error> {
		let keys = split(key, nonce)?;

		let mut out = plaintext.to_vec();
		XChaCha20::new((&*keys.encryption_key).into(), (&keys.stream_nonce).into())
			.apply_keystream(&mut out);

		let t = tag(&keys, before, &out, after)?;
		out.extend_from_slice(&t);

		Ok(out)
	}

	pub(crate) fn open(
		key: &[u8; 32],
		nonce: &[u8],
		ciphertext: &[u8],
		before: &[&[u8]],
		after: &[&[u8]],
	) -> Option<Vec<u8>> {
		if ciphertext.len() < TAG_SIZE {
			return None;
		}

		let (body, t) = ciphertext.split_at(ciphertext.len() - TAG_SIZE);
		let keys = split(key, nonce).ok()?;
		let expected = tag(&keys, before, body, after).ok()?;

		if !constant_time_eq::constant_time_eq(&expected, t) {
			tracing::debug!("Authentication failed");
			return None;
		}

		let mut out = body.to_vec();
		XChaCha20::new((&*keys.encryption_key).into(), (&keys.stream_nonce).into())
			.apply_keystream(&mut out);

		Some(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn seal_then_open() {
		let key = [7u8; 32];

		for alg in SymmetricAlgorithm::ALL {
			let nonce = vec![1u8; alg.nonce_bytes()];
			let ct = seal(alg, &key, &nonce, b"plaintext", b"aad").unwrap();
			assert_eq!(b"plaintext".len() + alg.tag_bytes(), ct.len(), "{alg}");
			assert_eq!(
				Some(b"plaintext".to_vec()),
				open(alg, &key, &nonce, &ct, b"aad"),
				"{alg}"
			);
			assert_eq!(None, open(alg, &key, &nonce, &ct, b"other aad"), "{alg}");
			assert_eq!(None, open(alg, &[8u8; 32], &nonce, &ct, b"aad"), "{alg}");
		}
	}

	#[test]
	fn wrong_nonce_length_is_a_bug() {
		let result = seal(SymmetricAlgorithm::Aes256Gcm, &[0u8; 32], &[0u8; 24], b"", b"");
		assert!(matches!(result, Err(Error::Insanity(_))));

		assert_eq!(
			None,
			open(SymmetricAlgorithm::Aes256Gcm, &[0u8; 32], &[0u8; 24], &[0u8; 32], b"")
		);
	}

	#[test]
	fn macs_depend_on_key_and_message() {
		for alg in SymmetricAlgorithm::ALL {
			let m1 = mac(alg, &[1u8; 32], b"message").unwrap();
			assert_eq!(m1, mac(alg, &[1u8; 32], b"message").unwrap());
			assert_ne!(m1, mac(alg, &[2u8; 32], b"message").unwrap());
			assert_ne!(m1, mac(alg, &[1u8; 32], b"massage").unwrap());
		}
	}
}
