use hkdf::Hkdf;
use sha2::Sha256;

use super::{Error, SharedKey};

/// Derive a new key from `key`, for the purpose described by `context`.
pub(crate) fn derive_key(key: &SharedKey, context: &[u8]) -> Result<SharedKey, Error> {
	let hk = Hkdf::<Sha256>::from_prk(key.expose_secret()?)
		.map_err(|_| Error::insanity("key not long enough"))?;

	let mut output = Box::new([0u8; 32]);

	hk.expand(context, &mut output[..])
		.map_err(|_| Error::insanity("KBKDF assploded"))?;

	Ok(output.into())
}

/// Turn a non-uniform secret (such as a Diffie-Hellman output) into a key.
pub(crate) fn extract_and_expand(
	secret: &[u8],
	salt: &[u8],
	context: &[u8],
) -> Result<SharedKey, Error> {
	let hk = Hkdf::<Sha256>::new(Some(salt), secret);

	let mut output = Box::new([0u8; 32]);

	hk.expand(context, &mut output[..])
		.map_err(|_| Error::insanity("KBKDF assploded"))?;

	Ok(output.into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::generate_key;

	#[test]
	fn derivation_is_deterministic() {
		let root = generate_key();

		let a = derive_key(&root, b"a").unwrap();
		let a_again = derive_key(&root, b"a").unwrap();
		let b = derive_key(&root, b"b").unwrap();

		assert_eq!(a.expose_secret().unwrap(), a_again.expose_secret().unwrap());
		assert_ne!(a.expose_secret().unwrap(), b.expose_secret().unwrap());
	}

	#[test]
	fn extraction_depends_on_salt() {
		let a = extract_and_expand(b"secret", b"salt one", b"ctx").unwrap();
		let b = extract_and_expand(b"secret", b"salt two", b"ctx").unwrap();

		assert_ne!(a.expose_secret().unwrap(), b.expose_secret().unwrap());
	}
}
