//! HKDF-SHA256 subkey derivation
//!
//! Each requested key is an independent HKDF expansion of the master key
//! with `info = "key-<i>"`, so the derived keys are pairwise unrelated even
//! though they share a salt.

use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::HKDF_SALT_SIZE;

/// HKDF-SHA256 output ceiling per expansion (255 blocks)
const MAX_DERIVED_KEY_SIZE: usize = 255 * 32;

/// Derive one subkey per entry of `key_sizes` under a fresh random 32-byte
/// salt. Returns the keys and the salt; the salt must be persisted for
/// [`derive_keys_from_master_key_with_salt`] to reproduce the keys.
pub fn derive_keys_from_master_key(
    master_key: &[u8],
    key_sizes: &[usize],
) -> CryptoResult<(Vec<Zeroizing<Vec<u8>>>, [u8; HKDF_SALT_SIZE])> {
    if master_key.is_empty() {
        return Err(CryptoError::InvalidLength);
    }
    let mut salt = [0u8; HKDF_SALT_SIZE];
    OsRng.try_fill_bytes(&mut salt)?;
    let keys = derive_keys_from_master_key_with_salt(master_key, &salt, key_sizes)?;
    Ok((keys, salt))
}

/// Derive one subkey per entry of `key_sizes` under a caller-supplied salt.
pub fn derive_keys_from_master_key_with_salt(
    master_key: &[u8],
    salt: &[u8],
    key_sizes: &[usize],
) -> CryptoResult<Vec<Zeroizing<Vec<u8>>>> {
    if master_key.is_empty() {
        return Err(CryptoError::InvalidLength);
    }
    let mut keys = Vec::with_capacity(key_sizes.len());
    for (i, &size) in key_sizes.iter().enumerate() {
        if size == 0 || size > MAX_DERIVED_KEY_SIZE {
            return Err(CryptoError::InvalidLength);
        }
        let info = format!("key-{i}");
        let hkdf = Hkdf::<Sha256>::new(Some(salt), master_key);
        let mut okm = Zeroizing::new(vec![0u8; size]);
        hkdf.expand(info.as_bytes(), &mut okm)
            .map_err(|_| CryptoError::InvalidLength)?;
        keys.push(okm);
    }
    Ok(keys)
}
