//! fcrypt-crypto: primitives behind the fcrypt container format
//!
//! Thin, testable wrappers over the RustCrypto stack:
//!
//! - `gcm`: AES-GCM key wrapping (`nonce ‖ ciphertext ‖ tag` framing)
//! - `ctr`: resumable AES-CTR keystream over 128/192/256-bit keys
//! - `kdf`: HKDF-SHA256 multi-subkey derivation with `"key-<i>"` labels
//! - `stream`: AES-CTR + HMAC-SHA256 authenticated streaming
//! - `tail`: reader adapter that withholds the trailing tag bytes
//!
//! Secrets returned by this crate are wrapped in [`Zeroizing`] so they are
//! wiped when dropped.

pub mod ctr;
pub mod error;
pub mod gcm;
pub mod kdf;
pub mod stream;
pub mod tail;

pub use ctr::{aes_ctr_xor, AesCtr};
pub use error::{CryptoError, CryptoResult};
pub use gcm::{aes_gcm_open, aes_gcm_seal};
pub use kdf::{derive_keys_from_master_key, derive_keys_from_master_key_with_salt};
pub use stream::{
    aes_ctr_decrypt_authenticated, aes_ctr_encrypt_authenticated, decrypt_stream_authenticated,
    encrypt_stream_authenticated, DecryptReader,
};
pub use tail::TailReader;

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// AES block size, also the CTR IV size (16 bytes)
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-GCM nonce size (96-bit)
pub const AES_GCM_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size
pub const AES_GCM_TAG_SIZE: usize = 16;

/// HMAC-SHA256 tag size
pub const HMAC_TAG_SIZE: usize = 32;

/// HKDF salt size (one SHA-256 block of output)
pub const HKDF_SALT_SIZE: usize = 32;

/// Chunk size for streaming operations, aligned to a page
pub const STREAM_BUF_SIZE: usize = 4096;

/// Fill a buffer of `len` cryptographically secure random bytes.
///
/// Fails only when the OS RNG does, or when `len` is zero.
pub fn generate_random_bytes(len: usize) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if len == 0 {
        return Err(CryptoError::InvalidLength);
    }
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Generate a random initial counter block for AES-CTR.
pub fn generate_aes_iv() -> CryptoResult<[u8; AES_BLOCK_SIZE]> {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    OsRng.try_fill_bytes(&mut iv)?;
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_differ() {
        let a = generate_random_bytes(32).unwrap();
        let b = generate_random_bytes(32).unwrap();
        assert_ne!(*a, *b, "two random draws must differ");
    }

    #[test]
    fn random_zero_length_rejected() {
        assert!(matches!(
            generate_random_bytes(0),
            Err(CryptoError::InvalidLength)
        ));
    }

    #[test]
    fn iv_has_block_size() {
        let iv = generate_aes_iv().unwrap();
        assert_eq!(iv.len(), AES_BLOCK_SIZE);
    }
}
