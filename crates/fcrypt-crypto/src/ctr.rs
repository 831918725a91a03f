//! Resumable AES-CTR keystream
//!
//! CTR is an XOR stream: applying the same keystream twice restores the
//! input, so encryption and decryption share one code path.

use aes::{Aes128, Aes192, Aes256};
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

use crate::error::{CryptoError, CryptoResult};
use crate::AES_BLOCK_SIZE;

/// An AES-CTR keystream over a 128/192/256-bit key, resumable across
/// arbitrary chunk boundaries.
pub enum AesCtr {
    Aes128(Ctr128BE<Aes128>),
    Aes192(Ctr128BE<Aes192>),
    Aes256(Ctr128BE<Aes256>),
}

impl AesCtr {
    /// Build a keystream from a 16/24/32-byte key and a 16-byte initial
    /// counter block.
    pub fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        if iv.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::IvMissingOrInvalid);
        }
        match key.len() {
            16 => Ok(Self::Aes128(
                Ctr128BE::new_from_slices(key, iv).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            24 => Ok(Self::Aes192(
                Ctr128BE::new_from_slices(key, iv).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            32 => Ok(Self::Aes256(
                Ctr128BE::new_from_slices(key, iv).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            _ => Err(CryptoError::KeySizeInvalid),
        }
    }

    /// XOR the next keystream bytes into `buf` in place.
    pub fn apply_keystream(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.apply_keystream(buf),
            Self::Aes192(c) => c.apply_keystream(buf),
            Self::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

/// One-shot XOR of a whole buffer. Running it again with the same key and
/// IV undoes it.
pub fn aes_ctr_xor(key: &[u8], iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
    AesCtr::new(key, iv)?.apply_keystream(buf);
    Ok(())
}
