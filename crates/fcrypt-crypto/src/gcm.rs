//! AES-GCM wrapping for slot contents
//!
//! When the caller passes no nonce, a fresh 96-bit nonce is drawn and the
//! output is `[12-byte nonce][ciphertext][16-byte tag]`; with an explicit
//! nonce the output is `[ciphertext][16-byte tag]` and the caller keeps the
//! nonce. Open mirrors seal in both modes.

use aes::Aes192;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
};
use cipher::consts::U12;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::{AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE};

type Aes192Gcm = AesGcm<Aes192, U12>;

enum AesGcmCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl AesGcmCipher {
    fn new(key: &[u8]) -> CryptoResult<Self> {
        match key.len() {
            16 => Ok(Self::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            24 => Ok(Self::Aes192(
                Aes192Gcm::new_from_slice(key).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            32 => Ok(Self::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::KeySizeInvalid)?,
            )),
            _ => Err(CryptoError::KeySizeInvalid),
        }
    }

    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext),
            Self::Aes192(c) => c.encrypt(nonce, plaintext),
            Self::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|_| CryptoError::AeadInvalid)
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt(nonce, ciphertext),
            Self::Aes192(c) => c.decrypt(nonce, ciphertext),
            Self::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CryptoError::AeadInvalid)
    }
}

/// Seal `plaintext` under an AES-GCM key of 16, 24, or 32 bytes.
///
/// `nonce: None` draws a random nonce and prepends it to the result;
/// `nonce: Some(..)` must be exactly 12 bytes and is not included in the
/// result.
pub fn aes_gcm_seal(key: &[u8], nonce: Option<&[u8]>, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = AesGcmCipher::new(key)?;
    match nonce {
        Some(nonce) => {
            if nonce.len() != AES_GCM_NONCE_SIZE {
                return Err(CryptoError::IvMissingOrInvalid);
            }
            cipher.encrypt(nonce, plaintext)
        }
        None => {
            let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
            OsRng.try_fill_bytes(&mut nonce)?;
            let ciphertext = cipher.encrypt(&nonce, plaintext)?;
            let mut out = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
            out.extend_from_slice(&nonce);
            out.extend_from_slice(&ciphertext);
            Ok(out)
        }
    }
}

/// Open data sealed by [`aes_gcm_seal`].
///
/// `nonce: None` expects the nonce prepended to `data`. Any tag mismatch
/// is reported as [`CryptoError::AeadInvalid`] without distinguishing a
/// wrong key from corruption.
pub fn aes_gcm_open(
    key: &[u8],
    nonce: Option<&[u8]>,
    data: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let cipher = AesGcmCipher::new(key)?;
    let plaintext = match nonce {
        Some(nonce) => {
            if nonce.len() != AES_GCM_NONCE_SIZE {
                return Err(CryptoError::IvMissingOrInvalid);
            }
            cipher.decrypt(nonce, data)?
        }
        None => {
            if data.len() < AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE {
                return Err(CryptoError::AeadInvalid);
            }
            let (nonce, ciphertext) = data.split_at(AES_GCM_NONCE_SIZE);
            cipher.decrypt(nonce, ciphertext)?
        }
    };
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip_embedded_nonce() {
        let key = [7u8; 16];
        let sealed = aes_gcm_seal(&key, None, b"root key material").unwrap();
        assert_eq!(
            sealed.len(),
            AES_GCM_NONCE_SIZE + 17 + AES_GCM_TAG_SIZE,
            "nonce + plaintext + tag"
        );
        let opened = aes_gcm_open(&key, None, &sealed).unwrap();
        assert_eq!(&*opened, b"root key material");
    }

    #[test]
    fn seal_open_roundtrip_explicit_nonce() {
        let key = [9u8; 32];
        let nonce = [3u8; 12];
        let sealed = aes_gcm_seal(&key, Some(&nonce), b"payload").unwrap();
        assert_eq!(sealed.len(), 7 + AES_GCM_TAG_SIZE);
        let opened = aes_gcm_open(&key, Some(&nonce), &sealed).unwrap();
        assert_eq!(&*opened, b"payload");
    }

    #[test]
    fn open_wrong_key_fails() {
        let sealed = aes_gcm_seal(&[1u8; 16], None, b"secret").unwrap();
        let result = aes_gcm_open(&[2u8; 16], None, &sealed);
        assert!(matches!(result, Err(CryptoError::AeadInvalid)));
    }

    #[test]
    fn open_tampered_ciphertext_fails() {
        let key = [1u8; 16];
        let mut sealed = aes_gcm_seal(&key, None, b"secret").unwrap();
        sealed[AES_GCM_NONCE_SIZE] ^= 0x01;
        assert!(matches!(
            aes_gcm_open(&key, None, &sealed),
            Err(CryptoError::AeadInvalid)
        ));
    }

    #[test]
    fn open_truncated_input_fails() {
        let key = [1u8; 16];
        assert!(matches!(
            aes_gcm_open(&key, None, &[0u8; 10]),
            Err(CryptoError::AeadInvalid)
        ));
    }

    #[test]
    fn bad_key_size_rejected() {
        assert!(matches!(
            aes_gcm_seal(&[0u8; 17], None, b"x"),
            Err(CryptoError::KeySizeInvalid)
        ));
    }

    #[test]
    fn bad_nonce_size_rejected() {
        assert!(matches!(
            aes_gcm_seal(&[0u8; 16], Some(&[0u8; 16]), b"x"),
            Err(CryptoError::IvMissingOrInvalid)
        ));
    }

    #[test]
    fn all_key_sizes_supported() {
        for size in [16usize, 24, 32] {
            let key = vec![0x42u8; size];
            let sealed = aes_gcm_seal(&key, None, b"k").unwrap();
            let opened = aes_gcm_open(&key, None, &sealed).unwrap();
            assert_eq!(&*opened, b"k");
        }
    }
}
