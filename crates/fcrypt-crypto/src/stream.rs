//! AES-CTR + HMAC-SHA256 authenticated streaming
//!
//! Wire construction: `ciphertext ‖ HMAC-SHA256(iv ‖ ciphertext)`. The IV
//! itself is not part of the stream; the caller persists it (and the HKDF
//! salt) next to the ciphertext.
//!
//! Encryption and authentication keys must be distinct. The derivation in
//! [`crate::kdf`] guarantees that through its info labels; these functions
//! still refuse equal keys outright.

use std::io::{self, Read, Write};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::ctr::AesCtr;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_keys_from_master_key, derive_keys_from_master_key_with_salt};
use crate::tail::TailReader;
use crate::{generate_aes_iv, AES_BLOCK_SIZE, HKDF_SALT_SIZE, HMAC_TAG_SIZE, STREAM_BUF_SIZE};

type HmacSha256 = Hmac<Sha256>;

fn keys_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

fn new_mac(auth_key: &[u8], iv: &[u8]) -> CryptoResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(auth_key).map_err(|_| CryptoError::KeySizeInvalid)?;
    mac.update(iv);
    Ok(mac)
}

fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Encrypt `reader` to `writer`, appending the 32-byte HMAC tag after EOF.
///
/// Returns the number of payload bytes processed (the tag not included).
pub fn encrypt_stream_authenticated<R: Read, W: Write>(
    key: &[u8],
    iv: &[u8],
    auth_key: &[u8],
    mut reader: R,
    mut writer: W,
) -> CryptoResult<u64> {
    if keys_equal(key, auth_key) {
        return Err(CryptoError::AuthenticationKeyReused);
    }
    let mut stream = AesCtr::new(key, iv)?;
    let mut mac = new_mac(auth_key, iv)?;

    let mut buf = [0u8; STREAM_BUF_SIZE];
    let mut processed: u64 = 0;
    loop {
        let n = read_chunk(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        stream.apply_keystream(&mut buf[..n]);
        mac.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        processed += n as u64;
    }
    writer.write_all(&mac.finalize().into_bytes())?;
    Ok(processed)
}

/// Decrypt `reader` to `writer`, verifying the trailing HMAC tag.
///
/// The tag comparison happens after the whole stream has been written out;
/// on [`CryptoError::AuthenticationFailed`] the caller must discard
/// everything it already received.
pub fn decrypt_stream_authenticated<R: Read, W: Write>(
    key: &[u8],
    iv: &[u8],
    auth_key: &[u8],
    reader: R,
    mut writer: W,
) -> CryptoResult<u64> {
    if keys_equal(key, auth_key) {
        return Err(CryptoError::AuthenticationKeyReused);
    }
    let mut stream = AesCtr::new(key, iv)?;
    let mut mac = new_mac(auth_key, iv)?;
    let mut tail_reader = TailReader::new(reader, HMAC_TAG_SIZE);

    let mut buf = [0u8; STREAM_BUF_SIZE];
    let mut processed: u64 = 0;
    loop {
        let n = read_chunk(&mut tail_reader, &mut buf)?;
        if n == 0 {
            break;
        }
        mac.update(&buf[..n]);
        stream.apply_keystream(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        processed += n as u64;
    }
    let tag = tail_reader.tail()?;
    mac.verify_slice(&tag)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    Ok(processed)
}

/// Lazy plaintext reader over an authenticated ciphertext stream that does
/// **not** verify the trailing tag.
///
/// The withheld tag bytes never reach the consumer, but nothing checks
/// them either: every byte read through this adapter is unauthenticated.
/// Use [`decrypt_stream_authenticated`] wherever integrity matters.
pub struct DecryptReader<R> {
    inner: TailReader<R>,
    stream: AesCtr,
}

impl<R: Read> DecryptReader<R> {
    pub fn new(reader: R, key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        Ok(Self {
            inner: TailReader::new(reader, HMAC_TAG_SIZE),
            stream: AesCtr::new(key, iv)?,
        })
    }
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.stream.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

/// One-shot authenticated encryption of a buffer under a master key.
///
/// Output: `salt (32) ‖ iv (16) ‖ ciphertext ‖ tag (32)`; the subkeys are
/// derived from the master key with a fresh salt.
pub fn aes_ctr_encrypt_authenticated(master_key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let (keys, salt) = derive_keys_from_master_key(master_key, &[32, 16])?;
    let iv = generate_aes_iv()?;

    let mut out = Vec::with_capacity(HKDF_SALT_SIZE + AES_BLOCK_SIZE + plaintext.len() + HMAC_TAG_SIZE);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    encrypt_stream_authenticated(&keys[0], &iv, &keys[1], plaintext, &mut out)?;
    Ok(out)
}

/// Inverse of [`aes_ctr_encrypt_authenticated`].
pub fn aes_ctr_decrypt_authenticated(
    master_key: &[u8],
    data: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if data.len() < HKDF_SALT_SIZE + AES_BLOCK_SIZE + HMAC_TAG_SIZE {
        return Err(CryptoError::InvalidLength);
    }
    let (salt, rest) = data.split_at(HKDF_SALT_SIZE);
    let (iv, ciphertext) = rest.split_at(AES_BLOCK_SIZE);
    let keys = derive_keys_from_master_key_with_salt(master_key, salt, &[32, 16])?;

    let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext.len() - HMAC_TAG_SIZE));
    decrypt_stream_authenticated(&keys[0], iv, &keys[1], ciphertext, &mut *plaintext)?;
    Ok(plaintext)
}
