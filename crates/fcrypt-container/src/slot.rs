//! Key slots: the root key wrapped under a user-supplied key
//!
//! On-disk slot layout (all integers big-endian):
//! ```text
//! [2 bytes: algorithm][2 bytes: flags][2 bytes: size][size bytes: content]
//! ```
//! `content` is the AES-GCM sealed root key, `nonce ‖ ciphertext ‖ tag`.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::alg::{SlotAlgorithm, SLOT_ALG_SENTINEL};
use crate::error::{ContainerError, ContainerResult};

/// Flag bit marking a slot as destroyed.
pub const FLAG_SLOT_DESTROYED: u16 = 1 << 15;

/// A single key slot of the container header.
#[derive(Debug, Clone)]
pub struct KeySlot {
    /// `None` once destroyed; serialised as the sentinel value
    alg: Option<SlotAlgorithm>,
    flags: u16,
    content: Vec<u8>,
}

/// Displayable descriptor of a live slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub index: usize,
    pub alg: SlotAlgorithm,
    /// `hex(sha256(sha256(content)))`, stable across reloads
    pub id: String,
}

impl KeySlot {
    /// Wrap `root_key` under `slot_key`.
    pub fn new(
        alg: SlotAlgorithm,
        flags: u16,
        root_key: &[u8],
        slot_key: &[u8],
    ) -> ContainerResult<Self> {
        if root_key.is_empty() || slot_key.is_empty() {
            return Err(ContainerError::InvalidParameter(
                "root key and slot key must be non-empty",
            ));
        }
        if slot_key.len() != alg.key_size() {
            return Err(fcrypt_crypto::CryptoError::KeySizeInvalid.into());
        }
        let content = match alg {
            SlotAlgorithm::AesGcm128 => fcrypt_crypto::aes_gcm_seal(slot_key, None, root_key)?,
        };
        // Unlikely for any supported algorithm, but the size field is u16.
        if content.len() > u16::MAX as usize {
            return Err(ContainerError::SlotContentTooLarge);
        }
        Ok(Self {
            alg: Some(alg),
            flags,
            content,
        })
    }

    /// Unwrap the root key. The failure reason (wrong key vs corruption)
    /// is deliberately not distinguished.
    pub fn unseal(&self, slot_key: &[u8]) -> ContainerResult<Zeroizing<Vec<u8>>> {
        let alg = self
            .alg
            .ok_or(ContainerError::UnsupportedSlotAlgorithm(SLOT_ALG_SENTINEL))?;
        if slot_key.is_empty() {
            return Err(ContainerError::InvalidParameter("slot key must be non-empty"));
        }
        match alg {
            SlotAlgorithm::AesGcm128 => Ok(fcrypt_crypto::aes_gcm_open(
                slot_key,
                None,
                &self.content,
            )?),
        }
    }

    /// Turn this slot into a tombstone: destroyed flag set, algorithm
    /// sentinel, content wiped. Destroyed slots are skipped on write.
    pub fn destroy(&mut self) {
        self.flags = FLAG_SLOT_DESTROYED;
        self.alg = None;
        self.content.zeroize();
        self.content.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags & FLAG_SLOT_DESTROYED != 0
    }

    pub fn algorithm(&self) -> Option<SlotAlgorithm> {
        self.alg
    }

    /// Descriptor for display; `None` for destroyed slots.
    pub fn info(&self, index: usize) -> Option<SlotInfo> {
        if self.is_destroyed() {
            return None;
        }
        let alg = self.alg?;
        let id = hex::encode(Sha256::digest(Sha256::digest(&self.content)));
        Some(SlotInfo { index, alg, id })
    }

    /// Parse one slot from the front of `input`, advancing it.
    pub(crate) fn read_from(input: &mut &[u8]) -> ContainerResult<Self> {
        let raw_alg = take_u16(input)?;
        let flags = take_u16(input)?;
        let size = take_u16(input)? as usize;
        let content = take(input, size)?.to_vec();

        let destroyed = flags & FLAG_SLOT_DESTROYED != 0;
        let alg = match SlotAlgorithm::from_u16(raw_alg) {
            Ok(alg) => Some(alg),
            // The sentinel is only legal in a tombstone.
            Err(_) if destroyed => None,
            Err(err) => return Err(err),
        };
        Ok(Self {
            alg,
            flags,
            content,
        })
    }

    /// Serialise this slot. The content length fits u16 by construction.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let raw_alg = self.alg.map_or(SLOT_ALG_SENTINEL, SlotAlgorithm::as_u16);
        out.extend_from_slice(&raw_alg.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&(self.content.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.content);
    }
}

impl Drop for KeySlot {
    fn drop(&mut self) {
        self.content.zeroize();
    }
}

pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> ContainerResult<&'a [u8]> {
    if input.len() < n {
        return Err(ContainerError::InvalidHeader);
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

pub(crate) fn take_u8(input: &mut &[u8]) -> ContainerResult<u8> {
    Ok(take(input, 1)?[0])
}

pub(crate) fn take_u16(input: &mut &[u8]) -> ContainerResult<u16> {
    let bytes = take(input, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcrypt_crypto::{AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE};

    const ROOT_KEY: [u8; 32] = [0xAB; 32];
    const SLOT_KEY: [u8; 16] = [0x11; 16];

    fn test_slot() -> KeySlot {
        KeySlot::new(SlotAlgorithm::AesGcm128, 0, &ROOT_KEY, &SLOT_KEY).unwrap()
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let slot = test_slot();
        assert_eq!(
            slot.content.len(),
            AES_GCM_NONCE_SIZE + ROOT_KEY.len() + AES_GCM_TAG_SIZE
        );
        let recovered = slot.unseal(&SLOT_KEY).unwrap();
        assert_eq!(&*recovered, &ROOT_KEY);
    }

    #[test]
    fn unseal_wrong_key_fails() {
        let slot = test_slot();
        assert!(slot.unseal(&[0x22u8; 16]).is_err());
    }

    #[test]
    fn wrong_slot_key_length_rejected() {
        let result = KeySlot::new(SlotAlgorithm::AesGcm128, 0, &ROOT_KEY, &[0u8; 32]);
        assert!(matches!(
            result,
            Err(ContainerError::Crypto(
                fcrypt_crypto::CryptoError::KeySizeInvalid
            ))
        ));
    }

    #[test]
    fn empty_root_key_rejected() {
        let result = KeySlot::new(SlotAlgorithm::AesGcm128, 0, &[], &SLOT_KEY);
        assert!(matches!(result, Err(ContainerError::InvalidParameter(_))));
    }

    #[test]
    fn destroy_makes_tombstone() {
        let mut slot = test_slot();
        slot.destroy();
        assert!(slot.is_destroyed());
        assert!(slot.algorithm().is_none());
        assert!(slot.content.is_empty());
        assert!(slot.info(0).is_none());
        assert!(slot.unseal(&SLOT_KEY).is_err());
    }

    #[test]
    fn serialised_roundtrip() {
        let slot = test_slot();
        let mut bytes = Vec::new();
        slot.encode_into(&mut bytes);

        let mut cursor = &bytes[..];
        let parsed = KeySlot::read_from(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(parsed.algorithm(), Some(SlotAlgorithm::AesGcm128));
        assert_eq!(&*parsed.unseal(&SLOT_KEY).unwrap(), &ROOT_KEY);
    }

    #[test]
    fn parse_rejects_unknown_live_algorithm() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());

        let result = KeySlot::read_from(&mut &bytes[..]);
        assert!(matches!(
            result,
            Err(ContainerError::UnsupportedSlotAlgorithm(5))
        ));
    }

    #[test]
    fn parse_accepts_destroyed_tombstone() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SLOT_ALG_SENTINEL.to_be_bytes());
        bytes.extend_from_slice(&FLAG_SLOT_DESTROYED.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());

        let slot = KeySlot::read_from(&mut &bytes[..]).unwrap();
        assert!(slot.is_destroyed());
        assert!(slot.algorithm().is_none());
    }

    #[test]
    fn parse_truncated_content_fails() {
        let slot = test_slot();
        let mut bytes = Vec::new();
        slot.encode_into(&mut bytes);
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(
            KeySlot::read_from(&mut &bytes[..]),
            Err(ContainerError::InvalidHeader)
        ));
    }

    #[test]
    fn slot_id_is_stable_and_key_dependent() {
        let slot = test_slot();
        let a = slot.info(0).unwrap();
        let b = slot.info(0).unwrap();
        assert_eq!(a.id, b.id, "id must be deterministic per slot");
        assert_eq!(a.id.len(), 64, "lowercase hex sha256");

        let other = test_slot();
        // fresh random nonce means fresh content, so a different id
        assert_ne!(a.id, other.info(0).unwrap().id);
    }
}
