//! Closed algorithm enumerants for the container format
//!
//! Both tables are part of the wire format: the numeric values are
//! persisted big-endian in the header and must never be reordered.

use std::fmt;

use crate::error::{ContainerError, ContainerResult};

/// Algorithm encrypting the payload region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadAlgorithm {
    /// AES-CTR with a 128-bit key
    AesCtr128,
    /// AES-CTR with a 256-bit key
    AesCtr256,
}

impl PayloadAlgorithm {
    /// Key size in bytes for this algorithm.
    pub fn key_size(self) -> usize {
        match self {
            Self::AesCtr128 => 16,
            Self::AesCtr256 => 32,
        }
    }

    pub fn from_u16(raw: u16) -> ContainerResult<Self> {
        match raw {
            0 => Ok(Self::AesCtr128),
            1 => Ok(Self::AesCtr256),
            _ => Err(ContainerError::UnsupportedPayloadAlgorithm(raw)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::AesCtr128 => 0,
            Self::AesCtr256 => 1,
        }
    }
}

impl fmt::Display for PayloadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AesCtr128 => f.write_str("AES-CTR-128"),
            Self::AesCtr256 => f.write_str("AES-CTR-256"),
        }
    }
}

/// Algorithm wrapping the root key inside a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAlgorithm {
    /// AES-GCM with a direct 128-bit key
    AesGcm128,
}

/// On-disk algorithm value written into destroyed slots; one past the last
/// valid enumerant.
pub(crate) const SLOT_ALG_SENTINEL: u16 = 1;

impl SlotAlgorithm {
    /// Key size in bytes for this algorithm.
    pub fn key_size(self) -> usize {
        match self {
            Self::AesGcm128 => 16,
        }
    }

    pub fn from_u16(raw: u16) -> ContainerResult<Self> {
        match raw {
            0 => Ok(Self::AesGcm128),
            _ => Err(ContainerError::UnsupportedSlotAlgorithm(raw)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::AesGcm128 => 0,
        }
    }
}

impl fmt::Display for SlotAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AesGcm128 => f.write_str("AES-GCM-128"),
        }
    }
}
