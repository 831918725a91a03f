//! The fixed 4 KiB container header
//!
//! ```text
//! [4 bytes: magic "CRPT"]
//! [1 byte: version major][1 byte: version minor]
//! [2 bytes: flags]
//! [2 bytes: payload algorithm]
//! [1 byte: slot count]
//! [slot count x serialised slots]
//! [zero padding up to 4096]
//! ```
//! Extra bytes inside the region beyond the declared slots are ignored on
//! parse, so the padding content is not authoritative.

use std::io::{self, Read, Write};

use crate::alg::PayloadAlgorithm;
use crate::error::{ContainerError, ContainerResult};
use crate::slot::{take, take_u16, take_u8, KeySlot, SlotInfo};

/// Size of the header region; the payload starts right after it.
pub const HEADER_SIZE: usize = 4096;

/// "CRPT" in ASCII
pub const FILE_MAGIC: [u8; 4] = [0x43, 0x52, 0x50, 0x54];

/// Supported format version.
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// The slot count is persisted as a single byte.
pub const MAX_SLOTS: usize = 255;

#[derive(Debug, Clone)]
pub struct Header {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: u16,
    pub payload_alg: PayloadAlgorithm,
    pub slots: Vec<KeySlot>,
}

impl Header {
    /// Fresh header for a new container; no slots yet.
    pub fn new(payload_alg: PayloadAlgorithm) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            flags: 0,
            payload_alg,
            slots: Vec::new(),
        }
    }

    /// Number of slots that are not tombstones.
    pub fn live_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_destroyed()).count()
    }

    /// Descriptors of all live slots.
    pub fn slot_infos(&self) -> Vec<SlotInfo> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.info(i))
            .collect()
    }

    /// Read and validate the full 4096-byte header region.
    pub fn parse(reader: &mut impl Read) -> ContainerResult<Self> {
        let mut region = [0u8; HEADER_SIZE];
        reader.read_exact(&mut region).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                ContainerError::InvalidHeader
            } else {
                ContainerError::Io(err)
            }
        })?;

        let mut input = &region[..];
        if take(&mut input, 4)? != FILE_MAGIC {
            return Err(ContainerError::InvalidHeader);
        }
        let version_major = take_u8(&mut input)?;
        let version_minor = take_u8(&mut input)?;
        if (version_major, version_minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(ContainerError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }
        let flags = take_u16(&mut input)?;
        let payload_alg = PayloadAlgorithm::from_u16(take_u16(&mut input)?)?;
        let slot_count = take_u8(&mut input)?;
        if slot_count == 0 {
            return Err(ContainerError::EmptySlotContent);
        }
        let mut slots = Vec::with_capacity(slot_count as usize);
        for _ in 0..slot_count {
            slots.push(KeySlot::read_from(&mut input)?);
        }
        // The rest of the region is padding.

        Ok(Self {
            version_major,
            version_minor,
            flags,
            payload_alg,
            slots,
        })
    }

    /// Serialise into exactly 4096 bytes, zero-padded. Destroyed slots are
    /// left out of the on-disk form.
    pub fn write(&self, writer: &mut impl Write) -> ContainerResult<()> {
        let live = self.live_slots();
        if live == 0 {
            return Err(ContainerError::EmptySlotContent);
        }
        if live > MAX_SLOTS {
            return Err(ContainerError::TooManySlots);
        }

        let mut region = Vec::with_capacity(HEADER_SIZE);
        region.extend_from_slice(&FILE_MAGIC);
        region.push(self.version_major);
        region.push(self.version_minor);
        region.extend_from_slice(&self.flags.to_be_bytes());
        region.extend_from_slice(&self.payload_alg.as_u16().to_be_bytes());
        region.push(live as u8);
        for slot in self.slots.iter().filter(|s| !s.is_destroyed()) {
            slot.encode_into(&mut region);
        }
        if region.len() > HEADER_SIZE {
            return Err(ContainerError::HeaderTooLarge);
        }
        region.resize(HEADER_SIZE, 0);

        writer.write_all(&region)?;
        Ok(())
    }
}
