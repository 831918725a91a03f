//! Container file: lifecycle, slot management, payload streaming
//!
//! A `ContainerFile` exclusively owns its backing file and the in-memory
//! root key. The root key is either present (unsealed) or absent (sealed):
//!
//! ```text
//!      create()                         open()
//!         │ fresh random root key          │ parse header
//!         ▼                                ▼
//!   ┌─ UNSEALED ─┐      seal()      ┌── SEALED ──┐
//!   │ add slots  │ ────────────────▶│            │
//!   │ write hdr  │ ◀──────────────── │  unseal()  │
//!   │ enc/dec    │      unseal()    └────────────┘
//!   └────────────┘
//! ```
//!
//! Not safe for concurrent use; callers needing concurrency serialise
//! externally.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use zeroize::Zeroizing;

use fcrypt_crypto::{
    decrypt_stream_authenticated, derive_keys_from_master_key,
    derive_keys_from_master_key_with_salt, encrypt_stream_authenticated, generate_aes_iv,
    generate_random_bytes, DecryptReader, AES_BLOCK_SIZE, HKDF_SALT_SIZE, HMAC_TAG_SIZE,
};

use crate::alg::{PayloadAlgorithm, SlotAlgorithm};
use crate::error::{ContainerError, ContainerResult};
use crate::header::{Header, HEADER_SIZE};
use crate::slot::{KeySlot, SlotInfo};

/// File offset where the payload region (salt ‖ iv ‖ ciphertext ‖ tag)
/// starts.
pub const PAYLOAD_OFFSET: u64 = HEADER_SIZE as u64;

/// The root key is always 32 random bytes.
pub const ROOT_KEY_SIZE: usize = 32;

/// Size of the HMAC subkey derived next to the payload key.
const AUTH_KEY_SIZE: usize = 32;

/// Buffering for the backing-file reader/writer (4 pages).
const FILE_BUF_SIZE: usize = 4096 * 4;

/// The in-memory root key; wiped on drop, redacted in debug output.
struct RootKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl RootKey {
    fn generate() -> ContainerResult<Self> {
        Ok(Self {
            bytes: generate_random_bytes(ROOT_KEY_SIZE)?,
        })
    }

    fn from_bytes(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self { bytes }
    }

    fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// An encrypted container backed by a file.
#[derive(Debug)]
pub struct ContainerFile {
    file: File,
    header: Header,
    /// `None` while sealed
    root_key: Option<RootKey>,
}

impl ContainerFile {
    /// Create a container file at `path` (truncating any existing file).
    /// Starts unsealed with a fresh root key and an empty slot table.
    pub fn create(path: impl AsRef<Path>, alg: PayloadAlgorithm) -> ContainerResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::create_with_handle(file, alg)
    }

    /// As [`ContainerFile::create`] over an already opened handle. The
    /// handle must be readable, writable, and seekable.
    pub fn create_with_handle(file: File, alg: PayloadAlgorithm) -> ContainerResult<Self> {
        Ok(Self {
            file,
            header: Header::new(alg),
            root_key: Some(RootKey::generate()?),
        })
    }

    /// Open an existing container read-only. Starts sealed.
    pub fn open(path: impl AsRef<Path>) -> ContainerResult<Self> {
        Self::open_with_handle(File::open(path)?)
    }

    /// As [`ContainerFile::open`] over an already opened handle positioned
    /// at the start of the file.
    pub fn open_with_handle(mut file: File) -> ContainerResult<Self> {
        let header = Header::parse(&mut file)?;
        tracing::debug!(
            slots = header.slots.len(),
            alg = %header.payload_alg,
            "container header parsed"
        );
        Ok(Self {
            file,
            header,
            root_key: None,
        })
    }

    /// Whether the root key is currently absent.
    pub fn is_sealed(&self) -> bool {
        self.root_key.is_none()
    }

    pub fn payload_algorithm(&self) -> PayloadAlgorithm {
        self.header.payload_alg
    }

    /// Try every slot of the given algorithm; first successful unwrap wins.
    fn find_matching_slot(
        &self,
        alg: SlotAlgorithm,
        slot_key: &[u8],
    ) -> Option<(Zeroizing<Vec<u8>>, usize)> {
        self.header
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.algorithm() == Some(alg))
            .find_map(|(index, slot)| slot.unseal(slot_key).ok().map(|root| (root, index)))
    }

    /// Recover the root key with a slot key.
    pub fn unseal(&mut self, alg: SlotAlgorithm, slot_key: &[u8]) -> ContainerResult<()> {
        if self.root_key.is_some() {
            return Err(ContainerError::RootKeyAlreadyUnsealed);
        }
        match self.find_matching_slot(alg, slot_key) {
            Some((root, index)) => {
                tracing::debug!(index, "root key unsealed");
                self.root_key = Some(RootKey::from_bytes(root));
                Ok(())
            }
            None => Err(ContainerError::RootKeyUnsealFailed),
        }
    }

    /// Wipe and drop the root key. Refused while no live slot could bring
    /// it back.
    pub fn seal(&mut self) -> ContainerResult<()> {
        if self.header.live_slots() == 0 {
            return Err(ContainerError::NoSlots);
        }
        self.root_key = None;
        Ok(())
    }

    /// Wrap the root key under a new slot key. Rejects a key that already
    /// opens one of the existing slots.
    pub fn add_key_slot(&mut self, alg: SlotAlgorithm, slot_key: &[u8]) -> ContainerResult<()> {
        let root = self.root_key.as_ref().ok_or(ContainerError::RootKeySealed)?;
        if self.find_matching_slot(alg, slot_key).is_some() {
            return Err(ContainerError::SlotDuplicated);
        }
        let slot = KeySlot::new(alg, 0, root.expose(), slot_key)?;
        self.header.slots.push(slot);
        tracing::debug!(index = self.header.slots.len() - 1, %alg, "key slot added");
        Ok(())
    }

    /// Destroy the slot at `index` in place. The tombstone stays in memory
    /// (indices remain valid) but is not written to disk, so a reopened
    /// container no longer has it. At least one other live slot must
    /// remain.
    pub fn remove_key_slot_by_index(&mut self, index: usize) -> ContainerResult<()> {
        if self.header.live_slots() < 2 {
            return Err(ContainerError::InvalidRemove);
        }
        match self.header.slots.get_mut(index) {
            Some(slot) if !slot.is_destroyed() => {
                slot.destroy();
                tracing::debug!(index, "key slot destroyed");
                Ok(())
            }
            _ => Err(ContainerError::InvalidRemove),
        }
    }

    /// Snapshot of the live slots: `(index, algorithm, id)`.
    pub fn slots(&self) -> Vec<SlotInfo> {
        self.header.slot_infos()
    }

    /// Write the 4 KiB header at offset 0.
    pub fn write_header(&mut self) -> ContainerResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.file)?;
        Ok(())
    }

    /// Derived subkey sizes for the payload: encryption key, then MAC key.
    fn subkey_sizes(&self) -> [usize; 2] {
        [self.header.payload_alg.key_size(), AUTH_KEY_SIZE]
    }

    /// Encrypt `reader` into the payload region until EOF. Requires the
    /// container to be unsealed; returns the plaintext byte count.
    pub fn encrypt_stream<R: Read>(&mut self, reader: R) -> ContainerResult<u64> {
        let root = self.root_key.as_ref().ok_or(ContainerError::RootKeySealed)?;
        let (keys, salt) = derive_keys_from_master_key(root.expose(), &self.subkey_sizes())?;
        let iv = generate_aes_iv()?;

        self.file.seek(SeekFrom::Start(PAYLOAD_OFFSET))?;
        let mut out = BufWriter::with_capacity(FILE_BUF_SIZE, &mut self.file);
        out.write_all(&salt)?;
        out.write_all(&iv)?;
        let written = encrypt_stream_authenticated(&keys[0], &iv, &keys[1], reader, &mut out)?;
        out.flush()?;
        tracing::debug!(bytes = written, "payload encrypted");
        Ok(written)
    }

    /// Decrypt the payload region into `writer`, verifying the trailing
    /// tag. On [`ContainerError::Crypto`] with an authentication failure
    /// the caller must discard everything already written.
    pub fn decrypt_stream<W: Write>(&mut self, writer: W) -> ContainerResult<u64> {
        let root = self.root_key.as_ref().ok_or(ContainerError::RootKeySealed)?;
        let sizes = self.subkey_sizes();

        self.file.seek(SeekFrom::Start(PAYLOAD_OFFSET))?;
        let mut input = BufReader::with_capacity(FILE_BUF_SIZE, &mut self.file);
        let mut salt = [0u8; HKDF_SALT_SIZE];
        let mut iv = [0u8; AES_BLOCK_SIZE];
        input.read_exact(&mut salt)?;
        input.read_exact(&mut iv)?;

        let keys = derive_keys_from_master_key_with_salt(root.expose(), &salt, &sizes)?;
        let written = decrypt_stream_authenticated(&keys[0], &iv, &keys[1], input, writer)?;
        tracing::debug!(bytes = written, "payload decrypted and verified");
        Ok(written)
    }

    /// Lazy reader over the decrypted payload that does **not** verify the
    /// authentication tag. Every byte it yields is unauthenticated; use
    /// [`ContainerFile::decrypt_stream`] wherever integrity matters.
    pub fn as_decryption_stream(
        &mut self,
    ) -> ContainerResult<DecryptReader<BufReader<&mut File>>> {
        let root = self.root_key.as_ref().ok_or(ContainerError::RootKeySealed)?;
        let key_size = self.header.payload_alg.key_size();

        self.file.seek(SeekFrom::Start(PAYLOAD_OFFSET))?;
        let mut input = BufReader::with_capacity(FILE_BUF_SIZE, &mut self.file);
        let mut salt = [0u8; HKDF_SALT_SIZE];
        let mut iv = [0u8; AES_BLOCK_SIZE];
        input.read_exact(&mut salt)?;
        input.read_exact(&mut iv)?;

        let keys = derive_keys_from_master_key_with_salt(root.expose(), &salt, &[key_size])?;
        Ok(DecryptReader::new(input, &keys[0], &iv)?)
    }

    /// Rough payload size: file length minus header, salt, IV, and tag.
    /// Can be negative for truncated files and is not an exact plaintext
    /// length oracle.
    pub fn estimate_content_size(&self) -> ContainerResult<i64> {
        let len = self.file.metadata()?.len() as i64;
        Ok(len - PAYLOAD_OFFSET as i64 - (HKDF_SALT_SIZE + AES_BLOCK_SIZE) as i64
            - HMAC_TAG_SIZE as i64)
    }

    /// Release the container: the root key, if present, is wiped first,
    /// then the file handle is closed.
    pub fn close(self) {}
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        // Wipe the root key before the field drop glue closes the file.
        self.root_key = None;
    }
}
