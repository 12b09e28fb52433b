//! PDU container: one self-describing binary message buffer.
//!
//! Every message on the wire is a single contiguous buffer with three
//! regions:
//!
//! ```text
//! Offset          Size         Region
//! 0               24           metadata (magic, version, offsets, total size)
//! base_off        fixed_size   fixed region (primitives, fixed-capacity strings)
//! heap_off        heap_size    heap region (variable-length payloads)
//! ```
//!
//! The metadata magic/version pair is the sole criterion for treating a
//! buffer as a valid PDU. Any buffer whose magic does not match is corrupt
//! and every read through it fails closed.

use crate::error::{Error, Result};

/// Magic number identifying a valid PDU.
pub const PDU_MAGIC: u32 = 0x1234_5678;

/// PDU layout version.
pub const PDU_VERSION: u32 = 1;

/// Metadata size in bytes (five u32 fields plus 4 reserved bytes).
pub const METADATA_SIZE: usize = 24;

/// Parsed PDU metadata.
///
/// Layout (little-endian):
/// ```text
/// Offset  Size  Field
/// 0       4     magic
/// 4       4     version
/// 8       4     base_off
/// 12      4     heap_off
/// 16      4     total_size
/// 20      4     reserved (zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduMetadata {
    /// Offset of the fixed region from the start of the buffer.
    pub base_off: u32,
    /// Offset of the heap region from the start of the buffer.
    pub heap_off: u32,
    /// Total buffer size including metadata.
    pub total_size: u32,
}

impl PduMetadata {
    /// Parse and validate metadata from the head of a buffer.
    ///
    /// This is the validation gate: magic, version and offset consistency
    /// are all checked before any field is read through the metadata.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < METADATA_SIZE {
            return Err(Error::BufferTooSmall {
                required: METADATA_SIZE,
                available: bytes.len(),
            });
        }
        let magic = read_u32(bytes, 0);
        if magic != PDU_MAGIC {
            return Err(Error::InvalidMagic {
                expected: PDU_MAGIC,
                got: magic,
            });
        }
        let version = read_u32(bytes, 4);
        if version != PDU_VERSION {
            return Err(Error::InvalidVersion {
                expected: PDU_VERSION,
                got: version,
            });
        }
        let meta = Self {
            base_off: read_u32(bytes, 8),
            heap_off: read_u32(bytes, 12),
            total_size: read_u32(bytes, 16),
        };
        if meta.base_off as usize != METADATA_SIZE {
            return Err(Error::CorruptMetadata {
                reason: "base offset does not follow metadata",
            });
        }
        if meta.heap_off < meta.base_off || meta.heap_off > meta.total_size {
            return Err(Error::CorruptMetadata {
                reason: "heap offset outside buffer",
            });
        }
        if (meta.total_size as usize) > bytes.len() {
            return Err(Error::CorruptMetadata {
                reason: "total size exceeds buffer length",
            });
        }
        Ok(meta)
    }

    /// Size of the fixed region in bytes.
    #[inline]
    pub fn fixed_size(&self) -> usize {
        (self.heap_off - self.base_off) as usize
    }

    /// Size of the heap region in bytes.
    #[inline]
    pub fn heap_size(&self) -> usize {
        (self.total_size - self.heap_off) as usize
    }

    fn write_to(&self, bytes: &mut [u8]) {
        write_u32(bytes, 0, PDU_MAGIC);
        write_u32(bytes, 4, PDU_VERSION);
        write_u32(bytes, 8, self.base_off);
        write_u32(bytes, 12, self.heap_off);
        write_u32(bytes, 16, self.total_size);
        write_u32(bytes, 20, 0);
    }
}

#[inline]
fn read_u32(bytes: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[off..off + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn write_u32(bytes: &mut [u8], off: usize, v: u32) {
    bytes[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// One serialized message, owning its buffer exclusively.
///
/// Obtained either from [`PduContainer::allocate`] (encode direction) or
/// [`PduContainer::from_bytes`] (decode direction). The buffer is released
/// on drop; ownership transfers at the codec boundary via
/// [`PduContainer::into_bytes`], so double-free and leak are impossible by
/// construction.
pub struct PduContainer {
    buf: Vec<u8>,
    meta: PduMetadata,
}

impl PduContainer {
    /// Allocate a fresh container sized to `metadata + fixed_size + heap_size`.
    ///
    /// Metadata is written atomically with creation; no container is ever
    /// partially valid. Fails only on allocation failure.
    pub fn allocate(fixed_size: usize, heap_size: usize) -> Result<Self> {
        let total = METADATA_SIZE + fixed_size + heap_size;
        let mut buf = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| Error::AllocationFailed { requested: total })?;
        buf.resize(total, 0);

        let meta = PduMetadata {
            base_off: METADATA_SIZE as u32,
            heap_off: (METADATA_SIZE + fixed_size) as u32,
            total_size: total as u32,
        };
        meta.write_to(&mut buf);
        Ok(Self { buf, meta })
    }

    /// Validating constructor for the decode direction.
    ///
    /// Rejects on bad magic/version or inconsistent offsets before any
    /// field can be read. Trailing bytes beyond `total_size` are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let meta = PduMetadata::parse(bytes)?;
        let buf = bytes[..meta.total_size as usize].to_vec();
        Ok(Self { buf, meta })
    }

    /// The parsed metadata.
    #[inline]
    pub fn metadata(&self) -> PduMetadata {
        self.meta
    }

    /// Total size in bytes, including metadata.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.meta.total_size as usize
    }

    /// The fixed region.
    #[inline]
    pub fn fixed(&self) -> &[u8] {
        &self.buf[self.meta.base_off as usize..self.meta.heap_off as usize]
    }

    /// Mutable view of the fixed region.
    #[inline]
    pub fn fixed_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.meta.base_off as usize..self.meta.heap_off as usize]
    }

    /// The heap region, gated on metadata validity.
    ///
    /// Re-validates magic/version on every call; a container whose buffer
    /// was corrupted after construction still fails closed here.
    pub fn heap_view(&self) -> Result<&[u8]> {
        let meta = PduMetadata::parse(&self.buf)?;
        Ok(&self.buf[meta.heap_off as usize..meta.total_size as usize])
    }

    /// Mutable view of the heap region (encode direction only).
    #[inline]
    pub(crate) fn heap_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.meta.heap_off as usize, self.meta.total_size as usize);
        &mut self.buf[start..end]
    }

    /// The whole buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the container, transferring buffer ownership to the caller.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
