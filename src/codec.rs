//! Generic message codec over the PDU container format.
//!
//! Each message type implements [`PduCodec`] once: a field-by-field walk in
//! both directions. Primitive fields are copied with explicit-width
//! little-endian conversion, string fields live in fixed-capacity storage
//! with a guaranteed trailing NUL, and genuinely variable-length fields are
//! pre-reserved through the [`DynamicAllocator`] and referenced from the
//! fixed region as an `(offset, len)` pair.
//!
//! All accessors are bounds-checked; a failed walk never partially
//! populates its output.

use crate::alloc::DynamicAllocator;
use crate::container::PduContainer;
use crate::error::{Error, Result};

/// Cursor-based writer over a fixed region.
pub struct FixedWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FixedWriter<'a> {
    /// Wrap a zero-initialized fixed-region buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn claim(&mut self, len: usize) -> Result<&mut [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::OutOfBounds {
                offset: self.pos,
                len,
                region: self.buf.len(),
            });
        }
        let slice = &mut self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Write a `u32` (little-endian).
    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.claim(4)?.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Write an `i32` (little-endian).
    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.claim(4)?.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Write an `i64` (little-endian).
    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.claim(8)?.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Write a bool as a `u32` (0 or 1).
    pub fn put_bool(&mut self, v: bool) -> Result<()> {
        self.put_u32(u32::from(v))
    }

    /// Write a string into fixed-capacity storage.
    ///
    /// The field occupies exactly `capacity` bytes; the value must leave
    /// room for the trailing NUL. Overflow is an encode error, never a
    /// silent truncation.
    pub fn put_str(&mut self, s: &str, capacity: usize) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() + 1 > capacity {
            return Err(Error::StringTooLong {
                len: bytes.len(),
                capacity,
            });
        }
        let field = self.claim(capacity)?;
        field[..bytes.len()].copy_from_slice(bytes);
        // remainder stays zero; bytes[len] is the terminator
        Ok(())
    }

    /// Write a variable-length payload.
    ///
    /// Reserves the payload in the heap accumulator and stores an
    /// `(offset, len)` reference in the fixed region.
    pub fn put_heap(&mut self, heap: &mut DynamicAllocator, payload: &[u8]) -> Result<()> {
        let offset = heap.reserve(payload);
        self.put_u32(offset)?;
        self.put_u32(payload.len() as u32)
    }
}

/// Cursor-based reader over a fixed region.
pub struct FixedReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FixedReader<'a> {
    /// Wrap a fixed-region buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::OutOfBounds {
                offset: self.pos,
                len,
                region: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a `u32`.
    pub fn get_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    /// Read an `i32`.
    pub fn get_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(b))
    }

    /// Read an `i64`.
    pub fn get_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(b))
    }

    /// Read a bool stored as a `u32` (non-zero is true).
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u32()? != 0)
    }

    /// Read a string from fixed-capacity storage, up to its terminator.
    pub fn get_str(&mut self, capacity: usize) -> Result<String> {
        let field = self.take(capacity)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let s = std::str::from_utf8(&field[..end]).map_err(|_| Error::InvalidString)?;
        Ok(s.to_owned())
    }

    /// Read a variable-length payload referenced from the fixed region.
    ///
    /// The returned slice borrows from `heap`, not from the reader, so the
    /// heap region and the fixed region may come from separate borrows of
    /// the same container.
    pub fn get_heap<'h>(&mut self, heap: &'h [u8]) -> Result<&'h [u8]> {
        let offset = self.get_u32()? as usize;
        let len = self.get_u32()? as usize;
        if offset + len > heap.len() {
            return Err(Error::OutOfBounds {
                offset,
                len,
                region: heap.len(),
            });
        }
        Ok(&heap[offset..offset + len])
    }
}

/// The contract each message type implements to convert between its typed
/// form and a PDU container.
pub trait PduCodec: Sized {
    /// Size of this message's fixed region in bytes.
    const FIXED_SIZE: usize;

    /// Typed-to-wire field walk.
    fn write_fixed(&self, w: &mut FixedWriter<'_>, heap: &mut DynamicAllocator) -> Result<()>;

    /// Wire-to-typed field walk.
    fn read_fixed(r: &mut FixedReader<'_>, heap: &[u8]) -> Result<Self>;
}

/// Encode a message into a freshly allocated byte vector.
///
/// Runs the field walk into a staging fixed region, sizes the heap from the
/// accumulator, allocates the container, and copies both regions in. The
/// container's ownership ends inside this call.
pub fn encode_vec<T: PduCodec>(value: &T) -> Result<Vec<u8>> {
    let mut fixed = vec![0u8; T::FIXED_SIZE];
    let mut heap = DynamicAllocator::new();
    {
        let mut w = FixedWriter::new(&mut fixed);
        value.write_fixed(&mut w, &mut heap)?;
    }
    let mut container = PduContainer::allocate(T::FIXED_SIZE, heap.total_size())?;
    container.fixed_mut().copy_from_slice(&fixed);
    heap.copy_to(container.heap_mut())?;
    Ok(container.into_bytes())
}

/// Encode a message into a caller-supplied buffer, returning the encoded
/// size. Fails with [`Error::BufferTooSmall`] if the buffer cannot hold it;
/// the buffer is untouched on any failure.
pub fn encode_into<T: PduCodec>(value: &T, out: &mut [u8]) -> Result<usize> {
    let bytes = encode_vec(value)?;
    if out.len() < bytes.len() {
        return Err(Error::BufferTooSmall {
            required: bytes.len(),
            available: out.len(),
        });
    }
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(bytes.len())
}

/// Decode a message from wire bytes.
///
/// The metadata magic/version gate runs before any field is read; failure
/// at any point yields an error, never a partially populated value.
pub fn decode<T: PduCodec>(bytes: &[u8]) -> Result<T> {
    let container = PduContainer::from_bytes(bytes)?;
    let heap = container.heap_view()?;
    let mut r = FixedReader::new(container.fixed());
    T::read_fixed(&mut r, heap)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A synthetic message exercising every field kind, including a
    // variable-length payload.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Sample {
        id: u32,
        score: i64,
        active: bool,
        tag: String,
        blob: Vec<u8>,
    }

    impl PduCodec for Sample {
        const FIXED_SIZE: usize = 4 + 8 + 4 + 32 + 8;

        fn write_fixed(&self, w: &mut FixedWriter<'_>, heap: &mut DynamicAllocator) -> Result<()> {
            w.put_u32(self.id)?;
            w.put_i64(self.score)?;
            w.put_bool(self.active)?;
            w.put_str(&self.tag, 32)?;
            w.put_heap(heap, &self.blob)
        }

        fn read_fixed(r: &mut FixedReader<'_>, heap: &[u8]) -> Result<Self> {
            Ok(Self {
                id: r.get_u32()?,
                score: r.get_i64()?,
                active: r.get_bool()?,
                tag: r.get_str(32)?,
                blob: r.get_heap(heap)?.to_vec(),
            })
        }
    }

    fn sample() -> Sample {
        Sample {
            id: 7,
            score: -12345,
            active: true,
            tag: "asset-1".into(),
            blob: vec![0xDE, 0xAD, 0xBE, 0xEF],
        }
    }

    #[test]
    fn roundtrip() {
        let bytes = encode_vec(&sample()).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn encode_into_reports_size() {
        let mut buf = [0u8; 256];
        let n = encode_into(&sample(), &mut buf).unwrap();
        let back: Sample = decode(&buf[..n]).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn encode_into_small_buffer_fails() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            encode_into(&sample(), &mut buf),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn string_over_capacity_is_an_error_not_truncation() {
        let mut v = sample();
        v.tag = "x".repeat(32); // needs 33 bytes with terminator
        assert!(matches!(
            encode_vec(&v),
            Err(Error::StringTooLong { len: 32, capacity: 32 })
        ));
    }

    #[test]
    fn string_at_capacity_minus_terminator_fits() {
        let mut v = sample();
        v.tag = "x".repeat(31);
        let bytes = encode_vec(&v).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(back.tag, v.tag);
    }

    #[test]
    fn mutated_magic_decodes_to_nothing() {
        let mut bytes = encode_vec(&sample()).unwrap();
        bytes[1] ^= 0x55;
        assert!(decode::<Sample>(&bytes).is_err());
    }

    #[test]
    fn heap_reference_outside_region_rejected() {
        let bytes = encode_vec(&sample()).unwrap();
        let mut bad = bytes.clone();
        // The blob length field sits at the end of the fixed region.
        let len_off = crate::container::METADATA_SIZE + Sample::FIXED_SIZE - 4;
        bad[len_off..len_off + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(decode::<Sample>(&bad).is_err());
    }

    #[test]
    fn empty_heap_payload_roundtrips() {
        let mut v = sample();
        v.blob.clear();
        let bytes = encode_vec(&v).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert!(back.blob.is_empty());
    }
}
