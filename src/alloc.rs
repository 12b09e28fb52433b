//! Dynamic heap accumulation for the encode direction.
//!
//! During a typed-struct-to-wire walk, every variable-length field reserves
//! its payload here before the container is allocated. Once the walk
//! completes, the accumulated total sizes the container's heap region and
//! the payloads are copied in reservation order.

use crate::error::{Error, Result};

/// Transient per-encode owner of variable-length payloads.
///
/// Has no existence independent of one encode operation: the codec creates
/// it, the field walk feeds it, and [`DynamicAllocator::copy_to`] drains it
/// into the freshly allocated container.
#[derive(Debug, Default)]
pub struct DynamicAllocator {
    data: Vec<u8>,
}

impl DynamicAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve space for one variable-length payload.
    ///
    /// Returns the payload's offset within the heap region. Payloads are
    /// packed contiguously in reservation order.
    pub fn reserve(&mut self, payload: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(payload);
        offset
    }

    /// Cumulative size of all reserved payloads.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Copy all reserved payloads into a heap region.
    pub fn copy_to(&self, heap: &mut [u8]) -> Result<()> {
        if heap.len() < self.data.len() {
            return Err(Error::HeapTooSmall {
                required: self.data.len(),
                available: heap.len(),
            });
        }
        heap[..self.data.len()].copy_from_slice(&self.data);
        Ok(())
    }
}
