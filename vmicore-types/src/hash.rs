use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit structural hash. Two types with identical hashes are considered
/// equivalent across symbol files (spec.md §3). Computed with FNV-1a rather
/// than `std::hash::DefaultHasher` because the latter's algorithm is not
/// guaranteed stable across Rust versions, which would break the
/// save/load round-trip property in spec.md §8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructuralHash(pub u32);

impl fmt::Display for StructuralHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Incremental FNV-1a accumulator used to fold together a type's kind tag,
/// its members' offsets/bit-layout, and the hashes of the types it
/// references.
#[derive(Debug, Clone, Copy)]
pub struct Hasher32(u32);

impl Default for Hasher32 {
    fn default() -> Self {
        Self(FNV_OFFSET)
    }
}

impl Hasher32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.0 ^= u32::from(byte);
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.write_u8(*b);
        }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_u64(v as u64);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        // length-prefix implicitly by writing a separator, so "ab","c" and
        // "a","bc" don't collide
        self.write_u8(0);
    }

    pub fn write_hash(&mut self, h: StructuralHash) {
        self.write_u32(h.0);
    }

    pub fn finish(self) -> StructuralHash {
        StructuralHash(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        let mut a = Hasher32::new();
        a.write_str("struct module");
        a.write_u32(4);
        let mut b = Hasher32::new();
        b.write_str("struct module");
        b.write_u32(4);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn differing_field_order_differs() {
        let mut a = Hasher32::new();
        a.write_str("x");
        a.write_str("y");
        let mut b = Hasher32::new();
        b.write_str("y");
        b.write_str("x");
        assert_ne!(a.finish(), b.finish());
    }
}
