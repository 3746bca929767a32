use crate::error::MemoryError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A random-access source of raw bytes at physical addresses. A read
/// failure is not fatal to the caller (spec.md §4.E.9: "a memory-read
/// failure on a candidate child ... lowers the candidate's probability
/// to zero"), so this returns a `Result` rather than panicking.
pub trait MemoryDevice: Send + Sync {
    fn read_at(&self, phys_addr: u64, len: usize) -> Result<Vec<u8>, MemoryError>;
    fn size(&self) -> u64;

    fn read_u64(&self, phys_addr: u64) -> Result<u64, MemoryError> {
        let bytes = self.read_at(phys_addr, 8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("read_at returned 8 bytes")))
    }

    fn read_u32(&self, phys_addr: u64) -> Result<u32, MemoryError> {
        let bytes = self.read_at(phys_addr, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("read_at returned 4 bytes")))
    }
}

/// A physical memory dump mapped read-only into the process's address
/// space. Builder threads issue concurrent reads against the same
/// mapping; `Mmap` is `Sync` for shared reads, so no internal locking is
/// needed here (spec.md §5: memory-device reads may block on paged I/O
/// but don't otherwise contend).
pub struct MappedDumpDevice {
    mmap: Mmap,
}

impl MappedDumpDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let file = File::open(path)?;
        // Safety: the dump file is expected to remain unmodified and
        // present for the process's lifetime; this is the standard
        // caveat of memory-mapped file I/O.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }
}

impl MemoryDevice for MappedDumpDevice {
    fn read_at(&self, phys_addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
        let start = usize::try_from(phys_addr).map_err(|_| MemoryError::OutOfRange {
            addr: phys_addr,
            len,
            size: self.size(),
        })?;
        let end = start.checked_add(len).ok_or(MemoryError::OutOfRange { addr: phys_addr, len, size: self.size() })?;
        self.mmap
            .get(start..end)
            .map(|slice| slice.to_vec())
            .ok_or(MemoryError::OutOfRange { addr: phys_addr, len, size: self.size() })
    }

    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDevice(Vec<u8>);
    impl MemoryDevice for FakeDevice {
        fn read_at(&self, phys_addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
            let start = phys_addr as usize;
            self.0
                .get(start..start + len)
                .map(|s| s.to_vec())
                .ok_or(MemoryError::OutOfRange { addr: phys_addr, len, size: self.0.len() as u64 })
        }
        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    #[test]
    fn read_u64_round_trips() {
        let mut bytes = vec![0u8; 16];
        bytes[0..8].copy_from_slice(&0xdead_beef_cafe_babeu64.to_le_bytes());
        let device = FakeDevice(bytes);
        assert_eq!(device.read_u64(0).unwrap(), 0xdead_beef_cafe_babe);
    }

    #[test]
    fn out_of_range_read_is_error() {
        let device = FakeDevice(vec![0u8; 4]);
        assert!(device.read_at(0, 8).is_err());
    }
}
