use vmicore_mem::MemoryDevice;

/// One run of differing bytes between two devices, at the configured
/// comparison granularity (spec.md §4.E.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRun {
    pub start: u64,
    pub length: u64,
}

/// Default comparison granularity; spec.md §4.E.8 leaves the exact value
/// a design choice.
pub const DEFAULT_GRANULARITY: u64 = 16;

/// Compares `a` and `b` byte-wise over `[0, len)` at `granularity`-sized
/// chunks, coalescing adjacent differing chunks into runs. Idempotent
/// and side-effect-free: neither device is mutated.
pub fn diff_devices(a: &dyn MemoryDevice, b: &dyn MemoryDevice, len: u64, granularity: u64) -> Vec<DiffRun> {
    let granularity = granularity.max(1);
    let mut runs = Vec::new();
    let mut open: Option<DiffRun> = None;
    let mut offset = 0u64;

    while offset < len {
        let chunk_len = granularity.min(len - offset) as usize;
        let chunk_a = a.read_at(offset, chunk_len);
        let chunk_b = b.read_at(offset, chunk_len);
        let differs = match (chunk_a, chunk_b) {
            (Ok(x), Ok(y)) => x != y,
            _ => true,
        };

        if differs {
            match &mut open {
                Some(run) if run.start + run.length == offset => run.length += chunk_len as u64,
                _ => {
                    if let Some(run) = open.take() {
                        runs.push(run);
                    }
                    open = Some(DiffRun { start: offset, length: chunk_len as u64 });
                }
            }
        } else if let Some(run) = open.take() {
            runs.push(run);
        }

        offset += chunk_len as u64;
    }
    if let Some(run) = open {
        runs.push(run);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_mem::MemoryError;

    struct FakeDevice(Vec<u8>);
    impl MemoryDevice for FakeDevice {
        fn read_at(&self, phys_addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
            let start = phys_addr as usize;
            self.0.get(start..start + len).map(|s| s.to_vec()).ok_or(MemoryError::OutOfRange { addr: phys_addr, len, size: self.0.len() as u64 })
        }
        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    #[test]
    fn identical_devices_have_no_diff() {
        let a = FakeDevice(vec![1, 2, 3, 4]);
        let b = FakeDevice(vec![1, 2, 3, 4]);
        assert!(diff_devices(&a, &b, 4, 2).is_empty());
    }

    #[test]
    fn adjacent_differing_chunks_coalesce_into_one_run() {
        let a = FakeDevice(vec![0, 0, 0, 0]);
        let b = FakeDevice(vec![9, 9, 9, 9]);
        let runs = diff_devices(&a, &b, 4, 2);
        assert_eq!(runs, vec![DiffRun { start: 0, length: 4 }]);
    }

    #[test]
    fn isolated_differing_chunk_is_its_own_run() {
        let a = FakeDevice(vec![0, 0, 0, 0, 0, 0]);
        let b = FakeDevice(vec![0, 0, 9, 9, 0, 0]);
        let runs = diff_devices(&a, &b, 6, 2);
        assert_eq!(runs, vec![DiffRun { start: 2, length: 2 }]);
    }
}
