use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to open dump file: {0}")]
    Open(#[from] std::io::Error),

    #[error("read of {len} bytes at physical address {addr:#x} is out of range (dump is {size} bytes)")]
    OutOfRange { addr: u64, len: usize, size: u64 },

    #[error("no virtual-to-physical mapping for address {0:#x}")]
    TranslationFailed(u64),
}
