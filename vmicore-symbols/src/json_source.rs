use crate::error::SymbolError;
use crate::record::SymbolRecord;
use crate::source::SymbolSource;
use std::path::{Path, PathBuf};

/// A [`SymbolSource`] backed by a JSON file of [`SymbolRecord`]s, for
/// embeddings and tests that don't wire up a real DWARF reader.
pub struct JsonFileSymbolSource {
    path: PathBuf,
}

impl JsonFileSymbolSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl SymbolSource for JsonFileSymbolSource {
    fn read_records(&mut self) -> Result<Vec<SymbolRecord>, SymbolError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| SymbolError::Source(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| SymbolError::Source(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawTypeKind;

    #[test]
    fn round_trips_through_json() {
        let records = vec![SymbolRecord::Type { local_id: 1, name: Some("int".into()), kind: RawTypeKind::Integer { signed: true, width: 4 } }];
        let json = serde_json::to_string(&records).unwrap();
        let back: Vec<SymbolRecord> = serde_json::from_str(&json).unwrap();
        assert!(matches!(back[0], SymbolRecord::Type { local_id: 1, .. }));
    }
}
