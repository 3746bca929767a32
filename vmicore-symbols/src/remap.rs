use std::collections::HashMap;
use vmicore_types::TypeId;

/// Key that deterministically maps a `(origId, fileIndex,
/// arrayDimensionIndex)` triple to a single catalog `TypeId` (spec.md
/// §3): each dimension of a multi-dimensional array gets its own id even
/// though the source symbol stream only assigns one id to the whole
/// array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionKey {
    pub orig_id: u32,
    pub file_index: u32,
    pub array_dimension_index: u32,
}

/// Per-symbol-file local-id -> global-`TypeId` table, built up as records
/// are consumed in a single forward pass (types may reference not-yet-seen
/// ids, so remapping is two-phase: reserve then resolve).
#[derive(Debug, Default)]
pub struct IdRemapper {
    file_index: u32,
    local_to_global: HashMap<u32, TypeId>,
    dimensions: HashMap<DimensionKey, TypeId>,
}

impl IdRemapper {
    pub fn new(file_index: u32) -> Self {
        Self { file_index, local_to_global: HashMap::new(), dimensions: HashMap::new() }
    }

    pub fn bind(&mut self, local_id: u32, global_id: TypeId) {
        self.local_to_global.insert(local_id, global_id);
    }

    pub fn global_id(&self, local_id: u32) -> Option<TypeId> {
        self.local_to_global.get(&local_id).copied()
    }

    pub fn bind_dimension(&mut self, orig_id: u32, array_dimension_index: u32, global_id: TypeId) {
        self.dimensions.insert(
            DimensionKey { orig_id, file_index: self.file_index, array_dimension_index },
            global_id,
        );
    }

    pub fn dimension_id(&self, orig_id: u32, array_dimension_index: u32) -> Option<TypeId> {
        self.dimensions
            .get(&DimensionKey { orig_id, file_index: self.file_index, array_dimension_index })
            .copied()
    }
}
