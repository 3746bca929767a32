use crate::altref::{AltRefEntry, AltRefType, ReferencingRef};
use crate::error::CatalogError;
use crate::hash::StructuralHash;
use crate::type_id::{TypeId, VarId};
use crate::type_kind::Type;
use crate::variable::Variable;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Result of looking up a type by its lexical `AstType` chain (spec.md
/// §4.A): the catalog returns both the pointer-included and
/// pointer-stripped candidate lists so the caller (the ast crate's
/// `AstType::resolve`) can disambiguate using whatever context it has.
#[derive(Debug, Clone, Default)]
pub struct FoundTypes {
    pub with_pointer: Vec<TypeId>,
    pub without_pointer: Vec<TypeId>,
}

impl FoundTypes {
    pub fn is_empty(&self) -> bool {
        self.with_pointer.is_empty() && self.without_pointer.is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.with_pointer.len() + self.without_pointer.len() > 1
    }
}

/// The universe of C types, variables, and struct members (spec.md §4.A).
///
/// Tables are sharded `DashMap`s so concurrent readers (the map builder's
/// worker threads) don't contend with each other; mutation (alternate-type
/// insertion from the AST evaluator) bumps `change_clock` so the lazily
/// cached referencing-resolution results in `resolved_cache` self-invalidate.
pub struct Catalog {
    by_id: DashMap<TypeId, Type>,
    by_name: DashMap<String, Vec<TypeId>>,
    by_hash: DashMap<StructuralHash, Vec<TypeId>>,
    vars: DashMap<VarId, Variable>,
    alt_refs: DashMap<ReferencingRef, AltRefType>,
    /// Lazily computed, clock-stamped cache of `resolve_referencing`
    /// results: `(resolved_type, clock_at_computation)`.
    resolved_cache: DashMap<TypeId, (TypeId, u64)>,
    change_clock: AtomicU64,
    next_type_id: AtomicU32,
    next_var_id: AtomicU32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            by_hash: DashMap::new(),
            vars: DashMap::new(),
            alt_refs: DashMap::new(),
            resolved_cache: DashMap::new(),
            change_clock: AtomicU64::new(0),
            next_type_id: AtomicU32::new(0),
            next_var_id: AtomicU32::new(0),
        }
    }

    pub fn change_clock(&self) -> u64 {
        self.change_clock.load(Ordering::Acquire)
    }

    fn bump_clock(&self) -> u64 {
        self.change_clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn by_id(&self, id: TypeId) -> Option<Type> {
        self.by_id.get(&id).map(|e| e.value().clone())
    }

    pub fn by_name(&self, name: &str) -> Vec<TypeId> {
        self.by_name.get(name).map(|e| e.value().clone()).unwrap_or_default()
    }

    pub fn by_hash(&self, hash: StructuralHash) -> Vec<TypeId> {
        self.by_hash.get(&hash).map(|e| e.value().clone()).unwrap_or_default()
    }

    /// Every type currently in the catalog. Used by bulk consumers (the
    /// map builder's function-root scan) that need to walk the whole
    /// universe rather than look up one id/name/hash at a time.
    pub fn all_types(&self) -> Vec<Type> {
        self.by_id.iter().map(|e| e.value().clone()).collect()
    }

    pub fn vars(&self) -> Vec<Variable> {
        self.vars.iter().map(|e| e.value().clone()).collect()
    }

    /// Every variable paired with the id it was registered under. Root
    /// enumeration needs the id (not just the name) to build the
    /// `ReferencingRef::Variable` site for each root it seeds.
    pub fn vars_with_ids(&self) -> Vec<(VarId, Variable)> {
        self.vars.iter().map(|e| (*e.key(), e.value().clone())).collect()
    }

    pub fn var(&self, id: VarId) -> Option<Variable> {
        self.vars.get(&id).map(|e| e.value().clone())
    }

    /// Finds a global variable by name. Used to resolve a bare-identifier
    /// assignment site to a `ReferencingRef::Variable` without the caller
    /// having to carry `VarId`s around from wherever the variable was
    /// first declared.
    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.vars.iter().find(|e| e.value().name == name).map(|e| *e.key())
    }

    /// All type ids sharing `id`'s structural hash, `id` itself excluded.
    pub fn equivalent_types(&self, id: TypeId) -> Vec<TypeId> {
        let Some(ty) = self.by_id(id) else {
            return Vec::new();
        };
        self.by_hash(ty.hash).into_iter().filter(|&t| t != id).collect()
    }

    /// Interns a type. Structural-hash collisions between structurally
    /// distinct types are impossible by construction (spec.md §4.A), so a
    /// matching hash always means the type is already present; in that
    /// case the existing id is returned instead of creating a duplicate.
    pub fn add_type(&self, mut ty: Type) -> TypeId {
        if let Some(existing) = self
            .by_hash
            .get(&ty.hash)
            .and_then(|ids| ids.value().first().copied())
        {
            return existing;
        }
        let id = TypeId(self.next_type_id.fetch_add(1, Ordering::Relaxed));
        ty.id = id;
        if let Some(name) = ty.name.clone() {
            self.by_name.entry(name).or_default().push(id);
        }
        self.by_hash.entry(ty.hash).or_default().push(id);
        self.by_id.insert(id, ty);
        self.bump_clock();
        id
    }

    /// Reserves a fresh id backed by a `Void` placeholder, without touching
    /// `by_hash` (a shared placeholder hash would make every reservation
    /// collide onto the first one via `add_type`'s interning check). Used by
    /// bulk symbol import to hand out stable ids to a forward-declared type
    /// before its shape (and therefore its real hash) is known.
    pub fn reserve_type_id(&self) -> TypeId {
        let id = TypeId(self.next_type_id.fetch_add(1, Ordering::Relaxed));
        let hash = self.compute_hash(None, &crate::type_kind::TypeKind::Void);
        self.by_id.insert(id, Type::new(id, None, crate::type_kind::TypeKind::Void, hash));
        self.bump_clock();
        id
    }

    /// Fills in the real shape of a type previously obtained from
    /// `reserve_type_id`, now that its member/target ids are resolvable.
    /// Keeps the id stable so references taken before finalization (struct
    /// self-pointers, mutually recursive structs) stay valid.
    pub fn finalize_type(&self, id: TypeId, name: Option<String>, kind: crate::type_kind::TypeKind) -> TypeId {
        let hash = self.compute_hash(name.as_deref(), &kind);
        if let Some(mut entry) = self.by_id.get_mut(&id) {
            entry.name = name.clone();
            entry.kind = kind;
            entry.hash = hash;
        }
        if let Some(name) = name {
            self.by_name.entry(name).or_default().push(id);
        }
        self.by_hash.entry(hash).or_default().push(id);
        self.bump_clock();
        id
    }

    pub fn add_variable(&self, var: Variable) -> VarId {
        let id = VarId(self.next_var_id.fetch_add(1, Ordering::Relaxed));
        self.vars.insert(id, var);
        self.bump_clock();
        id
    }

    /// Registers an alternate-type fact learned by the AST evaluator
    /// (spec.md §4.A). New entries are probed before previously known ones.
    /// Replaying an already-known `(target, addr_expr)` pair at the same
    /// site is a no-op, so re-walking an unchanged translation unit doesn't
    /// grow the list (spec.md §8 idempotence).
    pub fn add_alternate_type(&self, site: ReferencingRef, target: TypeId, addr_expr: crate::altref::AddrExpr) {
        let candidate = AltRefEntry { target, addr_expr };
        let mut entry = self.alt_refs.entry(site).or_default();
        if entry.contains(&candidate) {
            return;
        }
        entry.push_front(candidate);
        drop(entry);
        self.bump_clock();
    }

    pub fn alt_refs_for(&self, site: ReferencingRef) -> AltRefType {
        self.alt_refs.get(&site).map(|e| e.value().clone()).unwrap_or_default()
    }

    /// Folds newly observed constant-assignment facts into a struct/union
    /// member in place (spec.md §4.C). No-op if `owner` isn't an aggregate
    /// or `member_index` is out of range.
    pub fn merge_member_facts(&self, owner: TypeId, member_index: u32, facts: &crate::member::ConstFacts) {
        let Some(mut entry) = self.by_id.get_mut(&owner) else {
            return;
        };
        let Some(members) = entry.kind.members_mut() else {
            return;
        };
        if let Some(member) = members.get_mut(member_index as usize) {
            member.const_facts.merge_from(facts);
        }
    }

    /// Follows typedef/const/volatile (but not pointers or arrays) until a
    /// concrete type is reached. A void pointer is never dereferenced
    /// during this walk. Results are cached against the clock value seen
    /// at computation time; a stale cache entry (older than the current
    /// clock) is recomputed rather than trusted.
    pub fn resolve_referencing(&self, id: TypeId) -> Result<TypeId, CatalogError> {
        let current_clock = self.change_clock();
        if let Some(cached) = self.resolved_cache.get(&id) {
            let (resolved, at_clock) = *cached.value();
            if at_clock == current_clock {
                return Ok(resolved);
            }
        }

        let mut cur = id;
        loop {
            let ty = self.by_id(cur).ok_or(CatalogError::UnknownType(cur))?;
            match ty.kind.referenced() {
                Some(next) if ty.kind.is_transparent() => cur = next,
                _ => break,
            }
        }

        self.resolved_cache.insert(id, (cur, current_clock));
        Ok(cur)
    }

    pub fn compute_hash(&self, name: Option<&str>, kind: &crate::type_kind::TypeKind) -> StructuralHash {
        use crate::hash::Hasher32;
        let mut hasher = Hasher32::new();
        hasher.write_str(name.unwrap_or(""));
        hasher.write_str(kind.kind_tag());
        match kind {
            crate::type_kind::TypeKind::Integer { signed, width } => {
                hasher.write_u8(*signed as u8);
                hasher.write_u8(*width);
            }
            crate::type_kind::TypeKind::Float { width } => hasher.write_u8(*width),
            crate::type_kind::TypeKind::Enum { values } => {
                for (name, value) in values {
                    hasher.write_str(name);
                    hasher.write_i64(*value);
                }
            }
            crate::type_kind::TypeKind::Pointer { target }
            | crate::type_kind::TypeKind::Typedef { target }
            | crate::type_kind::TypeKind::Const { target }
            | crate::type_kind::TypeKind::Volatile { target } => {
                if let Some(referenced) = self.by_id(*target) {
                    hasher.write_hash(referenced.hash);
                } else {
                    hasher.write_u32(target.0);
                }
            }
            crate::type_kind::TypeKind::Array { element, length } => {
                if let Some(referenced) = self.by_id(*element) {
                    hasher.write_hash(referenced.hash);
                } else {
                    hasher.write_u32(element.0);
                }
                hasher.write_u32(length.unwrap_or(u32::MAX));
            }
            crate::type_kind::TypeKind::FuncPointer { params, returns } => {
                for p in params {
                    hasher.write_u32(p.0);
                }
                hasher.write_u32(returns.0);
            }
            crate::type_kind::TypeKind::Struct { members } | crate::type_kind::TypeKind::Union { members } => {
                for m in members {
                    hasher.write_str(&m.name);
                    hasher.write_u64(m.offset);
                    if let Some((bit_off, bit_size)) = m.bits {
                        hasher.write_u32(u32::from(bit_off) << 16 | u32::from(bit_size));
                    }
                    if let Some(referenced) = self.by_id(m.type_id) {
                        hasher.write_hash(referenced.hash);
                    } else {
                        hasher.write_u32(m.type_id.0);
                    }
                }
            }
            crate::type_kind::TypeKind::Function { low_pc, high_pc, params } => {
                hasher.write_u64(*low_pc);
                hasher.write_u64(*high_pc);
                for p in params {
                    hasher.write_u32(p.type_id.0);
                }
            }
            crate::type_kind::TypeKind::Void => {}
        }
        hasher.finish()
    }
}
