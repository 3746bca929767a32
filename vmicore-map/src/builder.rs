use crate::candidate::{self, Selection};
use crate::embed::{embeds, EmbedResult};
use crate::layout;
use crate::node::{MemoryMapNode, NodeId};
use crate::range_tree::MemoryRangeTree;
use crate::worklist::{AddressCoordinator, PriorityWorklist};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use vmicore_diagnostics::{Diagnostic, DiagnosticEngine, ErrorKind, SourceLoc};
use vmicore_mem::{MemoryDevice, VirtualToPhysical};
use vmicore_rules::{MatchContext, MatchResult, RuleEngine, ScriptHost};
use vmicore_types::{Catalog, ReferencingRef, TypeId, TypeKind};

/// Runtime-tunable knobs for one build (spec.md §4.E, "Runtime-tunable
/// knobs" in the ambient configuration layer). Serializable so the CLI
/// can load it from a TOML file and override individual fields with
/// flags.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BuilderConfig {
    pub probability_floor: f64,
    pub worker_threads: usize,
    pub replacement_margin: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            probability_floor: 0.05,
            worker_threads: num_cpus::get().min(32).max(1),
            replacement_margin: candidate::DEFAULT_REPLACEMENT_MARGIN,
        }
    }
}

/// A conflict recorded by duplicate suppression (spec.md §4.E.6: "keep
/// the higher-probability one and record the conflict").
#[derive(Debug, Clone)]
pub struct Conflict {
    pub kept: NodeId,
    pub dropped_address: u64,
    pub dropped_type: TypeId,
}

pub struct BuildOutput {
    pub tree: MemoryRangeTree,
    pub nodes: HashMap<NodeId, MemoryMapNode>,
    pub diagnostics: DiagnosticEngine,
    pub conflicts: Vec<Conflict>,
}

struct RootSeed {
    address: u64,
    type_id: TypeId,
    name: String,
    cpu: Option<u16>,
    /// The catalog site this root was seeded from, if any (spec.md §3).
    /// Carried onto the root's [`MemoryMapNode`] so a later dereference of
    /// a pointer-typed global can still look up its alternate-type
    /// candidates.
    site: Option<ReferencingRef>,
}

fn enumerate_roots(catalog: &Catalog) -> Vec<RootSeed> {
    let mut roots = Vec::new();
    for (var_id, var) in catalog.vars_with_ids() {
        let site = Some(ReferencingRef::Variable(var_id));
        match &var.percpu_offsets {
            Some(offsets) => {
                for (cpu, offset) in offsets.iter().enumerate() {
                    roots.push(RootSeed {
                        address: var.address.wrapping_add(*offset),
                        type_id: var.type_id,
                        name: var.name.clone(),
                        cpu: Some(cpu as u16),
                        site,
                    });
                }
            }
            None => roots.push(RootSeed { address: var.address, type_id: var.type_id, name: var.name.clone(), cpu: None, site }),
        }
    }
    for ty in catalog.all_types() {
        if let TypeKind::Function { low_pc, .. } = ty.kind {
            roots.push(RootSeed { address: low_pc, type_id: ty.id, name: ty.name.clone().unwrap_or_default(), cpu: None, site: None });
        }
    }
    roots
}

/// Drives root enumeration and parallel expansion into a finished
/// [`BuildOutput`] (spec.md §4.E). Threads coordinate through a shared
/// worklist, an address-claim table, and the range tree's own lock; no
/// other shared mutable state exists, matching spec.md §5's resource
/// list.
pub struct MapBuilder<'a> {
    pub catalog: &'a Catalog,
    pub device: &'a dyn MemoryDevice,
    pub v2p: &'a dyn VirtualToPhysical,
    pub rules: &'a RuleEngine,
    pub host: &'a dyn ScriptHost,
    pub config: BuilderConfig,
}

impl<'a> MapBuilder<'a> {
    pub fn new(catalog: &'a Catalog, device: &'a dyn MemoryDevice, v2p: &'a dyn VirtualToPhysical, rules: &'a RuleEngine, host: &'a dyn ScriptHost, config: BuilderConfig) -> Self {
        Self { catalog, device, v2p, rules, host, config }
    }

    pub fn build(&self, interrupted: &AtomicBool) -> BuildOutput {
        let tree = MemoryRangeTree::new();
        let nodes: RwLock<HashMap<NodeId, MemoryMapNode>> = RwLock::new(HashMap::new());
        let next_id = AtomicU32::new(0);
        let worklist: PriorityWorklist<NodeId> = PriorityWorklist::new(self.config.probability_floor);
        let coordinator = AddressCoordinator::new(self.config.worker_threads);
        let diagnostics = Mutex::new(DiagnosticEngine::new());
        let conflicts = Mutex::new(Vec::new());
        let active = AtomicUsize::new(0);

        for root in enumerate_roots(self.catalog) {
            let Some(size) = layout::type_size(self.catalog, root.type_id) else { continue };
            let id = NodeId(next_id.fetch_add(1, Ordering::Relaxed));
            let mut node = MemoryMapNode::new(id, root.address, size, root.type_id, type_name(self.catalog, root.type_id), root.name).with_site(root.site);
            if let Some(cpu) = root.cpu {
                node = node.with_cpu(cpu);
            }
            tree.insert(&node);
            let probability = node.probability;
            nodes.write().insert(id, node);
            worklist.push(probability, id);
        }

        std::thread::scope(|scope| {
            for thread_id in 0..self.config.worker_threads {
                let worklist = &worklist;
                let tree = &tree;
                let nodes = &nodes;
                let next_id = &next_id;
                let coordinator = &coordinator;
                let diagnostics = &diagnostics;
                let conflicts = &conflicts;
                let active = &active;
                scope.spawn(move || {
                    self.worker_loop(thread_id, worklist, tree, nodes, next_id, interrupted, coordinator, diagnostics, conflicts, active);
                });
            }
        });

        BuildOutput { tree, nodes: nodes.into_inner(), diagnostics: diagnostics.into_inner(), conflicts: conflicts.into_inner() }
    }

    #[allow(clippy::too_many_arguments)]
    fn worker_loop(
        &self,
        thread_id: usize,
        worklist: &PriorityWorklist<NodeId>,
        tree: &MemoryRangeTree,
        nodes: &RwLock<HashMap<NodeId, MemoryMapNode>>,
        next_id: &AtomicU32,
        interrupted: &AtomicBool,
        coordinator: &AddressCoordinator,
        diagnostics: &Mutex<DiagnosticEngine>,
        conflicts: &Mutex<Vec<Conflict>>,
        active: &AtomicUsize,
    ) {
        loop {
            if interrupted.load(Ordering::Acquire) {
                return;
            }
            match worklist.pop() {
                Some(node_id) => {
                    active.fetch_add(1, Ordering::AcqRel);
                    self.expand(thread_id, node_id, worklist, tree, nodes, next_id, coordinator, diagnostics, conflicts, interrupted);
                    active.fetch_sub(1, Ordering::AcqRel);
                }
                None => {
                    if active.load(Ordering::Acquire) == 0 {
                        return;
                    }
                    std::thread::yield_now();
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        thread_id: usize,
        node_id: NodeId,
        worklist: &PriorityWorklist<NodeId>,
        tree: &MemoryRangeTree,
        nodes: &RwLock<HashMap<NodeId, MemoryMapNode>>,
        next_id: &AtomicU32,
        coordinator: &AddressCoordinator,
        diagnostics: &Mutex<DiagnosticEngine>,
        conflicts: &Mutex<Vec<Conflict>>,
        interrupted: &AtomicBool,
    ) {
        let Some(node) = nodes.read().get(&node_id).cloned() else { return };
        let resolved_id = self.catalog.resolve_referencing(node.type_id).unwrap_or(node.type_id);
        let Some(resolved_ty) = self.catalog.by_id(resolved_id) else { return };

        match resolved_ty.kind {
            TypeKind::Pointer { target } => {
                if let Some(target_addr) = self.read_pointer(node.address) {
                    // The dereferenced value is still reached through the
                    // same declared site as the pointer itself (spec.md
                    // §3): alt-refs learned for `h` apply to what `h`
                    // points at, however many hops deep.
                    self.try_expand_child(thread_id, &node, target, target_addr, "", node.site, worklist, tree, nodes, next_id, coordinator, diagnostics, conflicts);
                }
            }
            TypeKind::Struct { members } | TypeKind::Union { members } => {
                for (member_index, member) in members.iter().enumerate() {
                    if interrupted.load(Ordering::Acquire) {
                        return;
                    }
                    let member_resolved = self.catalog.resolve_referencing(member.type_id).unwrap_or(member.type_id);
                    let Some(member_ty) = self.catalog.by_id(member_resolved) else { continue };
                    if !layout::is_expandable(&member_ty.kind) {
                        continue;
                    }
                    let child_addr = node.address.wrapping_add(member.offset);
                    let site = Some(ReferencingRef::Member { owner: resolved_ty.id, member_index: member_index as u32 });
                    self.try_expand_child(thread_id, &node, member.type_id, child_addr, &member.name, site, worklist, tree, nodes, next_id, coordinator, diagnostics, conflicts);
                }
            }
            TypeKind::Array { element, length } => {
                let elem_resolved = self.catalog.resolve_referencing(element).unwrap_or(element);
                let Some(elem_ty) = self.catalog.by_id(elem_resolved) else { return };
                if !layout::is_expandable(&elem_ty.kind) {
                    return;
                }
                let Some(elem_size) = layout::type_size(self.catalog, element) else { return };
                for i in 0..length.unwrap_or(0) as u64 {
                    if interrupted.load(Ordering::Acquire) {
                        return;
                    }
                    let child_addr = node.address.wrapping_add(i * elem_size);
                    // Array elements have no referencing-site identity of
                    // their own (spec.md §3 only names member, variable,
                    // and parameter sites), so no alt-ref lookup applies.
                    self.try_expand_child(thread_id, &node, element, child_addr, &format!("[{i}]"), None, worklist, tree, nodes, next_id, coordinator, diagnostics, conflicts);
                }
            }
            _ => {}
        }
    }

    fn read_pointer(&self, vaddr: u64) -> Option<u64> {
        let phys = self.v2p.translate(vaddr)?;
        self.device.read_u64(phys).ok()
    }

    #[allow(clippy::too_many_arguments)]
    fn try_expand_child(
        &self,
        thread_id: usize,
        parent: &MemoryMapNode,
        naive_type: TypeId,
        addr: u64,
        member_segment: &str,
        site: Option<ReferencingRef>,
        worklist: &PriorityWorklist<NodeId>,
        tree: &MemoryRangeTree,
        nodes: &RwLock<HashMap<NodeId, MemoryMapNode>>,
        next_id: &AtomicU32,
        coordinator: &AddressCoordinator,
        diagnostics: &Mutex<DiagnosticEngine>,
        conflicts: &Mutex<Vec<Conflict>>,
    ) {
        let depth = parent.depth + 1;
        let name_path = parent.child_path(member_segment);
        let inst = vmicore_types::Instance::new(addr, naive_type, name_path.clone(), vmicore_types::InstanceOrigin::Dereference);
        let ctx = MatchContext {
            type_name: self.catalog.by_id(naive_type).and_then(|t| t.name.clone()),
            type_id: Some(naive_type),
            member_path: if member_segment.is_empty() { None } else { Some(member_segment.to_string()) },
            variable_name: None,
            symbol_file: None,
            os_version: None,
        };
        let resolve_type = |name: &str| self.catalog.by_name(name).first().copied();
        let resolve_offset = |type_id: TypeId, member: &str| -> Option<u64> {
            self.catalog.by_id(type_id).and_then(|t| t.kind.members().and_then(|ms| ms.iter().find(|m| m.name == member).map(|m| m.offset)))
        };

        let mut diag_guard = diagnostics.lock();
        let match_result = self.rules.apply(&inst, &ctx, resolve_type, resolve_offset, self.host, &mut diag_guard);
        drop(diag_guard);

        match match_result {
            MatchResult::Defer => {}
            MatchResult::Match { new_address, new_type_name } => {
                let resolved_type = self.catalog.by_name(&new_type_name).first().copied().unwrap_or(naive_type);
                let probability = self.score_candidate(new_address, resolved_type, depth);
                self.finalize_child(thread_id, parent.id, new_address, resolved_type, probability, &name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
            }
            MatchResult::Ambiguous => {
                diagnostics.lock().emit(Diagnostic::warning(
                    ErrorKind::Rule,
                    format!("ambiguous rule match for {name_path}, falling back to declared type"),
                    SourceLoc::unknown(),
                ));
                self.select_and_finalize(thread_id, parent, naive_type, addr, &name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
            }
            MatchResult::NoMatch | MatchResult::DefaultHandler => {
                self.select_and_finalize(thread_id, parent, naive_type, addr, &name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn select_and_finalize(
        &self,
        thread_id: usize,
        parent: &MemoryMapNode,
        naive_type: TypeId,
        addr: u64,
        name_path: &str,
        depth: u32,
        site: Option<ReferencingRef>,
        worklist: &PriorityWorklist<NodeId>,
        tree: &MemoryRangeTree,
        nodes: &RwLock<HashMap<NodeId, MemoryMapNode>>,
        next_id: &AtomicU32,
        coordinator: &AddressCoordinator,
        conflicts: &Mutex<Vec<Conflict>>,
    ) {
        let p0 = self.score_candidate(addr, naive_type, depth);
        let resolve_offset = |type_id: TypeId, member: &str| -> Option<u64> {
            self.catalog.by_id(type_id).and_then(|t| t.kind.members().and_then(|ms| ms.iter().find(|m| m.name == member).map(|m| m.offset)))
        };
        let alternates = site.map(|s| self.catalog.alt_refs_for(s)).unwrap_or_default();
        let alt_candidates: Vec<(TypeId, u64)> = alternates
            .entries()
            .iter()
            .filter_map(|e| e.addr_expr.evaluate(addr, resolve_offset).map(|a| (e.target, a)))
            .collect();
        let alt_probs: Vec<f64> = alt_candidates.iter().map(|(t, a)| self.score_candidate(*a, *t, depth)).collect();

        match candidate::select_candidate(p0, &alt_probs, self.config.replacement_margin) {
            Selection::Keep => {
                self.finalize_child(thread_id, parent.id, addr, naive_type, p0, name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
            }
            Selection::Replace(i) => {
                let (t, a) = alt_candidates[i];
                self.finalize_child(thread_id, parent.id, a, t, alt_probs[i], name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
            }
            Selection::Siblings(idxs) => {
                for i in idxs {
                    let (t, a) = alt_candidates[i];
                    self.finalize_child(thread_id, parent.id, a, t, alt_probs[i], name_path, depth, site, worklist, tree, nodes, next_id, coordinator, conflicts);
                }
            }
        }
    }

    fn score_candidate(&self, addr: u64, type_id: TypeId, depth: u32) -> f64 {
        let Some(size) = layout::type_size(self.catalog, type_id) else { return 0.0 };
        let Some(phys) = self.v2p.translate(addr) else {
            return 0.0;
        };
        let read_ok = self.device.read_at(phys, size.max(1) as usize).is_ok();
        let factors = crate::probability::ProbabilityFactors {
            address_valid: addr != 0,
            read_ok,
            slab_agreement: self.slab_agreement(addr, type_id),
            magic_match: self.magic_match(phys, size.max(1) as usize, type_id),
            member_init_agreement: self.member_init_agreement(phys, size.max(1) as usize, type_id),
            depth,
        };
        factors.compute()
    }

    /// Reads each known-constant member's observed value against the
    /// bytes actually in memory, returning `(checked, agree)` pairs so
    /// `magic_match` and `member_init_agreement` can derive their
    /// different aggregates from the same scan (spec.md §4.E.4).
    fn member_const_agreements(&self, phys: u64, size: usize, type_id: TypeId) -> Option<Vec<bool>> {
        let ty = self.catalog.by_id(type_id)?;
        let members = ty.kind.members()?;
        let bytes = self.device.read_at(phys, size).ok()?;
        let mut agreements = Vec::new();
        for member in members {
            if member.const_facts.is_not_constant() || member.const_facts.ints().is_empty() {
                continue;
            }
            let off = member.offset as usize;
            let width = layout::type_size(self.catalog, member.type_id).unwrap_or(0) as usize;
            if width == 0 || width > 8 || off + width > bytes.len() {
                continue;
            }
            let mut buf = [0u8; 8];
            buf[..width].copy_from_slice(&bytes[off..off + width]);
            let observed = i64::from_le_bytes(buf);
            agreements.push(member.const_facts.matches_int(observed));
        }
        if agreements.is_empty() {
            None
        } else {
            Some(agreements)
        }
    }

    /// Presence of a magic number matching a learned value (spec.md
    /// §4.E.4): `Some(true)` if at least one known-constant member's
    /// observed value matches, a weaker signal than full member-init
    /// agreement below.
    fn magic_match(&self, phys: u64, size: usize, type_id: TypeId) -> Option<bool> {
        let agreements = self.member_const_agreements(phys, size, type_id)?;
        Some(agreements.iter().any(|&ok| ok))
    }

    /// Whether every known-constant member agrees with what's actually in
    /// memory (spec.md §4.E.4's lowest-dominance criterion).
    fn member_init_agreement(&self, phys: u64, size: usize, type_id: TypeId) -> Option<bool> {
        let agreements = self.member_const_agreements(phys, size, type_id)?;
        Some(agreements.iter().all(|&ok| ok))
    }

    /// Whether the candidate's address looks consistent with a live slab
    /// allocation. `MapBuilder` has no slab-cache data source to check
    /// against (the same gap `verifier::verify`'s `slab_valid` callback
    /// works around by taking it from the caller), so this criterion is
    /// left unscored rather than faked.
    fn slab_agreement(&self, addr: u64, type_id: TypeId) -> Option<bool> {
        let _ = (addr, type_id);
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize_child(
        &self,
        thread_id: usize,
        parent_id: NodeId,
        addr: u64,
        type_id: TypeId,
        probability: f64,
        name_path: &str,
        depth: u32,
        site: Option<ReferencingRef>,
        worklist: &PriorityWorklist<NodeId>,
        tree: &MemoryRangeTree,
        nodes: &RwLock<HashMap<NodeId, MemoryMapNode>>,
        next_id: &AtomicU32,
        coordinator: &AddressCoordinator,
        conflicts: &Mutex<Vec<Conflict>>,
    ) {
        if probability < self.config.probability_floor {
            return;
        }
        let size = layout::type_size(self.catalog, type_id).unwrap_or(1).max(1);
        coordinator.claim(thread_id, addr);

        let overlapping = tree.objects_in_range(addr, addr + size);
        let mut reused = None;
        let mut replace_target: Option<NodeId> = None;
        for existing_id in &overlapping {
            let existing = { nodes.read().get(existing_id).cloned() };
            let Some(existing) = existing else { continue };
            match embeds((existing.address, existing.end_address()), (addr, addr + size)) {
                EmbedResult::Equal | EmbedResult::FirstEmbedsSecond => {
                    reused = Some(*existing_id);
                    break;
                }
                EmbedResult::SecondEmbedsFirst => {
                    replace_target = Some(*existing_id);
                    break;
                }
                EmbedResult::Overlap => {
                    if existing.probability >= probability {
                        conflicts.lock().push(Conflict { kept: *existing_id, dropped_address: addr, dropped_type: type_id });
                        coordinator.release(thread_id);
                        return;
                    } else {
                        conflicts.lock().push(Conflict { kept: *existing_id, dropped_address: existing.address, dropped_type: existing.type_id });
                    }
                }
                EmbedResult::Disjoint => {}
            }
        }

        if let Some(existing_id) = reused {
            if let Some(existing) = nodes.write().get_mut(&existing_id) {
                existing.found_in_chains += 1;
            }
            coordinator.release(thread_id);
            return;
        }

        let id = replace_target.unwrap_or_else(|| NodeId(next_id.fetch_add(1, Ordering::Relaxed)));
        let mut node = MemoryMapNode::new(id, addr, size, type_id, type_name(self.catalog, type_id), name_path)
            .with_probability(probability)
            .with_depth(depth)
            .with_site(site);
        node.parent = Some(parent_id);
        tree.insert(&node);
        nodes.write().insert(id, node);
        if let Some(parent) = nodes.write().get_mut(&parent_id) {
            parent.children.push(id);
        }
        coordinator.release(thread_id);
        worklist.push(probability, id);
    }
}

fn type_name(catalog: &Catalog, type_id: TypeId) -> String {
    catalog.by_id(type_id).and_then(|t| t.name).unwrap_or_else(|| format!("{type_id}"))
}
