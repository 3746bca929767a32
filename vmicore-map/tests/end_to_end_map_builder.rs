//! Builds a small singly-linked list of `node` structs in a fake memory
//! device and runs the real builder pipeline end to end: root
//! enumeration from a catalog variable, pointer-chasing expansion,
//! struct member expansion, and the probability floor terminating the
//! chain at a null `next`.

use std::sync::atomic::AtomicBool;
use vmicore_map::{BuilderConfig, MapBuilder};
use vmicore_mem::{LinearOffsetTranslator, MemoryDevice, MemoryError, VirtualToPhysical};
use vmicore_rules::{NoOpScriptHost, RuleEngine};
use vmicore_types::{AddrExpr, Catalog, Member, ReferencingRef, Type, TypeKind, Variable};

const ROOT_ADDR: u64 = 0x1000;
const N1: u64 = 0x2000;
const N2: u64 = 0x3000;
const N3: u64 = 0x4000;
const BUF_SIZE: usize = 0x5000;

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

fn write_u64(buf: &mut [u8], addr: u64, value: u64) {
    let start = addr as usize;
    buf[start..start + 8].copy_from_slice(&value.to_le_bytes());
}

fn write_i32(buf: &mut [u8], addr: u64, value: i32) {
    let start = addr as usize;
    buf[start..start + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn singly_linked_list_of_three_nodes_is_discovered_and_terminates_on_null() {
    let catalog = Catalog::new();

    let int_hash = catalog.compute_hash(None, &TypeKind::Integer { signed: true, width: 4 });
    let int_id = catalog.add_type(Type::new(vmicore_types::TypeId(0), None, TypeKind::Integer { signed: true, width: 4 }, int_hash));

    let node_id = catalog.reserve_type_id();
    let ptr_hash = catalog.compute_hash(None, &TypeKind::Pointer { target: node_id });
    let ptr_id = catalog.add_type(Type::new(vmicore_types::TypeId(0), None, TypeKind::Pointer { target: node_id }, ptr_hash));

    let members = vec![Member::new("next", ptr_id, 0), Member::new("foo", int_id, 8)];
    catalog.finalize_type(node_id, Some("node".to_string()), TypeKind::Struct { members });

    catalog.add_variable(Variable::new("modules", ptr_id, ROOT_ADDR, 0));

    let mut bytes = vec![0u8; BUF_SIZE];
    write_u64(&mut bytes, ROOT_ADDR, N1);
    write_u64(&mut bytes, N1, N2);
    write_i32(&mut bytes, N1 + 8, 1);
    write_u64(&mut bytes, N2, N3);
    write_i32(&mut bytes, N2 + 8, 2);
    write_u64(&mut bytes, N3, 0);
    write_i32(&mut bytes, N3 + 8, 3);
    let device = FakeDevice(bytes);

    let v2p = LinearOffsetTranslator { virt_base: 0, phys_base: 0, len: device.size() };
    let rules = RuleEngine::load("<rules></rules>", |_| None).expect("empty rule file parses");
    let host = NoOpScriptHost;
    let config = BuilderConfig { probability_floor: 0.05, worker_threads: 1, replacement_margin: 0.1 };

    let builder = MapBuilder::new(&catalog, &device, &v2p, &rules, &host, config);
    let interrupted = AtomicBool::new(false);
    let result = builder.build(&interrupted);

    assert!(result.diagnostics.error_count() == 0, "unexpected diagnostics during a clean build");

    let mut node_addrs: Vec<u64> = result.nodes.values().filter(|n| n.type_id == node_id).map(|n| n.address).collect();
    node_addrs.sort_unstable();
    assert_eq!(node_addrs, vec![N1, N2, N3], "expected exactly the three reachable `node` objects, chain stopped at the null terminator");

    for node in result.nodes.values().filter(|n| n.type_id == node_id) {
        assert!(node.probability >= config.probability_floor);
    }

    let middle = result.nodes.values().find(|n| n.type_id == node_id && n.address == N2).expect("middle node present");
    let hits = result.tree.objects_in_range(N2, N2 + 1);
    assert!(hits.contains(&middle.id), "range tree lookup at the middle node's address should resolve to it");

    let root = result.nodes.values().find(|n| n.address == ROOT_ADDR).expect("root node present");
    let first = result.nodes.values().find(|n| n.type_id == node_id && n.address == N1).expect("first node present");
    assert!(first.parent.is_some());
    assert_ne!(first.parent.unwrap(), middle.id);
    let _ = root;
}

/// A pointer member's alternate-type edge (learned by the AST evaluator
/// from an assignment like `container.ptr = &some_thing_b`) is keyed by
/// the member's own referencing site, not by its declared pointee type
/// (review: alt-ref sites must be member/variable/param, not a bare
/// type id). Dereferencing `container.ptr` should consult that site and,
/// once `member_init_agreement`/`magic_match` favor the alternate's
/// learned constant over the declared type's mismatching one, replace
/// the naive candidate with it.
#[test]
fn pointer_member_dereference_prefers_an_alternate_learned_at_its_own_member_site() {
    const CONTAINER_ADDR: u64 = 0x1000;
    const TARGET_ADDR: u64 = 0x2000;
    const BUF_SIZE: usize = 0x3000;

    let catalog = Catalog::new();

    let int_hash = catalog.compute_hash(None, &TypeKind::Integer { signed: true, width: 4 });
    let int_id = catalog.add_type(Type::new(vmicore_types::TypeId(0), None, TypeKind::Integer { signed: true, width: 4 }, int_hash));

    let thing_a_id = catalog.reserve_type_id();
    catalog.finalize_type(thing_a_id, Some("thing_a".to_string()), TypeKind::Struct { members: vec![Member::new("tag", int_id, 0)] });

    let thing_b_id = catalog.reserve_type_id();
    catalog.finalize_type(thing_b_id, Some("thing_b".to_string()), TypeKind::Struct { members: vec![Member::new("tag", int_id, 0)] });

    let ptr_hash = catalog.compute_hash(None, &TypeKind::Pointer { target: thing_a_id });
    let ptr_id = catalog.add_type(Type::new(vmicore_types::TypeId(0), None, TypeKind::Pointer { target: thing_a_id }, ptr_hash));

    let container_id = catalog.reserve_type_id();
    catalog.finalize_type(container_id, Some("container".to_string()), TypeKind::Struct { members: vec![Member::new("ptr", ptr_id, 0)] });

    catalog.add_variable(Variable::new("g", container_id, CONTAINER_ADDR, 0));

    // thing_a's own declared shape disagrees with what's actually at
    // TARGET_ADDR; thing_b's agrees. Both facts hang off the "ptr"
    // member's site so `select_and_finalize` can tell them apart.
    let mut mismatching = vmicore_types::ConstFacts::default();
    mismatching.record_int(5);
    catalog.merge_member_facts(thing_a_id, 0, &mismatching);
    let mut matching = vmicore_types::ConstFacts::default();
    matching.record_int(7);
    catalog.merge_member_facts(thing_b_id, 0, &matching);

    catalog.add_alternate_type(ReferencingRef::Member { owner: container_id, member_index: 0 }, thing_b_id, AddrExpr::Base);

    let mut bytes = vec![0u8; BUF_SIZE];
    write_u64(&mut bytes, CONTAINER_ADDR, TARGET_ADDR);
    write_i32(&mut bytes, TARGET_ADDR, 7);
    let device = FakeDevice(bytes);

    let v2p = LinearOffsetTranslator { virt_base: 0, phys_base: 0, len: device.size() };
    let rules = RuleEngine::load("<rules></rules>", |_| None).expect("empty rule file parses");
    let host = NoOpScriptHost;
    let config = BuilderConfig { probability_floor: 0.05, worker_threads: 1, replacement_margin: 0.1 };

    let builder = MapBuilder::new(&catalog, &device, &v2p, &rules, &host, config);
    let interrupted = AtomicBool::new(false);
    let result = builder.build(&interrupted);

    let target = result.nodes.values().find(|n| n.address == TARGET_ADDR).expect("dereferenced target node present");
    assert_eq!(target.type_id, thing_b_id, "alternate learned at the pointer member's own site should win over the mismatching declared type");
}
