use crate::error::MapError;
use crate::node::{MemoryMapNode, NodeId};
use std::collections::HashMap;
use std::fmt::Write as _;
use vmicore_types::TypeId;

/// One row of the persisted-map line format (spec.md §6): `address (hex
/// 16), size (dec), probability (4 decimals), type-id (hex 8), type-name
/// (quoted)`.
pub fn write_line(node: &MemoryMapNode) -> String {
    format!(
        "{:016x} {} {:.4} {:08x} {:?}",
        node.address, node.size, node.probability, node.type_id.0, node.type_name
    )
}

/// Serializes every node, one line per record.
pub fn write_map(nodes: &HashMap<NodeId, MemoryMapNode>) -> String {
    let mut out = String::new();
    for node in nodes.values() {
        let _ = writeln!(out, "{}", write_line(node));
    }
    out
}

struct ParsedLine {
    address: u64,
    size: u64,
    probability: f64,
    type_id: TypeId,
    type_name: String,
}

fn parse_line(line: &str, line_no: usize) -> Result<ParsedLine, MapError> {
    let malformed = |message: &str| MapError::Persist { line: line_no, message: message.to_string() };

    let rest = line.trim_end();
    let (address_str, rest) = rest.split_once(' ').ok_or_else(|| malformed("missing size field"))?;
    let (size_str, rest) = rest.split_once(' ').ok_or_else(|| malformed("missing probability field"))?;
    let (prob_str, rest) = rest.split_once(' ').ok_or_else(|| malformed("missing type-id field"))?;
    let (type_id_str, name_str) = rest.split_once(' ').ok_or_else(|| malformed("missing type-name field"))?;

    let address = u64::from_str_radix(address_str, 16).map_err(|_| malformed("address is not hex"))?;
    let size = size_str.parse::<u64>().map_err(|_| malformed("size is not decimal"))?;
    let probability = prob_str.parse::<f64>().map_err(|_| malformed("probability is not a float"))?;
    let type_id = u32::from_str_radix(type_id_str, 16).map_err(|_| malformed("type-id is not hex"))?;
    let type_name = name_str
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| malformed("type-name is not quoted"))?
        .to_string();

    Ok(ParsedLine { address, size, probability, type_id: TypeId(type_id), type_name })
}

/// Parses the persisted-map line format back into standalone nodes.
/// Parent/child links are not recoverable from this flat format (spec.md
/// §6 describes it as a flat record list); callers that need the tree
/// shape should use [`write_tree_dump`]/the original build output
/// instead.
pub fn read_map(text: &str) -> Result<Vec<MemoryMapNode>, MapError> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_line(line, idx + 1)?;
        let node = MemoryMapNode::new(NodeId(idx as u32), parsed.address, parsed.size, parsed.type_id, parsed.type_name, String::new())
            .with_probability(parsed.probability);
        out.push(node);
    }
    Ok(out)
}

/// Indented tree dump rooted at `root`, one parent-child step per
/// indentation level, with a trailing `[!]` on nodes whose candidate set
/// was not exhausted (spec.md §6).
pub fn write_tree_dump(root: NodeId, nodes: &HashMap<NodeId, MemoryMapNode>) -> String {
    let mut out = String::new();
    write_tree_dump_rec(root, nodes, 0, &mut out);
    out
}

fn write_tree_dump_rec(id: NodeId, nodes: &HashMap<NodeId, MemoryMapNode>, depth: usize, out: &mut String) {
    let Some(node) = nodes.get(&id) else { return };
    let marker = if node.candidates_exhausted { "" } else { " [!]" };
    let _ = writeln!(
        out,
        "{}{} {:016x} {:?}{}",
        "  ".repeat(depth),
        node.name_path,
        node.address,
        node.type_name,
        marker
    );
    for child in &node.children {
        write_tree_dump_rec(*child, nodes, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_line() {
        let node = MemoryMapNode::new(NodeId(0), 0xffff_8000_0010_0000, 256, TypeId(7), "task_struct", "init_task").with_probability(0.9321);
        let line = write_line(&node);
        let parsed = parse_line(&line, 1).unwrap();
        assert_eq!(parsed.address, node.address);
        assert_eq!(parsed.size, node.size);
        assert_eq!(parsed.type_id, node.type_id);
        assert_eq!(parsed.type_name, node.type_name);
        assert!((parsed.probability - node.probability).abs() < 1e-6);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let err = parse_line("not a valid line", 5);
        assert!(matches!(err, Err(MapError::Persist { line: 5, .. })));
    }

    #[test]
    fn tree_dump_marks_unexhausted_nodes() {
        let mut nodes = HashMap::new();
        let mut root = MemoryMapNode::new(NodeId(0), 0x1000, 8, TypeId(1), "task_struct", "init_task");
        root.candidates_exhausted = false;
        root.children.push(NodeId(1));
        let child = MemoryMapNode::new(NodeId(1), 0x1008, 8, TypeId(2), "list_head", "init_task.tasks");
        nodes.insert(NodeId(0), root);
        nodes.insert(NodeId(1), child);

        let dump = write_tree_dump(NodeId(0), &nodes);
        let first_line = dump.lines().next().unwrap();
        assert!(first_line.ends_with("[!]"));
        assert!(dump.lines().nth(1).unwrap().starts_with("  "));
    }
}
