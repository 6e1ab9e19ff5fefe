//! Rebuilds the section tree from the flat, parent-referencing input list.

use std::collections::{HashMap, VecDeque};

use log::warn;

use crate::core::layout::SectionNode;
use crate::core::model::Section;

/// Deepest nesting kept in the tree. A section that would sit below it is
/// promoted to the root, and its own descendants keep nesting under it.
pub const MAX_SECTION_DEPTH: usize = 64;

// 临时节点：只记录下标，最后再转换成 SectionNode
#[derive(Debug, Default)]
struct TempSectionNode {
    children: Vec<usize>,
}

pub struct SectionHierarchy;

impl SectionHierarchy {
    /// Returns the root nodes in input order. Siblings keep input order.
    ///
    /// The first section carrying an id owns it; later duplicates are still
    /// placed in the tree but cannot be referenced as parents. A section whose
    /// parent is unknown, itself, or one of its own descendants becomes a root.
    /// So does a section nested deeper than [`MAX_SECTION_DEPTH`].
    pub fn build(sections: &[Section]) -> Vec<SectionNode> {
        let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(sections.len());
        for (idx, section) in sections.iter().enumerate() {
            if by_id.contains_key(section.section_id.as_str()) {
                warn!(
                    "Duplicate section id '{}' at position {}, first occurrence keeps the id",
                    section.section_id, idx
                );
                continue;
            }
            by_id.insert(section.section_id.as_str(), idx);
        }

        let mut parents: Vec<Option<usize>> = vec![None; sections.len()];
        for (idx, section) in sections.iter().enumerate() {
            let Some(parent_id) = section.parent_id() else {
                continue;
            };
            let Some(&parent_idx) = by_id.get(parent_id) else {
                warn!(
                    "Section '{}' references unknown parent '{}', placing it at the root",
                    section.section_id, parent_id
                );
                continue;
            };
            if Self::reaches(&parents, parent_idx, idx) {
                warn!(
                    "Section '{}' would create a parent cycle through '{}', placing it at the root",
                    section.section_id, parent_id
                );
                continue;
            }
            parents[idx] = Some(parent_idx);
        }

        let mut nodes: Vec<TempSectionNode> = (0..sections.len()).map(|_| TempSectionNode::default()).collect();
        let mut roots = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(parent_idx) => nodes[*parent_idx].children.push(idx),
                None => roots.push(idx),
            }
        }

        Self::limit_depth(sections, &mut nodes, &mut roots);

        roots
            .into_iter()
            .map(|idx| Self::convert_to_final(sections, &nodes, idx))
            .collect()
    }

    // Follows the parent links decided so far, starting at `from`. They always
    // form a forest, so the walk ends.
    fn reaches(parents: &[Option<usize>], from: usize, target: usize) -> bool {
        let mut current = Some(from);
        while let Some(idx) = current {
            if idx == target {
                return true;
            }
            current = parents[idx];
        }
        false
    }

    // Breadth-first from the roots. Children that would land at
    // MAX_SECTION_DEPTH are cut loose and start again at depth 0.
    fn limit_depth(sections: &[Section], nodes: &mut [TempSectionNode], roots: &mut Vec<usize>) {
        let mut depth = vec![0usize; nodes.len()];
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        let mut promoted = false;

        while let Some(idx) = queue.pop_front() {
            if depth[idx] + 1 < MAX_SECTION_DEPTH {
                for &child in &nodes[idx].children {
                    depth[child] = depth[idx] + 1;
                    queue.push_back(child);
                }
                continue;
            }
            for child in std::mem::take(&mut nodes[idx].children) {
                warn!(
                    "Section '{}' is nested deeper than {} levels, placing it at the root",
                    sections[child].section_id, MAX_SECTION_DEPTH
                );
                roots.push(child);
                queue.push_back(child);
                promoted = true;
            }
        }

        if promoted {
            roots.sort_unstable();
        }
    }

    // Recursion is bounded by MAX_SECTION_DEPTH.
    fn convert_to_final(sections: &[Section], nodes: &[TempSectionNode], idx: usize) -> SectionNode {
        SectionNode {
            index: idx,
            section: sections[idx].clone(),
            children: nodes[idx]
                .children
                .iter()
                .map(|child| Self::convert_to_final(sections, nodes, *child))
                .collect(),
        }
    }
}
