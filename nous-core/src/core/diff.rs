//! Block-level diffing between two versions of a page body.

use std::collections::{HashMap, HashSet};

use crate::core::block::Block;
use crate::core::oplog::{BlockChange, BlockOp};

/// Change records for a freshly created page: every block is an insert,
/// chained after its predecessor.
pub fn insert_all(blocks: &[Block]) -> Vec<BlockChange> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| BlockChange {
            block_id: block.id.clone(),
            op: BlockOp::Insert,
            block_type: Some(block.type_name().to_string()),
            after_block_id: preceding_id(blocks, i),
        })
        .collect()
}

/// Diffs `old` against `new` by block id.
///
/// Inserts, modifications and moves are emitted in `new` order, followed by
/// deletions in `old` order. A block whose payload or type changed is a
/// [`BlockOp::Modify`] even if it also changed position; a block whose only
/// change is its index is a [`BlockOp::Move`] carrying its new predecessor.
pub fn diff_blocks(old: &[Block], new: &[Block]) -> Vec<BlockChange> {
    let old_index: HashMap<&str, (usize, &Block)> = old
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), (i, b)))
        .collect();
    let new_ids: HashSet<&str> = new.iter().map(|b| b.id.as_str()).collect();

    let mut changes = Vec::new();

    for (i, block) in new.iter().enumerate() {
        let block_type = Some(block.type_name().to_string());
        match old_index.get(block.id.as_str()) {
            None => changes.push(BlockChange {
                block_id: block.id.clone(),
                op: BlockOp::Insert,
                block_type,
                after_block_id: preceding_id(new, i),
            }),
            Some((_, old_block)) if old_block.data != block.data => {
                changes.push(BlockChange {
                    block_id: block.id.clone(),
                    op: BlockOp::Modify,
                    block_type,
                    after_block_id: None,
                });
            }
            Some((old_pos, _)) if *old_pos != i => changes.push(BlockChange {
                block_id: block.id.clone(),
                op: BlockOp::Move,
                block_type,
                after_block_id: preceding_id(new, i),
            }),
            Some(_) => {}
        }
    }

    for block in old {
        if !new_ids.contains(block.id.as_str()) {
            changes.push(BlockChange {
                block_id: block.id.clone(),
                op: BlockOp::Delete,
                block_type: Some(block.type_name().to_string()),
                after_block_id: None,
            });
        }
    }

    changes
}

/// Gives regenerated blocks the ids of their counterparts in `old`.
///
/// Content rebuilt from markdown gets fresh ids; without this, rewriting a
/// page from its own markdown would journal every block as deleted and
/// re-inserted. Identical blocks are paired first, first match wins. A
/// block still unpaired then takes the id of the unpaired old block at the
/// same index when the types agree, else of the first unpaired old block of
/// its type, so an edited block is journaled as a modify. Each old id is
/// adopted at most once.
pub fn reuse_block_ids(old: &[Block], new: &mut [Block]) {
    let mut taken = vec![false; old.len()];
    let mut paired = vec![false; new.len()];

    for (block, done) in new.iter_mut().zip(paired.iter_mut()) {
        let found = (0..old.len()).find(|&j| !taken[j] && old[j].data == block.data);
        if let Some(j) = found {
            taken[j] = true;
            *done = true;
            block.id = old[j].id.clone();
        }
    }

    for (i, block) in new.iter_mut().enumerate() {
        if paired[i] {
            continue;
        }
        let same_type = |j: usize| !taken[j] && old[j].type_name() == block.type_name();
        let found = (i < old.len() && same_type(i))
            .then_some(i)
            .or_else(|| (0..old.len()).find(|&j| same_type(j)));
        if let Some(j) = found {
            taken[j] = true;
            block.id = old[j].id.clone();
        }
    }
}

fn preceding_id(blocks: &[Block], i: usize) -> Option<String> {
    i.checked_sub(1).map(|prev| blocks[prev].id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{BlockData, TextData};
    use serde_json::Map;

    fn para(id: &str, text: &str) -> Block {
        Block::with_id(
            id,
            BlockData::Paragraph(TextData {
                text: text.to_string(),
                extra: Map::new(),
            }),
        )
    }

    fn ops(changes: &[BlockChange]) -> Vec<(&str, BlockOp)> {
        changes.iter().map(|c| (c.block_id.as_str(), c.op)).collect()
    }

    #[test]
    fn test_diff_no_changes() {
        let blocks = vec![para("a", "hello"), para("b", "world")];
        assert!(diff_blocks(&blocks, &blocks).is_empty());
    }

    #[test]
    fn test_diff_insert_carries_predecessor() {
        let old = vec![para("a", "hello")];
        let new = vec![para("a", "hello"), para("b", "world")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(ops(&changes), vec![("b", BlockOp::Insert)]);
        assert_eq!(changes[0].after_block_id.as_deref(), Some("a"));
        assert_eq!(changes[0].block_type.as_deref(), Some("paragraph"));
    }

    #[test]
    fn test_diff_insert_at_front_has_no_predecessor() {
        let old = vec![para("a", "hello")];
        let new = vec![para("z", "first"), para("a", "hello")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(changes[0].op, BlockOp::Insert);
        assert_eq!(changes[0].after_block_id, None);
        // "a" shifted from index 0 to 1 and is reported as moved after "z".
        assert_eq!(changes[1].op, BlockOp::Move);
        assert_eq!(changes[1].after_block_id.as_deref(), Some("z"));
    }

    #[test]
    fn test_diff_delete() {
        let old = vec![para("a", "hello"), para("b", "world")];
        let new = vec![para("a", "hello")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(ops(&changes), vec![("b", BlockOp::Delete)]);
    }

    #[test]
    fn test_diff_modify_and_reorder() {
        // [A, B, C] -> [A, C, B']
        let old = vec![para("a", "A"), para("b", "B"), para("c", "C")];
        let new = vec![para("a", "A"), para("c", "C"), para("b", "B changed")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(ops(&changes), vec![("c", BlockOp::Move), ("b", BlockOp::Modify)]);
        assert_eq!(changes[0].after_block_id.as_deref(), Some("a"));
        assert!(changes.iter().all(|c| c.op != BlockOp::Insert && c.op != BlockOp::Delete));
    }

    #[test]
    fn test_diff_modify_takes_priority_over_move() {
        let old = vec![para("a", "A"), para("b", "B")];
        let new = vec![para("b", "B edited"), para("a", "A")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(ops(&changes), vec![("b", BlockOp::Modify), ("a", BlockOp::Move)]);
        assert_eq!(changes[0].after_block_id, None);
    }

    #[test]
    fn test_diff_type_change_is_modify() {
        let old = vec![para("a", "Title")];
        let new = vec![Block::with_id("a", Block::quote("Title").data)];
        let changes = diff_blocks(&old, &new);
        assert_eq!(ops(&changes), vec![("a", BlockOp::Modify)]);
        assert_eq!(changes[0].block_type.as_deref(), Some("quote"));
    }

    #[test]
    fn test_diff_output_order_deletes_last_in_old_order() {
        let old = vec![para("x", "x"), para("a", "A"), para("y", "y")];
        let new = vec![para("a", "A"), para("n", "new")];
        let changes = diff_blocks(&old, &new);
        assert_eq!(
            ops(&changes),
            vec![
                ("a", BlockOp::Move),
                ("n", BlockOp::Insert),
                ("x", BlockOp::Delete),
                ("y", BlockOp::Delete),
            ]
        );
    }

    #[test]
    fn test_insert_all_chains_blocks() {
        let blocks = vec![para("a", "1"), para("b", "2"), para("c", "3")];
        let changes = insert_all(&blocks);
        assert!(changes.iter().all(|c| c.op == BlockOp::Insert));
        let afters: Vec<_> = changes.iter().map(|c| c.after_block_id.as_deref()).collect();
        assert_eq!(afters, vec![None, Some("a"), Some("b")]);
    }

    #[test]
    fn test_reuse_block_ids_adopts_identical_blocks_once() {
        let old = vec![para("a", "same"), para("b", "other")];
        let mut new = vec![para("n1", "same"), para("n2", "same"), para("n3", "fresh")];
        reuse_block_ids(&old, &mut new);
        assert_eq!(new[0].id, "a");
        // No identical match left; "b" is the only unpaired paragraph.
        assert_eq!(new[1].id, "b");
        assert_eq!(new[2].id, "n3");
    }

    #[test]
    fn test_reuse_block_ids_pairs_edited_block_by_position() {
        let old = vec![Block::with_id("h", Block::header("Intro", 1).data), para("p", "Hello")];
        let mut new = vec![
            Block::with_id("n1", Block::header("Intro", 1).data),
            para("n2", "Hello world"),
        ];
        reuse_block_ids(&old, &mut new);
        assert_eq!(new[0].id, "h");
        assert_eq!(new[1].id, "p");
        assert_eq!(ops(&diff_blocks(&old, &new)), vec![("p", BlockOp::Modify)]);
    }

    #[test]
    fn test_reuse_block_ids_falls_back_to_first_of_type() {
        let old = vec![para("p", "text"), Block::with_id("q", Block::quote("said").data)];
        let mut new = vec![
            Block::with_id("n1", Block::quote("said again").data),
            Block::with_id("n2", Block::code("x", "").data),
        ];
        reuse_block_ids(&old, &mut new);
        assert_eq!(new[0].id, "q");
        assert_eq!(new[1].id, "n2");
    }
}
