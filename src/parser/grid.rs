use std::collections::BTreeMap;

use itertools::Itertools;

use crate::blocks::{Block, BlockIndex, BlockType};

/// Reconstructed table: rows of cell text, possibly jagged.
pub type Grid = Vec<Vec<String>>;

/// Rebuild every TABLE block of the document, in discovery order.
/// Tables that yield nothing are skipped and take no position.
pub fn reconstruct_tables(index: &BlockIndex) -> Vec<Grid> {
    index
        .of_type(BlockType::Table)
        .filter_map(|table| reconstruct(table, index))
        .collect()
}

/// TABLE → CELL → WORD. Unresolvable or mistyped children are skipped.
pub fn reconstruct(table: &Block, index: &BlockIndex) -> Option<Grid> {
    if !table.has_children() {
        return None;
    }

    let mut cells: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();
    let mut any_text = false;

    for cell in table
        .children()
        .filter_map(|id| index.get_typed(id, BlockType::Cell))
    {
        let text = cell_text(cell, index);
        any_text |= !text.is_empty();
        cells
            .entry(cell.row_index)
            .or_default()
            .insert(cell.column_index, text);
    }

    if !any_text {
        return None;
    }

    Some(
        cells
            .into_values()
            .map(|row| row.into_values().collect())
            .collect(),
    )
}

fn cell_text(cell: &Block, index: &BlockIndex) -> String {
    cell.children()
        .filter_map(|id| index.get_typed(id, BlockType::Word))
        .filter_map(|w| w.text.as_deref())
        .join(" ")
        .trim()
        .to_string()
}

// ── Tests ──
