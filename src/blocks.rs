use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Table,
    Cell,
    Word,
    Line,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// One node of the analysis result. Structure is relational: containment is
/// expressed through `CHILD` relationships, never through position.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub id: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub row_index: u32,
    #[serde(default)]
    pub column_index: u32,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Block {
    /// Ids of contained blocks, in order, across all `CHILD` relationships.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|r| r.kind == "CHILD")
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }

    pub fn has_children(&self) -> bool {
        self.relationships.iter().any(|r| r.kind == "CHILD")
    }
}

/// Id and type lookup over a document's flat block collection.
pub struct BlockIndex<'a> {
    by_id: HashMap<&'a str, &'a Block>,
    blocks: &'a [Block],
}

impl<'a> BlockIndex<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        let by_id = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
        BlockIndex { by_id, blocks }
    }

    /// Missing ids resolve to `None`; callers decide what that means.
    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.by_id.get(id).copied()
    }

    /// Resolve `id` only if it names a block of the given type.
    pub fn get_typed(&self, id: &str, kind: BlockType) -> Option<&'a Block> {
        self.get(id).filter(|b| b.block_type == kind)
    }

    /// Blocks of one type, in document order.
    pub fn of_type(&self, kind: BlockType) -> impl Iterator<Item = &'a Block> + '_ {
        self.blocks.iter().filter(move |b| b.block_type == kind)
    }

    /// Text of every LINE block, in document order.
    pub fn lines(&self) -> Vec<&'a str> {
        self.of_type(BlockType::Line)
            .filter_map(|b| b.text.as_deref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

// ── Tests ──
