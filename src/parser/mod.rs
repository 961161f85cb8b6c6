pub mod classify;
pub mod commentary;
pub mod grid;
pub mod records;

use tracing::debug;

use crate::blocks::{Block, BlockIndex};
use crate::source::DocumentKey;
use commentary::CommentaryRecord;
use records::{Destination, FactRecord, TableTarget};

/// Everything extracted from one document.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub key: DocumentKey,
    pub name: String,
    pub sales: Vec<FactRecord>,
    pub brands: Vec<FactRecord>,
    pub commentary: Option<CommentaryRecord>,
}

/// Blocks → grids → labels → records, plus lines → commentary.
pub fn process_document(key: DocumentKey, name: &str, blocks: &[Block]) -> DocumentResult {
    let index = BlockIndex::new(blocks);
    let grids = grid::reconstruct_tables(&index);
    let labels = classify::classify_all(&grids);
    debug!("{}: {} blocks, {} tables", name, index.len(), grids.len());

    let mut sales = Vec::new();
    let mut brands = Vec::new();
    for (i, (grid, label)) in grids.iter().zip(&labels).enumerate() {
        let Some(label) = label else {
            debug!("{}: table {} has fewer than 2 rows, dropped", name, i);
            continue;
        };
        let Some(target) = TableTarget::for_label(*label) else {
            debug!("{}: table {} labelled {}, dropped", name, i, label);
            continue;
        };
        let records = records::build_table(grid, &key, &target);
        debug!("{}: table {} labelled {} -> {} records", name, i, label, records.len());
        match target.destination {
            Destination::Sales => sales.extend(records),
            Destination::Brands => brands.extend(records),
        }
    }

    let content = commentary::extract_commentary(index.lines());
    let commentary = commentary::build_commentary(&key, content);

    DocumentResult {
        key,
        name: name.to_string(),
        sales,
        brands,
        commentary,
    }
}

// ── Tests ──
