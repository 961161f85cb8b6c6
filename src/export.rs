use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::parser::DocumentResult;

pub const SALES_FILE: &str = "sales_fact.json";
pub const BRANDS_FILE: &str = "brand_category_data.json";
pub const COMMENTARY_FILE: &str = "commentary.json";

/// Write the three record collections of `results` as pretty-printed JSON
/// arrays into `dir`.
pub fn write_json(dir: &Path, results: &[DocumentResult]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let sales: Vec<_> = results.iter().flat_map(|r| &r.sales).collect();
    let brands: Vec<_> = results.iter().flat_map(|r| &r.brands).collect();
    let commentary: Vec<_> = results.iter().filter_map(|r| r.commentary.as_ref()).collect();

    write_file(&dir.join(SALES_FILE), &sales)?;
    write_file(&dir.join(BRANDS_FILE), &brands)?;
    write_file(&dir.join(COMMENTARY_FILE), &commentary)?;
    info!(
        "Wrote {} sales, {} brand/category, {} commentary records to {:?}",
        sales.len(),
        brands.len(),
        commentary.len(),
        dir
    );
    Ok(())
}

fn write_file<T: Serialize>(path: &Path, records: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

// ── Tests ──
