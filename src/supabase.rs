use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::parser::DocumentResult;

const FACT_BATCH: usize = 100;
const COMMENTARY_BATCH: usize = 50;
const TABLES: [&str; 3] = ["sales_fact", "brand_category_data", "commentary"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadCounts {
    pub uploaded: usize,
    pub failed: usize,
}

impl UploadCounts {
    fn add(&mut self, other: UploadCounts) {
        self.uploaded += other.uploaded;
        self.failed += other.failed;
    }
}

/// PostgREST client for the reporting schema.
pub struct Uploader {
    client: reqwest::Client,
    base_url: String,
    key: String,
    schema: String,
}

impl Uploader {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (Some(url), Some(key)) = (&settings.supabase_url, &settings.supabase_key) else {
            bail!("Supabase credentials not set (NABCA_SUPABASE_URL and NABCA_SUPABASE_KEY)");
        };
        Ok(Uploader {
            client: reqwest::Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            key: key.clone(),
            schema: settings.supabase_schema.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Content-Profile", &self.schema)
            .header("Prefer", "return=minimal")
    }

    async fn delete_month(&self, table: &str, year: i32, month: u32) -> Result<()> {
        self.request(reqwest::Method::DELETE, table)
            .query(&month_filter(year, month))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("DELETE {} {}-{:02}", table, year, month))?;
        Ok(())
    }

    async fn insert_batches<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
        batch_size: usize,
    ) -> UploadCounts {
        let mut counts = UploadCounts::default();
        for batch in rows.chunks(batch_size) {
            let sent = self
                .request(reqwest::Method::POST, table)
                .json(batch)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match sent {
                Ok(_) => counts.uploaded += batch.len(),
                Err(e) => {
                    warn!("Batch of {} rows to {} failed: {}", batch.len(), table, e);
                    counts.failed += batch.len();
                }
            }
        }
        counts
    }

    /// Clear every month present in `results`, then insert all records.
    /// Neither a failed delete nor a failed batch stops the upload.
    pub async fn upload(&self, results: &[DocumentResult]) -> UploadCounts {
        let months: BTreeSet<(i32, u32)> =
            results.iter().map(|r| (r.key.year, r.key.month)).collect();
        for &(year, month) in &months {
            info!("Clearing {}-{:02}", year, month);
            for table in TABLES {
                if let Err(e) = self.delete_month(table, year, month).await {
                    warn!("Could not delete existing {} rows: {:#}", table, e);
                }
            }
        }

        let sales: Vec<_> = results.iter().flat_map(|r| &r.sales).collect();
        let brands: Vec<_> = results.iter().flat_map(|r| &r.brands).collect();
        let commentary: Vec<_> = results.iter().filter_map(|r| r.commentary.as_ref()).collect();

        let mut total = UploadCounts::default();
        for (table, counts) in [
            (TABLES[0], self.insert_batches(TABLES[0], &sales, FACT_BATCH).await),
            (TABLES[1], self.insert_batches(TABLES[1], &brands, FACT_BATCH).await),
            (TABLES[2], self.insert_batches(TABLES[2], &commentary, COMMENTARY_BATCH).await),
        ] {
            info!("{}: {} uploaded, {} failed", table, counts.uploaded, counts.failed);
            total.add(counts);
        }
        total
    }
}

fn month_filter(year: i32, month: u32) -> [(&'static str, String); 2] {
    [("year", format!("eq.{}", year)), ("month", format!("eq.{}", month))]
}

// ── Tests ──
