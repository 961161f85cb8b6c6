use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use rusqlite::Connection;

use crate::parser::records::Amount;
use crate::parser::DocumentResult;

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match *self {
            Amount::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(v)),
            Amount::Float(v) => ToSqlOutput::Owned(SqlValue::Real(v)),
        })
    }
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Value columns carry no declared type, so each value keeps the storage
/// class it was bound with (INTEGER or REAL).
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sales_fact (
            id                INTEGER PRIMARY KEY,
            year              INTEGER NOT NULL,
            month             INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
            report_date       TEXT NOT NULL,
            report_type       TEXT NOT NULL CHECK(report_type IN ('monthly','rolling_12')),
            table_source      TEXT NOT NULL,
            channel           TEXT NOT NULL CHECK(channel IN ('total','on_premise')),
            product_type      TEXT NOT NULL CHECK(product_type IN ('spirits','wine')),
            geography_type    TEXT NOT NULL CHECK(geography_type IN ('state','total_control')),
            state_name        TEXT,
            volume_9l,
            volume_pct_change,
            dollar_sales,
            dollar_pct_change
        );
        CREATE INDEX IF NOT EXISTS idx_sales_month ON sales_fact(year, month);

        CREATE TABLE IF NOT EXISTS brand_category_data (
            id                INTEGER PRIMARY KEY,
            year              INTEGER NOT NULL,
            month             INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
            report_date       TEXT NOT NULL,
            report_type       TEXT NOT NULL CHECK(report_type IN ('monthly','rolling_12')),
            table_source      TEXT NOT NULL,
            channel           TEXT NOT NULL,
            product_type      TEXT NOT NULL,
            geography_type    TEXT NOT NULL,
            category          TEXT NOT NULL,
            volume_9l,
            volume_pct_change,
            dollar_sales,
            dollar_pct_change,
            price_mix
        );
        CREATE INDEX IF NOT EXISTS idx_brand_month ON brand_category_data(year, month);

        CREATE TABLE IF NOT EXISTS commentary (
            commentary_id TEXT PRIMARY KEY,
            year          INTEGER NOT NULL,
            month         INTEGER NOT NULL,
            report_date   TEXT NOT NULL,
            section       TEXT NOT NULL,
            content       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_commentary_month ON commentary(year, month);
        ",
    )?;
    Ok(())
}

pub struct SaveCounts {
    pub months: usize,
    pub sales: usize,
    pub brands: usize,
    pub commentary: usize,
}

/// Replace every month present in `results`: existing rows for those
/// months are deleted, then the new rows inserted, in one transaction.
pub fn replace_months(conn: &Connection, results: &[DocumentResult]) -> Result<SaveCounts> {
    let months: BTreeSet<(i32, u32)> = results.iter().map(|r| (r.key.year, r.key.month)).collect();
    let mut counts = SaveCounts {
        months: months.len(),
        sales: 0,
        brands: 0,
        commentary: 0,
    };

    let tx = conn.unchecked_transaction()?;
    {
        for table in ["sales_fact", "brand_category_data", "commentary"] {
            let mut stmt =
                tx.prepare(&format!("DELETE FROM {} WHERE year = ?1 AND month = ?2", table))?;
            for (year, month) in &months {
                stmt.execute(rusqlite::params![year, month])?;
            }
        }

        let mut s_stmt = tx.prepare(
            "INSERT INTO sales_fact
             (year, month, report_date, report_type, table_source, channel, product_type,
              geography_type, state_name, volume_9l, volume_pct_change, dollar_sales, dollar_pct_change)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        )?;
        let mut b_stmt = tx.prepare(
            "INSERT INTO brand_category_data
             (year, month, report_date, report_type, table_source, channel, product_type,
              geography_type, category, volume_9l, volume_pct_change, dollar_sales, dollar_pct_change,
              price_mix)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
        )?;
        let mut c_stmt = tx.prepare(
            "INSERT OR REPLACE INTO commentary
             (commentary_id, year, month, report_date, section, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for result in results {
            for r in &result.sales {
                counts.sales += s_stmt.execute(rusqlite::params![
                    r.year,
                    r.month,
                    r.report_date.to_string(),
                    r.report_type.as_str(),
                    r.table_source.as_str(),
                    r.channel.as_str(),
                    r.product_type.as_str(),
                    r.geography_type.as_str(),
                    r.state_name(),
                    r.volume_9l,
                    r.volume_pct_change,
                    r.dollar_sales,
                    r.dollar_pct_change,
                ])?;
            }
            for r in &result.brands {
                counts.brands += b_stmt.execute(rusqlite::params![
                    r.year,
                    r.month,
                    r.report_date.to_string(),
                    r.report_type.as_str(),
                    r.table_source.as_str(),
                    r.channel.as_str(),
                    r.product_type.as_str(),
                    r.geography_type.as_str(),
                    r.category(),
                    r.volume_9l,
                    r.volume_pct_change,
                    r.dollar_sales,
                    r.dollar_pct_change,
                    r.price_mix(),
                ])?;
            }
            if let Some(c) = &result.commentary {
                counts.commentary += c_stmt.execute(rusqlite::params![
                    c.commentary_id,
                    c.year,
                    c.month,
                    c.report_date.to_string(),
                    c.section,
                    c.content,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(counts)
}

// ── Stats ──

pub struct MonthStats {
    pub year: i32,
    pub month: u32,
    pub sales: usize,
    pub brands: usize,
    pub commentary: usize,
}

pub fn month_stats(conn: &Connection) -> Result<Vec<MonthStats>> {
    let mut stmt = conn.prepare(
        "SELECT m.year, m.month,
                (SELECT COUNT(*) FROM sales_fact s WHERE s.year = m.year AND s.month = m.month),
                (SELECT COUNT(*) FROM brand_category_data b WHERE b.year = m.year AND b.month = m.month),
                (SELECT COUNT(*) FROM commentary c WHERE c.year = m.year AND c.month = m.month)
         FROM (SELECT year, month FROM sales_fact
               UNION SELECT year, month FROM brand_category_data
               UNION SELECT year, month FROM commentary) m
         ORDER BY m.year, m.month",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MonthStats {
                year: row.get(0)?,
                month: row.get(1)?,
                sales: row.get(2)?,
                brands: row.get(3)?,
                commentary: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::process_document;
    use crate::source::{load_blocks, DocumentKey};

    fn fixture_result() -> DocumentResult {
        let name = "CSResults_DEC2025_rev.json";
        let blocks = load_blocks(Path::new("tests/fixtures/CSResults_DEC2025_rev.json")).unwrap();
        process_document(DocumentKey::from_filename(name).unwrap(), name, &blocks)
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn replace_is_idempotent() {
        let conn = memory_db();
        let results = vec![fixture_result()];

        let first = replace_months(&conn, &results).unwrap();
        assert_eq!((first.months, first.sales, first.brands, first.commentary), (1, 14, 6, 1));
        replace_months(&conn, &results).unwrap();

        let stats = month_stats(&conn).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!((stats[0].year, stats[0].month), (2025, 12));
        assert_eq!((stats[0].sales, stats[0].brands, stats[0].commentary), (14, 6, 1));
    }

    #[test]
    fn other_months_untouched() {
        let conn = memory_db();
        let december = fixture_result();
        let mut november = december.clone();
        november.key = DocumentKey::new(2025, 11).unwrap();
        for r in november.sales.iter_mut().chain(november.brands.iter_mut()) {
            r.month = 11;
        }
        november.commentary = None;

        replace_months(&conn, &[november]).unwrap();
        replace_months(&conn, &[december]).unwrap();

        let stats = month_stats(&conn).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].month, stats[0].sales, stats[0].commentary), (11, 14, 0));
        assert_eq!((stats[1].month, stats[1].sales, stats[1].commentary), (12, 14, 1));
    }

    #[test]
    fn numeric_storage_classes() {
        let conn = memory_db();
        replace_months(&conn, &[fixture_result()]).unwrap();
        let (volume, pct, state): (String, String, Option<String>) = conn
            .query_row(
                "SELECT typeof(volume_9l), typeof(volume_pct_change), state_name
                 FROM sales_fact WHERE table_source = 'spirits_markets' ORDER BY id LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(volume, "integer");
        assert_eq!(pct, "real");
        assert_eq!(state.as_deref(), Some("Alabama"));

        let nulls: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM sales_fact WHERE geography_type = 'total_control' AND state_name IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 4);
    }

    #[test]
    fn whole_floats_stay_real() {
        let conn = memory_db();
        conn.execute(
            "INSERT INTO sales_fact (year, month, report_date, report_type, table_source, channel,
             product_type, geography_type, volume_9l, volume_pct_change)
             VALUES (2025, 12, '2025-12-01', 'monthly', 'wine', 'total', 'wine', 'state', ?1, ?2)",
            rusqlite::params![Some(Amount::Int(5)), Some(Amount::Float(5.0))],
        )
        .unwrap();
        let (volume, pct, pct_value): (String, String, f64) = conn
            .query_row(
                "SELECT typeof(volume_9l), typeof(volume_pct_change), volume_pct_change FROM sales_fact",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(volume, "integer");
        assert_eq!(pct, "real");
        assert_eq!(pct_value, 5.0);
    }
}
