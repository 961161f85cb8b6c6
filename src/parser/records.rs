use chrono::NaiveDate;
use serde::Serialize;

use super::classify::{TableLabel, TOTAL_CONTROL};
use super::grid::Grid;
use crate::source::DocumentKey;

/// Rows shorter than this carry no complete monthly + rolling pair.
const MIN_COLUMNS: usize = 9;
const PRICE_MIX_COLUMN: usize = 9;

/// A cleaned numeric cell. Integers stay integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    Int(i64),
    Float(f64),
}

/// Strip `$`, `,` and `%`, then parse as an integer unless a decimal point
/// is present. Blank or unparseable input gives `None`.
pub fn clean_value(raw: &str) -> Option<Amount> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let val = raw.replace(['$', ',', '%'], "");
    let val = val.trim();
    if val.contains('.') {
        val.parse::<f64>().ok().map(Amount::Float)
    } else {
        val.parse::<i64>().ok().map(Amount::Int)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportType {
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "rolling_12")]
    Rolling12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Total,
    OnPremise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Spirits,
    Wine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyType {
    State,
    TotalControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    SpiritsCategories,
    SpiritsMarkets,
    SpiritsOnPremise,
    Wine,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Monthly => "monthly",
            ReportType::Rolling12 => "rolling_12",
        }
    }
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Total => "total",
            Channel::OnPremise => "on_premise",
        }
    }
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Spirits => "spirits",
            ProductType::Wine => "wine",
        }
    }
}

impl GeographyType {
    pub fn as_str(self) -> &'static str {
        match self {
            GeographyType::State => "state",
            GeographyType::TotalControl => "total_control",
        }
    }
}

impl TableSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TableSource::SpiritsCategories => "spirits_categories",
            TableSource::SpiritsMarkets => "spirits_markets",
            TableSource::SpiritsOnPremise => "spirits_on_premise",
            TableSource::Wine => "wine",
        }
    }
}

/// What a row describes: a jurisdiction (or the aggregate, with no name)
/// or a spirit category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Subject {
    State {
        state_name: Option<String>,
    },
    Category {
        category: String,
        price_mix: Option<Amount>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRecord {
    pub year: i32,
    pub month: u32,
    pub report_date: NaiveDate,
    pub report_type: ReportType,
    pub table_source: TableSource,
    pub channel: Channel,
    pub product_type: ProductType,
    pub geography_type: GeographyType,
    #[serde(flatten)]
    pub subject: Subject,
    pub volume_9l: Option<Amount>,
    pub volume_pct_change: Option<Amount>,
    pub dollar_sales: Option<Amount>,
    pub dollar_pct_change: Option<Amount>,
}

impl FactRecord {
    pub fn state_name(&self) -> Option<&str> {
        match &self.subject {
            Subject::State { state_name } => state_name.as_deref(),
            Subject::Category { .. } => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match &self.subject {
            Subject::Category { category, .. } => Some(category),
            Subject::State { .. } => None,
        }
    }

    pub fn price_mix(&self) -> Option<Amount> {
        match &self.subject {
            Subject::Category { price_mix, .. } => *price_mix,
            Subject::State { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Sales,
    Brands,
}

/// Constants stamped on every record built from one kind of table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTarget {
    pub destination: Destination,
    pub table_source: TableSource,
    pub channel: Channel,
    pub product_type: ProductType,
}

impl TableTarget {
    /// Only resolved labels produce records.
    pub fn for_label(label: TableLabel) -> Option<Self> {
        let (destination, table_source, channel, product_type) = match label {
            TableLabel::SpiritsCategories => (
                Destination::Brands,
                TableSource::SpiritsCategories,
                Channel::Total,
                ProductType::Spirits,
            ),
            TableLabel::SpiritsMarketsTotal => (
                Destination::Sales,
                TableSource::SpiritsMarkets,
                Channel::Total,
                ProductType::Spirits,
            ),
            TableLabel::SpiritsMarketsOnPremise => (
                Destination::Sales,
                TableSource::SpiritsOnPremise,
                Channel::OnPremise,
                ProductType::Spirits,
            ),
            TableLabel::Wine => (
                Destination::Sales,
                TableSource::Wine,
                Channel::Total,
                ProductType::Wine,
            ),
            TableLabel::SpiritsMarkets(_) | TableLabel::Unknown => return None,
        };
        Some(TableTarget {
            destination,
            table_source,
            channel,
            product_type,
        })
    }

    fn is_category(&self) -> bool {
        self.table_source == TableSource::SpiritsCategories
    }
}

/// Records for every data row of a grid, in row order.
pub fn build_table(grid: &Grid, key: &DocumentKey, target: &TableTarget) -> Vec<FactRecord> {
    grid.iter()
        .skip(1)
        .flat_map(|row| parse_row(row, key, target))
        .collect()
}

/// One data row → monthly record (columns 1–4) then rolling-12 record
/// (columns 5–8, plus price/mix in column 9 for category tables).
pub fn parse_row(row: &[String], key: &DocumentKey, target: &TableTarget) -> Vec<FactRecord> {
    if row.len() < MIN_COLUMNS {
        return Vec::new();
    }
    let entity = row[0].trim();
    if entity.is_empty() {
        return Vec::new();
    }

    let is_total = entity == TOTAL_CONTROL;
    let is_category = target.is_category();
    let geography_type = if is_total || is_category {
        GeographyType::TotalControl
    } else {
        GeographyType::State
    };

    let (monthly, rolling) = if is_category {
        (
            Subject::Category {
                category: entity.to_string(),
                price_mix: None,
            },
            Subject::Category {
                category: entity.to_string(),
                price_mix: row.get(PRICE_MIX_COLUMN).and_then(|v| clean_value(v)),
            },
        )
    } else {
        let state_name = (!is_total).then(|| entity.to_string());
        (
            Subject::State {
                state_name: state_name.clone(),
            },
            Subject::State { state_name },
        )
    };

    let record = |report_type, subject, values: &[String]| FactRecord {
        year: key.year,
        month: key.month,
        report_date: key.report_date,
        report_type,
        table_source: target.table_source,
        channel: target.channel,
        product_type: target.product_type,
        geography_type,
        subject,
        volume_9l: clean_value(&values[0]),
        volume_pct_change: clean_value(&values[1]),
        dollar_sales: clean_value(&values[2]),
        dollar_pct_change: clean_value(&values[3]),
    };

    vec![
        record(ReportType::Monthly, monthly, &row[1..5]),
        record(ReportType::Rolling12, rolling, &row[5..9]),
    ]
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::new(2025, 12).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn markets() -> TableTarget {
        TableTarget::for_label(TableLabel::SpiritsMarketsTotal).unwrap()
    }

    fn categories() -> TableTarget {
        TableTarget::for_label(TableLabel::SpiritsCategories).unwrap()
    }

    #[test]
    fn clean_values() {
        assert_eq!(clean_value("$1,234"), Some(Amount::Int(1234)));
        assert_eq!(clean_value("12.5%"), Some(Amount::Float(12.5)));
        assert_eq!(clean_value("-2.1%"), Some(Amount::Float(-2.1)));
        assert_eq!(clean_value(" $ 7 "), Some(Amount::Int(7)));
        assert_eq!(clean_value(""), None);
        assert_eq!(clean_value("   "), None);
        assert_eq!(clean_value("n/a"), None);
        assert_eq!(clean_value("$"), None);
        assert_eq!(clean_value("1.2.3"), None);
    }

    #[test]
    fn clean_is_idempotent() {
        for raw in ["$1,234", "12.5%", "-0.4", "3,120,448"] {
            let once = clean_value(raw).unwrap();
            let text = match once {
                Amount::Int(v) => v.to_string(),
                Amount::Float(v) => format!("{:?}", v),
            };
            assert_eq!(clean_value(&text), Some(once));
        }
    }

    #[test]
    fn state_row() {
        let r = row(&["Alabama", "100", "5.0", "1000", "2.5", "110", "6.0", "1100", "3.0"]);
        let records = parse_row(&r, &key(), &markets());
        assert_eq!(records.len(), 2);

        let monthly = &records[0];
        assert_eq!(monthly.report_type, ReportType::Monthly);
        assert_eq!(monthly.state_name(), Some("Alabama"));
        assert_eq!(monthly.category(), None);
        assert_eq!(monthly.geography_type, GeographyType::State);
        assert_eq!(monthly.volume_9l, Some(Amount::Int(100)));
        assert_eq!(monthly.volume_pct_change, Some(Amount::Float(5.0)));
        assert_eq!(monthly.dollar_sales, Some(Amount::Int(1000)));
        assert_eq!(monthly.dollar_pct_change, Some(Amount::Float(2.5)));
        assert_eq!(monthly.report_date, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());

        let rolling = &records[1];
        assert_eq!(rolling.report_type, ReportType::Rolling12);
        assert_eq!(rolling.state_name(), Some("Alabama"));
        assert_eq!(rolling.volume_9l, Some(Amount::Int(110)));
        assert_eq!(rolling.volume_pct_change, Some(Amount::Float(6.0)));
        assert_eq!(rolling.dollar_sales, Some(Amount::Int(1100)));
        assert_eq!(rolling.dollar_pct_change, Some(Amount::Float(3.0)));
        assert_eq!(rolling.price_mix(), None);
    }

    #[test]
    fn total_control_row() {
        let r = row(&["Total Control", "1", "2", "3", "4", "5", "6", "7", "8"]);
        let records = parse_row(&r, &key(), &markets());
        assert_eq!(records.len(), 2);
        for rec in &records {
            assert_eq!(rec.geography_type, GeographyType::TotalControl);
            assert_eq!(rec.state_name(), None);
            assert_eq!(rec.category(), None);
        }
    }

    #[test]
    fn category_row_with_price_mix() {
        let r = row(&[
            "Vodka", "1,204,511", "-2.1%", "$212,400,118", "-1.4%", "14,880,215", "-1.8%",
            "$2,610,004,332", "-0.9%", "0.9",
        ]);
        let records = parse_row(&r, &key(), &categories());
        assert_eq!(records.len(), 2);
        for rec in &records {
            assert_eq!(rec.category(), Some("Vodka"));
            assert_eq!(rec.state_name(), None);
            assert_eq!(rec.geography_type, GeographyType::TotalControl);
            assert_eq!(rec.table_source, TableSource::SpiritsCategories);
        }
        assert_eq!(records[0].price_mix(), None);
        assert_eq!(records[1].price_mix(), Some(Amount::Float(0.9)));
        assert_eq!(records[1].dollar_sales, Some(Amount::Int(2_610_004_332)));
    }

    #[test]
    fn category_row_without_price_mix() {
        let r = row(&["Gin", "1", "2", "3", "4", "5", "6", "7", "8"]);
        let records = parse_row(&r, &key(), &categories());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].price_mix(), None);
        assert_eq!(records[1].dollar_pct_change, Some(Amount::Int(8)));
    }

    #[test]
    fn rejected_rows() {
        let short = row(&["Utah", "4,100", "2.0%"]);
        assert!(parse_row(&short, &key(), &markets()).is_empty());
        let eight = row(&["Utah", "1", "2", "3", "4", "5", "6", "7"]);
        assert!(parse_row(&eight, &key(), &categories()).is_empty());
        let nameless = row(&["  ", "1", "2", "3", "4", "5", "6", "7", "8"]);
        assert!(parse_row(&nameless, &key(), &markets()).is_empty());
    }

    #[test]
    fn bad_numbers_become_null() {
        let r = row(&["Ohio", "--", "", "x", "4", "5", "6", "7", "8"]);
        let records = parse_row(&r, &key(), &markets());
        assert_eq!(records[0].volume_9l, None);
        assert_eq!(records[0].volume_pct_change, None);
        assert_eq!(records[0].dollar_sales, None);
        assert_eq!(records[0].dollar_pct_change, Some(Amount::Int(4)));
    }

    #[test]
    fn targets() {
        let on_premise = TableTarget::for_label(TableLabel::SpiritsMarketsOnPremise).unwrap();
        assert_eq!(on_premise.channel, Channel::OnPremise);
        assert_eq!(on_premise.table_source, TableSource::SpiritsOnPremise);
        let wine = TableTarget::for_label(TableLabel::Wine).unwrap();
        assert_eq!(wine.product_type, ProductType::Wine);
        assert_eq!(wine.destination, Destination::Sales);
        assert!(TableTarget::for_label(TableLabel::SpiritsMarkets(2)).is_none());
        assert!(TableTarget::for_label(TableLabel::Unknown).is_none());
    }

    #[test]
    fn build_table_skips_header() {
        let grid = vec![
            row(&["Total Spirits Markets", "CM 9L"]),
            row(&["Iowa", "1", "2", "3", "4", "5", "6", "7", "8"]),
            row(&["Maine", "1", "2", "3", "4", "5", "6", "7", "8"]),
        ];
        let records = build_table(&grid, &key(), &markets());
        let names: Vec<_> = records.iter().map(|r| r.state_name().unwrap()).collect();
        assert_eq!(names, vec!["Iowa", "Iowa", "Maine", "Maine"]);
    }

    #[test]
    fn serialized_shape() {
        let state = parse_row(
            &row(&["Iowa", "1", "2.5", "3", "4", "5", "6", "7", "8"]),
            &key(),
            &markets(),
        );
        let json = serde_json::to_value(&state[0]).unwrap();
        assert_eq!(json["state_name"], "Iowa");
        assert_eq!(json["report_date"], "2025-12-01");
        assert_eq!(json["report_type"], "monthly");
        assert_eq!(json["volume_pct_change"], 2.5);
        assert_eq!(json["volume_9l"], 1);
        assert!(json.get("category").is_none());
        assert!(json.get("price_mix").is_none());

        let category = parse_row(
            &row(&["Rum", "1", "2", "3", "4", "5", "6", "7", "8"]),
            &key(),
            &categories(),
        );
        let json = serde_json::to_value(&category[1]).unwrap();
        assert_eq!(json["category"], "Rum");
        assert_eq!(json["report_type"], "rolling_12");
        assert!(json["price_mix"].is_null());
        assert!(json.get("state_name").is_none());
    }
}
