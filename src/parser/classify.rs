use std::fmt;

use itertools::Itertools;
use tracing::debug;

use super::grid::Grid;

/// Control-state jurisdictions as they are spelled in the reports,
/// including known misspellings and the aggregate row.
pub const STATE_NAMES: &[&str] = &[
    "Alabama",
    "Iowa",
    "Idaho",
    "Mont Co",
    "Maine",
    "Michigan",
    "Mississippi",
    "Montana",
    "North Carolina",
    "New Hampshire",
    "Ohio",
    "Oregon",
    "Pennsylvania",
    "Utah",
    "Virginia",
    "Vermont",
    "West Virginia",
    "West Virgina",
    "Wyoming",
    "Total Control",
];

pub const TOTAL_CONTROL: &str = "Total Control";

const SPIRIT_CATEGORIES: &[&str] = &[
    "VODKA", "TEQUILA", "WHISKEY", "RUM", "GIN", "BRANDY", "COGNAC", "CORDIALS", "COCKTAILS",
    "CANADIAN",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLabel {
    Wine,
    SpiritsCategories,
    /// Market table awaiting document-level resolution; carries its table index.
    SpiritsMarkets(usize),
    SpiritsMarketsTotal,
    SpiritsMarketsOnPremise,
    Unknown,
}

impl fmt::Display for TableLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableLabel::Wine => f.write_str("wine"),
            TableLabel::SpiritsCategories => f.write_str("spirits_categories"),
            TableLabel::SpiritsMarkets(i) => write!(f, "spirits_markets_{}", i),
            TableLabel::SpiritsMarketsTotal => f.write_str("spirits_markets_total"),
            TableLabel::SpiritsMarketsOnPremise => f.write_str("spirits_markets_on_premise"),
            TableLabel::Unknown => f.write_str("unknown"),
        }
    }
}

/// Uppercased header row and first data row of a grid.
pub struct Probe {
    header: String,
    first_data: String,
}

impl Probe {
    pub fn new(grid: &Grid) -> Option<Self> {
        if grid.len() < 2 {
            return None;
        }
        Some(Probe {
            header: grid[0].iter().join(" ").to_uppercase(),
            first_data: grid[1].iter().join(" ").to_uppercase(),
        })
    }

    fn header_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.header.contains(n))
    }

    fn first_data_has<S: AsRef<str>>(&self, needles: impl IntoIterator<Item = S>) -> bool {
        needles
            .into_iter()
            .any(|n| self.first_data.contains(n.as_ref()))
    }
}

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&Probe, usize) -> Option<TableLabel>,
}

/// Evaluated in order; the first rule that returns a label wins.
pub const RULES: &[Rule] = &[
    Rule {
        name: "wine_header",
        apply: |p, _| p.header_has(&["WINE"]).then_some(TableLabel::Wine),
    },
    Rule {
        name: "category_header",
        apply: |p, _| {
            p.header_has(&["CATEGORIES", "CATEGORY"])
                .then_some(TableLabel::SpiritsCategories)
        },
    },
    Rule {
        name: "category_first_row",
        apply: |p, _| {
            p.first_data_has(SPIRIT_CATEGORIES)
                .then_some(TableLabel::SpiritsCategories)
        },
    },
    Rule {
        name: "markets",
        apply: |p, index| {
            let by_header = p.header_has(&["SPIRITS", "MARKETS"]);
            let by_row = p.first_data_has(STATE_NAMES.iter().map(|s| s.to_uppercase()));
            (by_header || by_row).then_some(TableLabel::SpiritsMarkets(index))
        },
    },
];

/// First phase: tentative label for one grid. `None` when the grid has
/// fewer than two rows.
pub fn classify(grid: &Grid, index: usize) -> Option<TableLabel> {
    let probe = Probe::new(grid)?;
    Some(match matching_rule(&probe, index) {
        Some((name, label)) => {
            debug!("table {} matched rule {} -> {}", index, name, label);
            label
        }
        None => TableLabel::Unknown,
    })
}

/// Name and label of the first rule that labels `probe`.
pub fn matching_rule(probe: &Probe, index: usize) -> Option<(&'static str, TableLabel)> {
    RULES
        .iter()
        .find_map(|rule| (rule.apply)(probe, index).map(|label| (rule.name, label)))
}

/// Second phase: with two or more positional market tables, the first is
/// the total-channel table and the last the on-premise table. Anything in
/// between, or a lone market table, keeps its positional label.
pub fn resolve_markets(labels: &[Option<TableLabel>]) -> Vec<Option<TableLabel>> {
    let markets: Vec<usize> = labels
        .iter()
        .positions(|l| matches!(l, Some(TableLabel::SpiritsMarkets(_))))
        .collect();

    let mut resolved = labels.to_vec();
    if let [first, .., last] = markets.as_slice() {
        resolved[*first] = Some(TableLabel::SpiritsMarketsTotal);
        resolved[*last] = Some(TableLabel::SpiritsMarketsOnPremise);
    }
    resolved
}

/// Both phases over a document's grids.
pub fn classify_all(grids: &[Grid]) -> Vec<Option<TableLabel>> {
    let tentative: Vec<_> = grids
        .iter()
        .enumerate()
        .map(|(i, grid)| classify(grid, i))
        .collect();
    resolve_markets(&tentative)
}

// ── Tests ──
