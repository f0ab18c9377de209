//! Sales CSV aggregation.
//!
//! One pass over the parsed rows:
//! - classify each row's territory (UK and US tests are independent)
//! - add units/sales to every matching territory
//! - tally units per category for product type, device, design parent and design child
//!
//! Then every category tally is ranked by total (ties keep first-seen order)
//! and cut to the top 15.
//!
//! Per-row data problems never fail a run: a missing, unparseable or zero
//! units cell counts as 1 unit, a missing or unparseable sales cell as 0.
//! Unit sums saturate at the `i64` bounds.

use crate::columns::{ColumnMapping, ColumnRole};
use crate::model::{AggregateResult, CategoryTally, Summary, TerritoryEntry};
use crate::table::SalesTable;
use crate::territory::{classify, Classification, Territory};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Length limit of every comparison list.
pub const TOP_N: usize = 15;

/// Product types shown on the phone-case dashboard.
pub const PHONE_CASE_TYPES: &[&str] = &[
    "HC", "HTPCR", "HB401", "HLBWH", "HB6CR", "HB7BK", "HHYBK", "FHTPCR", "FHC",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Error parsing CSV: {0}")]
    MalformedInput(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Keep only rows whose product-type cell equals one of these codes.
    pub product_types: Option<Vec<String>>,
}

impl AggregateOptions {
    pub fn phone_cases() -> Self {
        Self {
            product_types: Some(PHONE_CASE_TYPES.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn keeps(&self, product_type: &str) -> bool {
        match &self.product_types {
            Some(allowed) => allowed.iter().any(|code| code == product_type),
            None => true,
        }
    }
}

/// Row accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Data rows after blank-line removal.
    pub rows_read: usize,
    /// Rows dropped by the product-type filter.
    pub rows_filtered: usize,
    /// Rows that went through classification and grouping.
    pub rows_aggregated: usize,
    /// Rows matching neither territory.
    pub rows_unclassified: usize,
    /// Rows matching both territories (counted in each).
    pub rows_ambiguous: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRun {
    pub result: AggregateResult,
    pub stats: RunStats,
    pub mapping: ColumnMapping,
}

/// Aggregate raw CSV text into a dashboard document.
pub fn aggregate(text: &str, options: &AggregateOptions) -> Result<AggregateResult, AggregateError> {
    aggregate_run(text, options).map(|run| run.result)
}

/// Same as [`aggregate`], also returning row accounting and the column mapping used.
pub fn aggregate_run(text: &str, options: &AggregateOptions) -> Result<AggregateRun, AggregateError> {
    let table = SalesTable::parse(text)?;
    let mapping = ColumnMapping::resolve(table.headers());

    for role in ColumnRole::ALL {
        match mapping.get(role) {
            Some(idx) => debug!(%role, column = %table.headers()[idx], "column role resolved"),
            None => debug!(%role, "column role not found, contribution skipped"),
        }
    }

    let (result, stats) = aggregate_table(&table, &mapping, options);

    info!(
        rows = stats.rows_read,
        aggregated = stats.rows_aggregated,
        filtered = stats.rows_filtered,
        uk_units = result.summary.uk_units,
        us_units = result.summary.us_units,
        "aggregated sales rows"
    );
    if stats.rows_unclassified > 0 {
        debug!(rows = stats.rows_unclassified, "rows matched no territory");
    }
    if stats.rows_ambiguous > 0 {
        debug!(rows = stats.rows_ambiguous, "rows matched both UK and US");
    }

    Ok(AggregateRun {
        result,
        stats,
        mapping,
    })
}

#[derive(Debug, Default)]
struct TerritoryTotals {
    units: i64,
    sales: f64,
}

impl TerritoryTotals {
    fn add(&mut self, units: i64, sales: f64) {
        self.units = self.units.saturating_add(units);
        self.sales += sales;
    }
}

/// Units per category value, in first-seen order.
#[derive(Debug, Default)]
struct GroupAccumulator {
    index: HashMap<String, usize>,
    tallies: Vec<CategoryTally>,
}

impl GroupAccumulator {
    fn add(&mut self, category: &str, units: i64, class: Classification) {
        let slot = match self.index.get(category) {
            Some(&slot) => slot,
            None => {
                self.tallies.push(CategoryTally {
                    category: category.to_string(),
                    uk: 0,
                    us: 0,
                });
                self.index.insert(category.to_string(), self.tallies.len() - 1);
                self.tallies.len() - 1
            }
        };

        let tally = &mut self.tallies[slot];
        if class.uk {
            tally.uk = tally.uk.saturating_add(units);
        }
        if class.us {
            tally.us = tally.us.saturating_add(units);
        }
    }

    fn len(&self) -> usize {
        self.tallies.len()
    }

    /// Sort by total descending and keep the top [`TOP_N`].
    fn ranked<T: From<CategoryTally>>(self) -> Vec<T> {
        let mut tallies = self.tallies;
        // sort_by is stable: equal totals stay in first-seen order
        tallies.sort_by(|a, b| b.total().cmp(&a.total()));
        tallies.into_iter().take(TOP_N).map(T::from).collect()
    }
}

fn aggregate_table(
    table: &SalesTable,
    mapping: &ColumnMapping,
    options: &AggregateOptions,
) -> (AggregateResult, RunStats) {
    let country_col = mapping.get(ColumnRole::Country);
    let units_col = mapping.get(ColumnRole::Units);
    let sales_col = mapping.get(ColumnRole::Sales);
    let product_type_col = mapping.get(ColumnRole::ProductType);
    let device_col = mapping.get(ColumnRole::Device);
    let design_parent_col = mapping.get(ColumnRole::DesignParent);
    let design_child_col = mapping.get(ColumnRole::DesignChild);

    let mut stats = RunStats {
        rows_read: table.len(),
        ..RunStats::default()
    };
    let mut uk = TerritoryTotals::default();
    let mut us = TerritoryTotals::default();
    let mut product_types = GroupAccumulator::default();
    let mut devices = GroupAccumulator::default();
    let mut design_parents = GroupAccumulator::default();
    let mut design_children = GroupAccumulator::default();

    for row in table.rows() {
        if !options.keeps(row.cell(product_type_col)) {
            stats.rows_filtered += 1;
            continue;
        }
        stats.rows_aggregated += 1;

        let class = classify(row.cell(country_col));
        let units = parse_units(row.cell(units_col));
        let sales = parse_sales(row.cell(sales_col));

        if class.is_unclassified() {
            stats.rows_unclassified += 1;
        }
        if class.is_ambiguous() {
            stats.rows_ambiguous += 1;
        }
        if class.uk {
            uk.add(units, sales);
        }
        if class.us {
            us.add(units, sales);
        }

        let groups = [
            (product_type_col, &mut product_types),
            (device_col, &mut devices),
            (design_parent_col, &mut design_parents),
            (design_child_col, &mut design_children),
        ];
        for (column, group) in groups {
            if column.is_none() {
                continue;
            }
            let category = row.cell(column);
            if !category.is_empty() {
                group.add(category, units, class);
            }
        }
    }

    // Every distinct design child is one SKU.
    let unique_skus = design_children.len();

    let summary = Summary {
        total_units: uk.units.saturating_add(us.units),
        uk_units: uk.units,
        us_units: us.units,
        uk_sales: round_half_up(uk.sales),
        us_sales: round_half_up(us.sales),
        unique_skus,
        unique_devices: devices.len(),
        unique_designs: design_parents.len(),
    };

    let territory = vec![
        territory_entry(Territory::Uk, &uk, unique_skus),
        territory_entry(Territory::Us, &us, unique_skus),
    ];

    let result = AggregateResult {
        summary,
        territory,
        product_types_comparison: product_types.ranked(),
        devices_comparison: devices.ranked(),
        design_parents_comparison: design_parents.ranked(),
        design_children_comparison: design_children.ranked(),
    };

    (result, stats)
}

fn territory_entry(territory: Territory, totals: &TerritoryTotals, unique_skus: usize) -> TerritoryEntry {
    TerritoryEntry {
        country: territory,
        currency: territory.currency().to_string(),
        units: totals.units,
        sales: round_half_up(totals.sales),
        unique_skus: round_half_up(unique_skus as f64 * territory.sku_share()),
    }
}

/// Units cell: leading integer, 1 when missing, unparseable or zero.
pub fn parse_units(cell: &str) -> i64 {
    leading_integer(cell).filter(|&n| n != 0).unwrap_or(1)
}

/// Sales cell: leading decimal number, 0 when missing or unparseable.
pub fn parse_sales(cell: &str) -> f64 {
    leading_float(cell).filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Nearest integer, halves rounded toward positive infinity (2.5 -> 3, -2.5 -> -2).
pub fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        (floor as i64).saturating_add(1)
    } else {
        floor as i64
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Parse the longest `[+-]digits` prefix, e.g. "12 pcs" -> 12, "3.9" -> 3.
/// Digit runs beyond the `i64` range saturate.
fn leading_integer(cell: &str) -> Option<i64> {
    let s = cell.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    match s[..sign + digits].parse() {
        Ok(n) => Some(n),
        Err(_) if bytes[0] == b'-' => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}

/// Parse the longest decimal prefix, e.g. "19.99 GBP" -> 19.99, ".5" -> 0.5, "1e3" -> 1000.
/// Locale-naive: '.' is the only decimal separator and ',' ends the number.
fn leading_float(cell: &str) -> Option<f64> {
    let s = cell.trim_start();
    let bytes = s.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}

// =============================================================================
// TESTS
// =============================================================================
