// src/corrections/mod.rs

use crate::error::{Error, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Header names of the composite key columns in the stored data files.
pub const PRODUCT_GROUP_COLUMN: &str = "Product Group";
pub const YEAR_MONTH_COLUMN: &str = "Year_Month";

/// Columns overwritten by a matched correction.
pub const CORRECTION_PERCENT_COLUMN: &str = "correction_percent";
pub const EXPLANATION_COLUMN: &str = "explanation";

/// A user-submitted percentage adjustment for one product group and month.
///
/// Transient input only; corrections are never persisted on their own, they
/// mutate matching table rows and disappear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub product_group: String,
    pub month: String,
    pub correction_percent: f64,
    pub explanation: String,
}

impl Correction {
    fn key(&self) -> String {
        composite_key(&self.product_group, &self.month)
    }
}

fn composite_key(product_group: &str, month: &str) -> String {
    format!("{product_group}|{month}")
}

/// Join `corrections` onto `table` by (product group, year-month) and
/// overwrite the `correction_percent` and `explanation` cells of every
/// matched row. Unmatched rows are untouched; a correction matching no row
/// is silently dropped. When two corrections share a key, the later one in
/// input order wins. Returns the number of rows updated.
///
/// `correction_percent` is not range-checked here; callers own that.
pub fn apply(table: &mut Table, corrections: &[Correction]) -> Result<usize> {
    let group_idx = table.column(PRODUCT_GROUP_COLUMN).ok_or_else(|| {
        Error::Parse(format!("missing key column {PRODUCT_GROUP_COLUMN:?}"))
    })?;
    let month_idx = table.column(YEAR_MONTH_COLUMN).ok_or_else(|| {
        Error::Parse(format!("missing key column {YEAR_MONTH_COLUMN:?}"))
    })?;

    // The data files may predate the correction columns.
    let percent_idx = table.ensure_column(CORRECTION_PERCENT_COLUMN);
    let explanation_idx = table.ensure_column(EXPLANATION_COLUMN);

    // Later duplicates overwrite earlier ones here, which is what gives
    // last-write-wins per composite key.
    let lookup: HashMap<String, &Correction> =
        corrections.iter().map(|c| (c.key(), c)).collect();

    let mut updated = 0;
    for row in &mut table.rows {
        let key = composite_key(&row[group_idx], &row[month_idx]);
        if let Some(correction) = lookup.get(&key) {
            row[percent_idx] = format_percent(correction.correction_percent);
            row[explanation_idx] = correction.explanation.clone();
            updated += 1;
        }
    }

    debug!(
        corrections = corrections.len(),
        rows_updated = updated,
        "applied corrections"
    );
    Ok(updated)
}

/// Integral percentages serialize without a trailing `.0` so `5` round
/// trips as `"5"`, matching how the data files store the column.
fn format_percent(value: f64) -> String {
    value.to_string()
}
