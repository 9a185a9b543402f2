use anyhow::{Context, Result};
use forecastd::table::Table;
use serde_json::{Map, Value};
use std::{env, fs, path::Path, process::exit};

/// Columns coerced to numbers in the JSON output. Everything else stays a
/// string. Matches the schema of the forecast data files.
const NUMERIC_COLUMNS: &[&str] = &[
    "Quantity",
    "forecast_12m",
    "old_forecast",
    "old_forecast_error",
    "correction_percent",
];

fn main() {
    // Expect a CSV path and a JSON destination.
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <INPUT_CSV> <OUTPUT_JSON>", args[0]);
        exit(1);
    }
    if let Err(e) = convert(Path::new(&args[1]), Path::new(&args[2])) {
        eprintln!("Error: {:?}", e);
        exit(1);
    }
}

fn convert(csv_path: &Path, json_path: &Path) -> Result<()> {
    let content = fs::read_to_string(csv_path)
        .with_context(|| format!("reading {}", csv_path.display()))?;
    let table = Table::parse(&content).context("parsing csv")?;

    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (header, cell) in table.headers.iter().zip(row) {
                obj.insert(header.clone(), cell_value(header, cell));
            }
            Value::Object(obj)
        })
        .collect();

    let json = serde_json::to_string_pretty(&records)?;
    fs::write(json_path, json).with_context(|| format!("writing {}", json_path.display()))?;
    println!(
        "Converted {} rows from {} to {}",
        records.len(),
        csv_path.display(),
        json_path.display()
    );
    Ok(())
}

/// Numeric columns become numbers (empty cells become null). The data
/// files use a comma decimal separator, so `12,5` parses as 12.5.
fn cell_value(header: &str, cell: &str) -> Value {
    if !NUMERIC_COLUMNS.contains(&header) {
        return Value::String(cell.to_string());
    }
    if cell.is_empty() {
        return Value::Null;
    }
    match cell.replace(',', ".").parse::<f64>() {
        Ok(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Err(_) => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_columns_are_coerced() {
        assert_eq!(cell_value("Quantity", "120"), serde_json::json!(120.0));
        assert_eq!(cell_value("Quantity", "12,5"), serde_json::json!(12.5));
        assert_eq!(cell_value("Quantity", ""), Value::Null);
    }

    #[test]
    fn other_columns_stay_strings() {
        assert_eq!(
            cell_value("Product Group", "120"),
            Value::String("120".to_string())
        );
    }
}
