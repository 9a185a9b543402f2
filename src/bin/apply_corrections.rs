use anyhow::{Context, Result};
use forecastd::{
    corrections::{self, Correction},
    table::Table,
};
use std::{env, fs, path::Path, process::exit};

/// Offline batch fixup: apply a corrections JSON file to a CSV in place,
/// without going through the HTTP service.
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <CORRECTIONS_JSON> <DATA_CSV>", args[0]);
        exit(1);
    }
    if let Err(e) = run(Path::new(&args[1]), Path::new(&args[2])) {
        eprintln!("Error: {:?}", e);
        exit(1);
    }
}

fn run(corrections_path: &Path, csv_path: &Path) -> Result<()> {
    let corrections: Vec<Correction> = serde_json::from_str(
        &fs::read_to_string(corrections_path)
            .with_context(|| format!("reading {}", corrections_path.display()))?,
    )
    .context("parsing corrections json")?;

    let content = fs::read_to_string(csv_path)
        .with_context(|| format!("reading {}", csv_path.display()))?;
    let mut table = Table::parse(&content).context("parsing csv")?;

    let updated = corrections::apply(&mut table, &corrections)?;
    fs::write(csv_path, table.to_csv()?)
        .with_context(|| format!("writing {}", csv_path.display()))?;

    println!(
        "Applied {} corrections, updated {} rows in {}",
        corrections.len(),
        updated,
        csv_path.display()
    );
    Ok(())
}
