use spendloader::load::{self, DataPaths};
use std::{
    env,
    path::{Path, PathBuf},
    process::exit,
};

/// Dry-run the parse stage of the pipeline against the two source CSVs,
/// without touching the database. Prints row counts and how many timestamp
/// values would load as NULL.
fn main() {
    // Either no arguments (resolve the fixed names under ./data) or
    // exactly two explicit paths.
    let args: Vec<String> = env::args().collect();
    let (brand_csv, daily_csv) = match args.len() {
        1 => {
            let cwd = match env::current_dir() {
                Ok(cwd) => cwd,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    exit(1);
                }
            };
            let paths = DataPaths::resolve(&cwd);
            (paths.brand_csv, paths.daily_csv)
        }
        3 => (PathBuf::from(&args[1]), PathBuf::from(&args[2])),
        _ => {
            eprintln!("Usage: {} [<BRAND_CSV> <DAILY_CSV>]", args[0]);
            exit(1);
        }
    };

    if let Err(e) = inspect(&brand_csv, &daily_csv) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn inspect(brand_csv: &Path, daily_csv: &Path) -> spendloader::Result<()> {
    println!("=== Brand extract: {} ===", brand_csv.display());
    let brand_rows = load::read_brand_rows(brand_csv)?;
    println!("{:<28} {:>10}", "Rows parsed:", brand_rows.len());
    println!();

    println!("=== Daily spend extract: {} ===", daily_csv.display());
    let (spend_rows, stats) = load::read_spend_rows(daily_csv)?;
    println!("{:<28} {:>10}", "Rows parsed:", spend_rows.len());
    if stats.total() == 0 {
        println!("{:<28} {:>10}", "Timestamps unparsed:", 0);
    } else {
        for (column, dropped) in stats.iter() {
            println!("{:<28} {:>10}", format!("{} -> NULL:", column), dropped);
        }
    }

    Ok(())
}
