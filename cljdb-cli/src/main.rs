//! Command-line front end for cljdb-core: load CSV tables into heap files,
//! scan either storage, and validate a heap file's page layout.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cljdb_core::catalog;
use cljdb_core::diagnostics;
use cljdb_core::executor;
use cljdb_core::heap;
use cljdb_core::tuple::{ColumnIndex, Value};

mod plan;

#[derive(Parser)]
#[command(name = "cljdb")]
#[command(about = "File-backed relational query engine")]
#[command(version)]
struct Cli {
    /// Directory holding `<table>_catalog`, `<table>_table.csv`, `<table>_table.cljdb`
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read `<table>_table.csv` and write it into a fresh `<table>_table.cljdb` heap file
    Load {
        table: String,
    },
    /// Print every row of a table (from its heap file, or its CSV with `--csv`)
    Scan {
        table: String,
        #[arg(long)]
        csv: bool,
    },
    /// Walk a heap file's sections/pages and report structural problems
    Validate {
        table: String,
    },
    /// Execute a plan described as a JSON document of `{key, ops}` steps
    Run {
        /// Path to the plan JSON file
        plan: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).compact().finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Load { table } => load(&cli.dir, &table),
        Commands::Scan { table, csv } => scan(&cli.dir, &table, csv),
        Commands::Validate { table } => validate(&cli.dir, &table),
        Commands::Run { plan } => run_plan(&cli.dir, &plan),
    }
}

fn run_plan(dir: &PathBuf, plan_path: &PathBuf) -> anyhow::Result<()> {
    let parsed = plan::load_plan(dir, plan_path)?;
    info!(plan = %plan_path.display(), steps = parsed.len(), "running plan");
    let rows = executor::execute(parsed)?;

    for row in &rows {
        println!("{}", serde_json::to_string(row).unwrap_or_default());
    }
    println!("({} rows)", rows.len());
    Ok(())
}

fn load(dir: &PathBuf, table: &str) -> anyhow::Result<()> {
    let cat = catalog::read_catalog(dir, table)?;
    let columns = ColumnIndex::new(cat.columns.clone(), cat.schema.clone());

    let csv_path = dir.join(format!("{table}_table.csv"));
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&csv_path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        rows.push(columns.string_row_to_types(&raw)?);
    }
    let row_count = rows.len();

    let heap_path = dir.join(format!("{table}_table.cljdb"));
    let mut file = File::options().create(true).read(true).write(true).truncate(true).open(&heap_path)?;
    heap::write_rows(&mut file, &cat, rows)?;

    info!(table, row_count, path = %heap_path.display(), "loaded table into heap file");
    println!("loaded {row_count} rows into {}", heap_path.display());
    Ok(())
}

fn scan(dir: &PathBuf, table: &str, from_csv: bool) -> anyhow::Result<()> {
    let cat = catalog::read_catalog(dir, table)?;
    let columns = ColumnIndex::new(cat.columns.clone(), cat.schema.clone());

    let rows: Vec<Vec<Value>> = if from_csv {
        let path = dir.join(format!("{table}_table.csv"));
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&path)?;
        reader
            .records()
            .map(|r| {
                let r = r?;
                let raw: Vec<String> = r.iter().map(|s| s.to_string()).collect();
                Ok::<_, anyhow::Error>(columns.string_row_to_types(&raw)?)
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    } else {
        let path = dir.join(format!("{table}_table.cljdb"));
        let file = File::open(&path)?;
        heap::scan(&cat, file).collect::<cljdb_core::Result<Vec<_>>>()?
    };

    for row in &rows {
        print_row(&columns, row);
    }
    println!("({} rows)", rows.len());
    Ok(())
}

fn print_row(columns: &ColumnIndex, row: &[Value]) {
    let dict: HashMap<String, serde_json::Value> = columns
        .columns()
        .iter()
        .cloned()
        .zip(row.iter().map(value_to_json))
        .collect();
    println!("{}", serde_json::to_string(&dict).unwrap_or_default());
}

fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
    }
}

fn validate(dir: &PathBuf, table: &str) -> anyhow::Result<()> {
    let cat = catalog::read_catalog(dir, table)?;
    let columns = ColumnIndex::new(cat.columns.clone(), cat.schema.clone());
    let path = dir.join(format!("{table}_table.cljdb"));
    let mut file = File::open(&path)?;

    let report = diagnostics::validate_heap(&mut file, &columns)?;

    println!("Heap Validation Report");
    println!("======================");
    println!();
    println!("Status: {}", if report.valid { "VALID" } else { "INVALID" });
    println!();
    println!("Statistics:");
    println!("  Sections: {}", report.stats.section_count);
    println!("  Data pages: {}", report.stats.data_page_count);
    println!("  Rows: {}", report.stats.row_count);

    if !report.problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &report.problems {
            println!("  - {p}");
        }
    }

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}
