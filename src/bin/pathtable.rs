//! Pathtable CLI - extract table rows from XML documents

use clap::{Parser, ValueEnum};
use pathtable::{DocumentSet, Record, RecordSet, ReaderOptions, Table};
use std::error::Error;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "pathtable")]
#[command(version)]
#[command(about = "Extract tabular records from XML documents using path patterns", long_about = None)]
struct Cli {
    /// Schema file (.json, .yaml/.yml or .xml)
    #[arg(short, long)]
    schema: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Jsonl)]
    format: Format,

    /// Read and extract files on worker threads
    #[arg(long)]
    parallel: bool,

    /// Trim whitespace around text content
    #[arg(long)]
    trim_text: bool,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input files or glob patterns (.xml or .xml.gz)
    #[arg(required = true)]
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One JSON object per line
    Jsonl,
    /// Comma-separated values with a header
    Csv,
    /// Tab-separated values with a header
    Tsv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let table = Arc::new(Table::load(&cli.schema)?);
    log::info!(
        "loaded table `{}` with {} columns",
        table.path(),
        table.columns().len()
    );

    let paths = expand_inputs(&cli.inputs)?;
    log::info!("processing {} files", paths.len());

    let documents = DocumentSet::from_paths(paths).with_options(ReaderOptions {
        trim_text: cli.trim_text,
    });
    let record_set = RecordSet::new(&documents, Arc::clone(&table));
    let records = if cli.parallel {
        record_set.par_iter()
    } else {
        record_set.iter()
    };

    let stdout = io::stdout();
    let out = BufWriter::new(stdout.lock());
    match cli.format {
        Format::Jsonl => write_jsonl(out, &table, records),
        Format::Csv => write_delimited(out, b',', &table, records),
        Format::Tsv => write_delimited(out, b'\t', &table, records),
    }
}

/// Expand glob patterns; other inputs are taken as literal paths
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let mut matched: Vec<PathBuf> = glob::glob(input)?.filter_map(Result::ok).collect();
            if matched.is_empty() {
                log::warn!("no files match `{}`", input);
            }
            matched.sort();
            paths.extend(matched);
        } else {
            paths.push(PathBuf::from(input));
        }
    }
    Ok(paths)
}

fn write_jsonl(
    mut out: impl Write,
    table: &Table,
    records: impl Iterator<Item = Record>,
) -> Result<(), Box<dyn Error>> {
    for record in records {
        serde_json::to_writer(&mut out, &record.ordered(table))?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn write_delimited(
    out: impl Write,
    delimiter: u8,
    table: &Table,
    records: impl Iterator<Item = Record>,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);

    writer.write_record(table.column_names())?;
    for record in records {
        let row = record.row(table);
        writer.write_record(row.iter().map(|value| value.unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}
