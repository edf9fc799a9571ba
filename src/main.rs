use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use serde::de::DeserializeOwned;

use chartspec::data::WorkingTable;
use chartspec::field::{FieldMetadata, FieldRegistry};
use chartspec::{compile_with_options, parser, writer, CompileOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Vega-Lite v5 document
    VegaLite,
    /// Compiled chart spec, before Vega-Lite conversion
    Spec,
}

#[derive(Parser, Debug)]
#[command(name = "chartspec")]
#[command(about = "Compile a chart encoding over tabular data read from stdin", long_about = None)]
struct Args {
    /// Chart type (e.g. "Bar Chart", "scatter", "pie")
    chart_type: String,

    /// Encoding shorthand (e.g. 'x: category, y: sum(value) desc, color: region')
    encoding: String,

    /// Format of the table on stdin
    #[arg(short, long, value_enum, default_value_t = InputFormat::Csv)]
    format: InputFormat,

    /// JSON array of field definitions; inferred from the table when omitted
    #[arg(long)]
    fields: Option<PathBuf>,

    /// JSON object of per-column metadata (type, semanticType, levels)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// JSON file of compile options; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Maximum categories kept per channel
    #[arg(short = 'k', long)]
    top_k: Option<i64>,

    #[arg(long)]
    width: Option<i64>,

    #[arg(long)]
    height: Option<i64>,

    /// Hide the color legend
    #[arg(long)]
    no_legend: bool,

    /// Overlay value labels on the marks
    #[arg(long)]
    labels: bool,

    /// Table reference used in inferred field identifiers
    #[arg(long, default_value = "table")]
    table_name: String,

    #[arg(long, value_enum, default_value_t = Emit::VegaLite)]
    emit: Emit,

    /// Leave the table out of the Vega-Lite output
    #[arg(long)]
    no_data: bool,

    /// Log compilation details to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {} file {}", what, path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid {} file {}", what, path.display()))
}

fn read_table(format: InputFormat) -> Result<WorkingTable> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read table from stdin")?;

    match format {
        InputFormat::Csv => WorkingTable::from_csv(input.as_bytes()),
        InputFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(&input).context("Invalid JSON table")?;
            WorkingTable::from_json(&value)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    let table = read_table(args.format)?;
    info!("loaded {} rows", table.len());

    let registry = match &args.fields {
        Some(path) => read_json::<FieldRegistry>(path, "fields")?,
        None => FieldRegistry::from_table(&args.table_name, &table),
    };
    let metadata = match &args.metadata {
        Some(path) => read_json::<FieldMetadata>(path, "metadata")?,
        None => FieldMetadata::new(),
    };

    let mut options = match &args.options {
        Some(path) => read_json::<CompileOptions>(path, "options")?,
        None => CompileOptions::default(),
    };
    if let Some(k) = args.top_k {
        options.top_k = k;
    }
    if let Some(w) = args.width {
        options.width = w;
    }
    if let Some(h) = args.height {
        options.height = h;
    }
    options.color_legend_suppressed |= args.no_legend;
    options.show_labels |= args.labels;
    debug!("compile options: {:?}", options);

    let bindings = parser::parse_encoding_str(&args.encoding).context("Failed to parse encoding")?;
    let encoding = parser::build_encoding(&bindings, &registry)?;

    let (chart_type, spec) = compile_with_options(&args.chart_type, &encoding, &registry, &table, &metadata, &options)
        .context("Failed to compile chart")?;
    info!("compiled {} with {} channels", chart_type, spec.encoding.len());

    let output = match args.emit {
        Emit::VegaLite => {
            let data = if args.no_data { None } else { Some(&table) };
            writer::to_vega_lite(&spec, data)
        }
        Emit::Spec => serde_json::to_value(&spec).context("Failed to serialize spec")?,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &output).context("Failed to write output")?;
    writeln!(handle).context("Failed to write output")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
