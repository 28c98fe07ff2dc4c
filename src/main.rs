use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sqlite_ingest::convert::{
    CompositeObserver, ConversionObserver, ConvertOptions, Converter, FileObserver, TracingObserver,
};
use sqlite_ingest::policy::WriteMode;
use sqlite_ingest::sink::SqliteSink;
use sqlite_ingest::source::{collect_inputs, SourceFormat};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Create,
    Overwrite,
    Append,
}

impl From<ModeArg> for WriteMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Create => WriteMode::Create,
            ModeArg::Overwrite => WriteMode::Overwrite,
            ModeArg::Append => WriteMode::Append,
        }
    }
}

#[derive(Parser)]
#[command(name = "sqlite-ingest")]
#[command(about = "Convert CSV, JSON, Parquet, Markdown, Excel, notebook and SQLite files into one SQLite database")]
struct Args {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output SQLite database (created if missing)
    #[arg(short, long, default_value = "out.sqlite")]
    output: PathBuf,

    /// What to do with tables that already exist
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Read every input as this format instead of detecting it from the extension
    #[arg(long)]
    format: Option<String>,

    /// Infer column types from at most this many rows
    #[arg(long)]
    max_sample_rows: Option<usize>,

    /// Hold at most this many rows of a table in memory; the rest is streamed into the database
    #[arg(long)]
    max_buffer_rows: Option<usize>,

    /// Regex selecting the primary key column
    #[arg(long, conflicts_with = "no_id_key")]
    id_pattern: Option<String>,

    /// Never declare a primary key
    #[arg(long)]
    no_id_key: bool,

    /// Table name template using {source}, {label} and {index}
    #[arg(long = "table-name")]
    table_name: Option<String>,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Stop at the first error
    #[arg(long)]
    fail_fast: bool,

    /// Do not record converted tables in the _source_info_ table
    #[arg(long)]
    no_source_info: bool,

    /// JSON options file; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Append conversion events to this log file
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn options(&self) -> Result<ConvertOptions> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::from_json_file(path)
                .with_context(|| format!("loading options from {}", path.display()))?,
            None => ConvertOptions::default(),
        };
        if let Some(mode) = self.mode {
            options.mode = mode.into();
        }
        if self.max_sample_rows.is_some() {
            options.max_sample_rows = self.max_sample_rows;
        }
        if self.max_buffer_rows.is_some() {
            options.source.max_buffer_rows = self.max_buffer_rows;
        }
        if self.id_pattern.is_some() {
            options.id_pattern = self.id_pattern.clone();
        }
        if self.no_id_key {
            options.id_pattern = None;
        }
        if self.table_name.is_some() {
            options.table_name_template = self.table_name.clone();
        }
        if self.fail_fast {
            options.fail_fast = true;
        }
        if self.no_source_info {
            options.record_source_info = false;
        }
        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<bool> {
    let options = args.options()?;

    let format = match &args.format {
        Some(name) => match SourceFormat::from_name(name) {
            Some(f) => Some(f),
            None => bail!("unknown format '{name}'"),
        },
        None => None,
    };
    let mut sources = collect_inputs(args.inputs.as_slice(), args.recursive)?;
    // A directory input may contain the output database itself.
    sources.retain(|s| !is_output(&s.path, &args.output));
    if sources.is_empty() {
        bail!("no input files found");
    }
    for source in &mut sources {
        source.format = format.or(source.format);
    }

    let sink = SqliteSink::open(&args.output)
        .with_context(|| format!("opening {}", args.output.display()))?;
    let mut converter = Converter::new(sink, options)?;
    if let Some(path) = &args.event_log {
        let observers: Vec<Arc<dyn ConversionObserver>> =
            vec![Arc::new(TracingObserver), Arc::new(FileObserver::new(path))];
        converter = converter.with_observer(Arc::new(CompositeObserver::new(observers)));
    }

    tracing::info!(sources = sources.len(), output = %args.output.display(), "converting");
    let report = converter.convert_sources(&sources)?;

    let json = report.to_json()?;
    match &args.report {
        Some(path) => fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(report.succeeded())
}

/// Compares resolved paths so `./out.sqlite` and `dir/../out.sqlite` match the output too.
fn is_output(path: &Path, output: &Path) -> bool {
    match (fs::canonicalize(path), fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => path == output,
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    if run(args)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::is_output;

    #[test]
    fn output_matches_through_relative_spellings() {
        let dir = std::env::temp_dir().join(format!("sqlite-ingest-main-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        let out = dir.join("out.sqlite");
        std::fs::write(&out, b"").unwrap();

        assert!(is_output(&dir.join("sub").join("..").join("out.sqlite"), &out));
        assert!(is_output(&dir.join(".").join("out.sqlite"), &out));
        assert!(!is_output(&dir.join("sub"), &out));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_output_falls_back_to_plain_comparison() {
        let missing = std::path::Path::new("no-such-dir/out.sqlite");
        assert!(is_output(missing, missing));
        assert!(!is_output(missing, std::path::Path::new("no-such-dir/other.sqlite")));
    }
}
