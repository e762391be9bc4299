//! textpipe CLI: stream CSV through bounded pipes from the command line.

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use textpipe_core::config::PipeConfig;
use textpipe_core::error::{BoxError, Error};
use textpipe_exec::join::join_lines;
use textpipe_exec::pipe::{PipeBuilder, PipeReader, PipeWriter, ProducerResult};
use textpipe_io::{csv_pipe, CsvOptions, Dialect, Row, RowEncoder};
use tracing_subscriber::EnvFilter;

/// Characters pulled per read by `profile`.
const PROFILE_READ_SIZE: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "textpipe", version = textpipe_core::VERSION)]
#[command(about = "Stream text through bounded producer/consumer pipes", long_about = None)]
struct Cli {
    /// Log verbosity on stderr (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode JSON-lines rows (arrays or objects) to CSV on stdout
    Encode(EncodeArgs),

    /// Join files line by line, each read through its own pipe
    Join {
        /// Input files, joined in the order given
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Separator placed between the pieces of each joined line
        #[arg(long, default_value = ",")]
        sep: String,

        /// Pending chunks allowed per pipe (overrides TEXTPIPE_BUFFER_SIZE)
        #[arg(long)]
        buffer_size: Option<usize>,
    },

    /// Stream synthetic rows through a CSV pipe and report throughput
    Profile {
        #[arg(long, default_value = "100000")]
        rows: usize,

        #[arg(long, default_value = "10")]
        buffer_size: usize,

        #[arg(long, default_value = "10")]
        chunk_rows: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct EncodeArgs {
    /// JSON-lines file, or `-` for stdin
    #[arg(short, long)]
    input: PathBuf,

    /// Field names, comma separated (required for object rows)
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Write the field names as the first line
    #[arg(long)]
    header: bool,

    #[arg(long)]
    delimiter: Option<char>,

    /// excel, excel_tab or unix
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Fail on missing fields and field-count mismatches
    #[arg(long)]
    strict: bool,

    #[arg(long)]
    buffer_size: Option<usize>,

    #[arg(long)]
    chunk_rows: Option<usize>,

    /// YAML file with `pipe:` and `csv:` sections
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pipe(#[from] Error),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("writing output: {0}")]
    Output(#[source] io::Error),
}

impl CliError {
    fn suggestions(&self) -> Vec<String> {
        match self {
            CliError::Pipe(Error::Producer(inner)) => inner
                .downcast_ref::<Error>()
                .map(Error::suggestions)
                .unwrap_or_default(),
            CliError::Pipe(e) => e.suggestions(),
            CliError::ConfigFile { .. } => {
                vec!["Expected top-level `pipe:` and `csv:` mappings".into()]
            }
            _ => vec![],
        }
    }
}

/// Contents of `--config`.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct FileConfig {
    pipe: PipeConfig,
    csv: CsvOptions,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            pipe: PipeConfig::from_env(),
            csv: CsvOptions::default(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Encode(args) => encode(&args),
        Commands::Join {
            inputs,
            sep,
            buffer_size,
        } => join(&inputs, &sep, buffer_size),
        Commands::Profile {
            rows,
            buffer_size,
            chunk_rows,
            json,
        } => profile(rows, buffer_size, chunk_rows).and_then(|report| report.print(json)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        for hint in e.suggestions() {
            eprintln!("  hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<FileConfig, CliError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let yaml = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&yaml).map_err(|source| CliError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })
}

impl EncodeArgs {
    /// Command-line flags layered over the config file's options.
    fn csv_options(&self, base: CsvOptions) -> CsvOptions {
        let mut opts = match self.dialect {
            // A dialect replaces the format settings but keeps the row policy.
            Some(dialect) => CsvOptions {
                header: base.header,
                fieldnames: base.fieldnames,
                chunk_rows: base.chunk_rows,
                strict: base.strict,
                rest_value: base.rest_value,
                extra_fields: base.extra_fields,
                ..CsvOptions::dialect(dialect)
            },
            None => base,
        };
        if let Some(fields) = &self.fields {
            opts.fieldnames = Some(fields.clone());
        }
        if self.header {
            opts.header = true;
        }
        if self.strict {
            opts.strict = true;
        }
        if let Some(delimiter) = self.delimiter {
            opts.delimiter = delimiter;
        }
        if let Some(chunk_rows) = self.chunk_rows {
            opts.chunk_rows = chunk_rows;
        }
        opts
    }

    fn open_input(&self) -> Result<Box<dyn BufRead + Send>, CliError> {
        if self.input.as_os_str() == "-" {
            return Ok(Box::new(BufReader::new(io::stdin())));
        }
        let file = File::open(&self.input).map_err(|source| CliError::Read {
            path: self.input.clone(),
            source,
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn encode(args: &EncodeArgs) -> Result<(), CliError> {
    let file_config = load_config(args.config.as_deref())?;
    let opts = args.csv_options(file_config.csv);
    let mut pipe_config = file_config.pipe;
    if let Some(n) = args.buffer_size {
        pipe_config.buffer_size = n;
    }
    opts.validate()?;

    let input = args.open_input()?;
    tracing::info!(input = %args.input.display(), buffer_size = pipe_config.buffer_size, "encoding rows");

    let mut reader = PipeBuilder::from_config(pipe_config)
        .thread_name("textpipe-encode")
        .build(move |sink| encode_jsonl(sink, input, &opts))?;
    let lines = write_lines(reader.lines())?;
    tracing::info!(lines, "encode finished");
    Ok(())
}

/// Producer body for `encode`: JSON lines in, CSV chunks out.
fn encode_jsonl(sink: &mut PipeWriter, input: Box<dyn BufRead + Send>, opts: &CsvOptions) -> ProducerResult {
    let mut encoder = RowEncoder::new(opts)?;
    let mut w = encoder.writer(&mut *sink);
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = parse_row(&line).map_err(|e| -> BoxError { format!("line {}: {}", i + 1, e).into() })?;
        encoder.write_row(&mut w, &row)?;
        if encoder.rows_encoded() % opts.chunk_rows == 0 {
            w.flush()?;
        }
    }
    encoder.finish(&mut w)?;
    Ok(())
}

/// One JSON line as a row. Scalars are stringified, `null` becomes empty.
fn parse_row(line: &str) -> Result<Row, String> {
    match serde_json::from_str::<Value>(line).map_err(|e| e.to_string())? {
        Value::Array(items) => Ok(Row::fields(items.iter().map(field_text))),
        Value::Object(map) => Ok(Row::named(map.iter().map(|(k, v)| (k.as_str(), field_text(v))))),
        other => Err(format!("expected a JSON array or object, got `{}`", other)),
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join(inputs: &[PathBuf], sep: &str, buffer_size: Option<usize>) -> Result<(), CliError> {
    let mut config = PipeConfig::from_env();
    if let Some(n) = buffer_size {
        config.buffer_size = n;
    }

    let readers = file_pipes(inputs, &config)?;
    let lines = write_lines(join_lines(readers).sep(sep))?;
    tracing::info!(inputs = inputs.len(), lines, "join finished");
    Ok(())
}

/// One pipe per input file, each copying its file on its own thread.
/// Every file is opened up front so a bad path fails before any output.
fn file_pipes(inputs: &[PathBuf], config: &PipeConfig) -> Result<Vec<PipeReader>, CliError> {
    let mut readers = Vec::with_capacity(inputs.len());
    for (i, path) in inputs.iter().enumerate() {
        let mut file = File::open(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let reader = PipeBuilder::from_config(config.clone())
            .thread_name(format!("textpipe-join-{}", i))
            .build(move |sink| {
                io::copy(&mut file, sink)?;
                Ok(())
            })?;
        readers.push(reader);
    }
    Ok(readers)
}

/// Copy lines to stdout. A closed stdout ends the copy quietly; the caller
/// dropping its readers then stops their producers.
fn write_lines<I>(lines: I) -> Result<usize, CliError>
where
    I: Iterator<Item = textpipe_core::error::Result<String>>,
{
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut count = 0;
    for line in lines {
        let line = line?;
        match out.write_all(line.as_bytes()) {
            Ok(()) => count += 1,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(count),
            Err(e) => return Err(CliError::Output(e)),
        }
    }
    match out.flush() {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(CliError::Output(e)),
        _ => Ok(count),
    }
}

#[derive(Debug, Serialize)]
struct ProfileReport {
    rows: usize,
    bytes: usize,
    chunks: usize,
    buffer_size: usize,
    chunk_rows: usize,
    peak_pending: usize,
    elapsed_ms: f64,
}

impl ProfileReport {
    fn print(&self, json: bool) -> Result<(), CliError> {
        if json {
            let text = serde_json::to_string_pretty(self)
                .map_err(|e| CliError::Output(e.into()))?;
            println!("{}", text);
            return Ok(());
        }
        let secs = self.elapsed_ms / 1000.0;
        println!("Pipe Profile");
        println!("============");
        println!("  Rows: {}", self.rows);
        println!("  Bytes: {} ({:.2} MB)", self.bytes, self.bytes as f64 / 1_048_576.0);
        println!("  Chunks: {} ({} rows each)", self.chunks, self.chunk_rows);
        println!("  Peak pending: {} of {}", self.peak_pending, self.buffer_size);
        println!("  Elapsed: {:.1}ms", self.elapsed_ms);
        if secs > 0.0 {
            println!("  Throughput: {:.0} rows/s", self.rows as f64 / secs);
        }
        Ok(())
    }
}

fn synthetic_row(i: usize) -> Row {
    Row::fields([
        i.to_string(),
        format!("item-{}", i),
        (i * 7 % 1000).to_string(),
        if i % 3 == 0 { "a, quoted \"field\"".to_string() } else { "plain".to_string() },
    ])
}

fn profile(rows: usize, buffer_size: usize, chunk_rows: usize) -> Result<ProfileReport, CliError> {
    let config = PipeConfig {
        buffer_size,
        ..PipeConfig::from_env()
    };
    let opts = CsvOptions::default().with_chunk_rows(chunk_rows);

    let started = Instant::now();
    let mut reader = csv_pipe((0..rows).map(synthetic_row), opts, config)?;
    let mut bytes = 0;
    loop {
        let text = reader.read(PROFILE_READ_SIZE)?;
        if text.is_empty() {
            break;
        }
        bytes += text.len();
    }
    let elapsed = started.elapsed();

    let pipe = reader.get_ref();
    Ok(ProfileReport {
        rows,
        bytes,
        chunks: pipe.chunks_read(),
        buffer_size: pipe.buffer_size(),
        chunk_rows,
        peak_pending: pipe.peak_pending(),
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
    })
}
