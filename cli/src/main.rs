use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use sparql_proto_core::{compile, load_document, HttpExecutor, LangTag, Options, Transformer};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "sparql-proto")]
#[command(about = "Compile JSON graph prototypes into SPARQL and shape endpoint results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query document, run it against the endpoint, shape the results
    Query {
        /// Input query document (JSON)
        input: PathBuf,

        /// SPARQL endpoint URL (overrides the built-in default)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Rendering of language-tagged literals
        #[arg(long, value_enum, default_value_t = LangTagArg::Show)]
        lang_tag: LangTagArg,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Print the generated SPARQL query without contacting an endpoint
    Compile {
        /// Input query document (JSON)
        input: PathBuf,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LangTagArg {
    Show,
    Hide,
}

impl From<LangTagArg> for LangTag {
    fn from(arg: LangTagArg) -> Self {
        match arg {
            LangTagArg::Show => LangTag::Show,
            LangTagArg::Hide => LangTag::Hide,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Query {
            input,
            endpoint,
            lang_tag,
            timeout,
            output,
            format,
        } => {
            let document = load_document(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;

            let mut options = Options {
                lang_tag: lang_tag.into(),
                debug: cli.verbose,
                ..Options::default()
            };
            if let Some(endpoint) = endpoint {
                options.endpoint = endpoint;
            }

            let transformer = match timeout {
                Some(secs) => {
                    let executor = HttpExecutor::with_timeout(
                        options.endpoint.clone(),
                        Duration::from_secs(secs),
                    )
                    .context("failed to build HTTP executor")?;
                    Transformer::with_executor(options, executor)
                }
                None => Transformer::new(options),
            };

            let results = transformer
                .transform(&document)
                .context("transformation failed")?;
            write_json(&results, output.as_deref(), format)
        }

        Commands::Compile { input, output } => {
            let document = load_document(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;
            let compiled =
                compile(&document, &Options::default()).context("query compilation failed")?;
            write_text(&compiled.query, output.as_deref())
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn write_json(value: &Value, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    write_text(&rendered, output)
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{text}")?;
        }
        None => {
            println!("{text}");
        }
    }
    Ok(())
}
