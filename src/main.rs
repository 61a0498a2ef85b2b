use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use systemsketch::config::SketchConfig;
use systemsketch::diagram::ParseOptions;
use systemsketch::diagram::Violation;
use systemsketch::diagram::dot::{DotOptions, RankDir};
use systemsketch::error::{ErrorCode, SketchError};
use systemsketch::pipeline::{SketchOutput, SketchRequest, Sketcher};
use systemsketch::render::ImageFormat;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const OUTPUT_STEM: &str = "architecture";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("[{code}] {0}", code = .0.error_code())]
    Sketch(#[from] SketchError),
    #[error("{path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("could not serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{failed} of {requested} export(s) failed")]
    Exports { failed: usize, requested: usize },
    #[error("render service at {0} is unreachable")]
    Unreachable(String),
}

impl CliError {
    fn details(&self) -> Option<String> {
        match self {
            Self::Sketch(err) => err.details(),
            _ => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "systemsketch", about = "Architecture explanation and diagram from a requirement")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate explanation, DOT source and images for a requirement.
    Generate(GenerateArgs),
    /// Parse a saved completion offline and print its DOT source.
    Parse(ParseArgs),
    /// Check that the render service answers.
    Probe {
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(help = "Requirement text, or - for stdin")]
    requirement: String,

    #[arg(long = "format", value_delimiter = ',', default_value = "png")]
    formats: Vec<ImageFormat>,

    #[arg(long, env = "SKETCH_OUT_DIR", default_value = "out")]
    out_dir: PathBuf,

    #[arg(long, help = "Override the configured model")]
    model: Option<String>,

    #[arg(long, default_value_t = false)]
    no_cache: bool,

    #[command(flatten)]
    parse: ParseFlags,
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[arg(help = "Completion text file, or - for stdin")]
    file: String,

    #[command(flatten)]
    parse: ParseFlags,
}

#[derive(Args, Debug)]
struct ParseFlags {
    #[arg(long, default_value_t = false, help = "Fail on structural violations")]
    strict: bool,

    #[arg(long, default_value_t = false, help = "Ask the model to fix undecodable diagram JSON")]
    assisted_repair: bool,

    #[arg(long, default_value = "LR")]
    rankdir: RankDir,

    #[arg(long, default_value_t = false, help = "Print counters as JSON on stderr when done")]
    stats: bool,
}

impl ParseFlags {
    fn options(&self) -> ParseOptions {
        ParseOptions { assisted_repair: self.assisted_repair, strict: self.strict }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "could not load .env"),
    }

    let cli = Cli::parse();
    match run(cli.command, &SketchConfig::from_env()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(details) = e.details() {
                eprintln!("{details}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &SketchConfig) -> Result<(), CliError> {
    match command {
        Command::Generate(args) => run_generate(config, args).await,
        Command::Parse(args) => run_parse(config, args).await,
        Command::Probe { timeout_secs } => run_probe(config, timeout_secs).await,
    }
}

async fn run_generate(config: &SketchConfig, args: GenerateArgs) -> Result<(), CliError> {
    let requirement = read_input(&args.requirement).await?;
    let sketcher = sketcher(config, &args.parse)?;
    let request = SketchRequest {
        formats: args.formats,
        strict: args.parse.strict,
        assisted_repair: args.parse.assisted_repair,
        use_cache: !args.no_cache,
        model: args.model,
    };

    let output = sketcher.sketch(&requirement, &request).await?;
    report_violations(&output.violations);
    println!("{}", output.explanation);
    write_outputs(&args.out_dir, &output).await?;

    if args.parse.stats {
        print_stats(&sketcher)?;
    }

    let failed = output.exports.iter().filter(|e| e.result.is_err()).count();
    if failed > 0 {
        return Err(CliError::Exports { failed, requested: output.exports.len() });
    }
    Ok(())
}

async fn run_parse(config: &SketchConfig, args: ParseArgs) -> Result<(), CliError> {
    let raw = read_source(&args.file).await?;
    let sketcher = sketcher(config, &args.parse)?;
    let outcome = sketcher.parse(&raw, args.parse.options()).await?;
    report_violations(&outcome.violations);
    info!(
        nodes = outcome.graph.nodes.len(),
        edges = outcome.graph.edges.len(),
        resolved_by = outcome.delta.resolved_by.as_deref().unwrap_or("direct"),
        "parsed completion"
    );
    println!("{}", sketcher.dot(&outcome.graph));

    if args.parse.stats {
        print_stats(&sketcher)?;
    }
    Ok(())
}

async fn run_probe(config: &SketchConfig, timeout_secs: u64) -> Result<(), CliError> {
    let sketcher = Sketcher::from_config(config)?;
    if sketcher.probe(Duration::from_secs(timeout_secs)).await {
        println!("ok");
        Ok(())
    } else {
        Err(CliError::Unreachable(config.render.base_url.clone()))
    }
}

fn sketcher(config: &SketchConfig, flags: &ParseFlags) -> Result<Sketcher, CliError> {
    let dot = DotOptions { rankdir: flags.rankdir, ..DotOptions::default() };
    Ok(Sketcher::from_config(config)?.with_dot_options(dot))
}

async fn read_input(arg: &str) -> Result<String, CliError> {
    if arg == "-" { read_stdin().await } else { Ok(arg.to_owned()) }
}

async fn read_source(arg: &str) -> Result<String, CliError> {
    if arg == "-" {
        return read_stdin().await;
    }
    tokio::fs::read_to_string(arg).await.map_err(|source| io_error(Path::new(arg), source))
}

async fn read_stdin() -> Result<String, CliError> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .map_err(|source| CliError::Io { path: "<stdin>".to_owned(), source })?;
    Ok(text)
}

async fn write_outputs(out_dir: &Path, output: &SketchOutput) -> Result<(), CliError> {
    tokio::fs::create_dir_all(out_dir).await.map_err(|source| io_error(out_dir, source))?;

    write_file(&out_dir.join(format!("{OUTPUT_STEM}.dot")), output.dot.as_bytes()).await?;
    let graph = serde_json::to_vec_pretty(&output.graph.to_json())?;
    write_file(&out_dir.join(format!("{OUTPUT_STEM}.json")), &graph).await?;

    for export in &output.exports {
        match &export.result {
            Ok(rendered) => {
                let path = out_dir.join(format!("{OUTPUT_STEM}.{}", export.format.extension()));
                write_file(&path, &rendered.bytes).await?;
                info!(path = %path.display(), cached = rendered.cached, bytes = rendered.bytes.len(), "wrote image");
            }
            Err(e) => warn!(format = %export.format, error = %e, "image not written"),
        }
    }
    Ok(())
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    tokio::fs::write(path, bytes).await.map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> CliError {
    CliError::Io { path: path.display().to_string(), source }
}

fn report_violations(violations: &[Violation]) {
    for violation in violations {
        warn!(kind = violation.kind(), severity = ?violation.severity(), "{violation}");
    }
}

fn print_stats(sketcher: &Sketcher) -> Result<(), CliError> {
    eprintln!("{}", serde_json::to_string_pretty(&sketcher.stats())?);
    Ok(())
}
