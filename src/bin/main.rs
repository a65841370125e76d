//! IIIF Manifest CLI
//!
//! Command-line tool for building IIIF manifests from the catalog triplestore
//! and for inspecting the intermediate pipeline stages.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use iiif_manifest::{
    build_construct_query, frame_result, to_json_string, transform, Frame, ManifestError,
    ManifestService, ObjectIdentifier, Settings,
};

#[derive(Parser)]
#[command(name = "iiif-manifest")]
#[command(about = "Build IIIF Presentation 3 manifests from an RDF triplestore")]
#[command(version)]
struct Cli {
    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph-query endpoint URL (overrides the settings file)
    #[arg(long, global = true, env = "IIIF_SPARQL_ENDPOINT")]
    endpoint: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch data for an object and build its manifest
    Manifest(ManifestArgs),
    /// Print the CONSTRUCT query for an object
    Query(QueryArgs),
    /// Build a manifest from a stored query result
    Build(InputArgs),
    /// Print the framed tree of a stored query result
    Frame(InputArgs),
}

#[derive(Args)]
struct ManifestArgs {
    /// Object identifier, e.g. ubb-ms-0003
    id: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct QueryArgs {
    /// Object identifier
    id: String,
}

#[derive(Args)]
struct InputArgs {
    /// Query result file (JSON-LD or RDF/JSON)
    input: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn load_settings(cli: &Cli) -> Result<Settings, ManifestError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint.url = endpoint.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.endpoint.timeout_ms = timeout_ms;
    }
    Ok(settings)
}

fn read_input(path: &PathBuf) -> Result<Value, ManifestError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), ManifestError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn run_manifest(settings: &Settings, args: ManifestArgs) -> Result<(), ManifestError> {
    let service = ManifestService::from_settings(settings)?;
    let outcome = service.get_manifest(&args.id)?;

    eprintln!(
        "Built manifest with {} canvases ({} warnings)",
        outcome.manifest.items.len(),
        outcome.warnings.len()
    );

    let output = to_json_string(&outcome.manifest, args.output.pretty)?;
    write_output(&output, args.output.output.as_ref())
}

fn run_query(settings: &Settings, args: QueryArgs) -> Result<(), ManifestError> {
    let id = ObjectIdentifier::parse(&args.id)?;
    write_output(&build_construct_query(&id, &settings.query), None)
}

fn run_build(settings: &Settings, args: InputArgs) -> Result<(), ManifestError> {
    let raw = read_input(&args.input)?;
    let outcome = transform(&raw, &Frame::manifest(), &settings.manifest)?;

    eprintln!(
        "Built manifest with {} canvases ({} warnings)",
        outcome.manifest.items.len(),
        outcome.warnings.len()
    );

    let output = to_json_string(&outcome.manifest, args.output.pretty)?;
    write_output(&output, args.output.output.as_ref())
}

fn run_frame(args: InputArgs) -> Result<(), ManifestError> {
    let raw = read_input(&args.input)?;
    let tree = frame_result(&raw, &Frame::manifest())?;
    let output = to_json_string(&tree, args.output.pretty)?;
    write_output(&output, args.output.output.as_ref())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("iiif_manifest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_settings(&cli).and_then(|settings| match cli.command {
        Commands::Manifest(args) => run_manifest(&settings, args),
        Commands::Query(args) => run_query(&settings, args),
        Commands::Build(args) => run_build(&settings, args),
        Commands::Frame(args) => run_frame(args),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
