use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kegg_geneset::app::{App, LoadResult};
use kegg_geneset::config::{ConfigLoader, ResolvedConfig};
use kegg_geneset::error::KeggError;
use kegg_geneset::kegg::KeggHttpClient;
use kegg_geneset::mygene::MyGeneHttpClient;
use kegg_geneset::output::{JsonOutput, LogProgress};

#[derive(Parser)]
#[command(name = "kegg-geneset")]
#[command(about = "Build KEGG geneset records with genes resolved through MyGene.info")]
#[command(version, author)]
struct Cli {
    /// Path to kegg-geneset.json (defaults to the working or user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load genesets from the KEGG REST API")]
    Load(LoadArgs),
    #[command(about = "Load genesets from KEGG link flat files")]
    ParseFile(ParseFileArgs),
    #[command(about = "Print the current KEGG release")]
    Release,
}

#[derive(Args)]
struct LoadArgs {
    /// KEGG organism code; repeat to load several (defaults to the config)
    #[arg(long = "organism")]
    organisms: Vec<String>,

    /// Write JSON lines here instead of stdout
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ParseFileArgs {
    #[arg(required = true)]
    files: Vec<Utf8PathBuf>,

    #[arg(long, default_value = "hsa")]
    organism: String,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kegg) = report.downcast_ref::<KeggError>() {
            return ExitCode::from(map_exit_code(kegg));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KeggError) -> u8 {
    match error {
        KeggError::MissingConfig | KeggError::UnknownOrganism(_) => 2,
        KeggError::KeggHttp(_)
        | KeggError::KeggStatus { .. }
        | KeggError::MyGeneHttp(_)
        | KeggError::MyGeneStatus { .. }
        | KeggError::MyGeneDecode(_) => 3,
        KeggError::Parse { .. }
        | KeggError::DuplicateEntry { .. }
        | KeggError::DuplicateMatch { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(KeggError::MissingConfig) if cli.config.is_none() => ResolvedConfig::default(),
        Err(err) => return Err(err.into()),
    };

    let kegg = KeggHttpClient::new(&config.kegg_base_url).into_diagnostic()?;
    let mygene = MyGeneHttpClient::new(&config.mygene_base_url).into_diagnostic()?;
    let app = App::new(kegg, mygene);

    match cli.command {
        Commands::Load(args) => {
            let organisms = config.restrict_to(&args.organisms)?;
            let result = app.load(&config, &organisms, &LogProgress);
            finish(result, args.output)
        }
        Commands::ParseFile(args) => {
            let organism = config
                .restrict_to(std::slice::from_ref(&args.organism))?
                .remove(0);
            let result = app.load_files(&args.files, &organism, &LogProgress)?;
            finish(result, args.output)
        }
        Commands::Release => {
            match app.release()? {
                Some(release) => println!("{release}"),
                None => println!("unknown"),
            }
            Ok(())
        }
    }
}

fn finish(result: LoadResult, output: Option<Utf8PathBuf>) -> miette::Result<()> {
    let written = match output {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            JsonOutput::write_records(&result.records, BufWriter::new(file))?
        }
        None => JsonOutput::write_records(&result.records, io::stdout().lock())?,
    };
    info!("wrote {written} genesets");
    JsonOutput::print_failures(&result.failures).into_diagnostic()?;
    if result.records.is_empty() && !result.failures.is_empty() {
        return Err(miette::Report::msg("every source failed"));
    }
    Ok(())
}
