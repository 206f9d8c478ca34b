use clap::Parser;
use clap::error::ErrorKind;
use imsim_cli::visualize::save_matches;
use imsim_cli::{OrbSimilarity, SimilarityConfig, SimilarityResult, hu_moments};
use imsim_core::init_thread_pool;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Score how closely a photographed document matches the reference image.
#[derive(Parser, Debug)]
#[command(name = "image_similarity", version, about)]
struct Cli {
    /// Candidate image
    candidate: PathBuf,

    /// Reference image (overrides the config file)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// TOML or JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a side-by-side match image here
    #[arg(long, value_name = "OUT")]
    visualize: Option<PathBuf>,

    /// Also print the Hu moments of the candidate
    #[arg(long)]
    hu: bool,
}

fn run(cli: Cli) -> SimilarityResult<()> {
    let mut config = match &cli.config {
        Some(path) => SimilarityConfig::load(path)?,
        None => SimilarityConfig::default(),
    };
    if let Some(reference) = cli.reference {
        config.reference_path = reference;
    }
    if let Some(out) = cli.visualize {
        config.visualization.output = Some(out);
    }

    if let Err(e) = init_thread_pool(config.orb.n_threads) {
        debug!("keeping existing thread pool: {}", e);
    }

    let engine = OrbSimilarity::new(config.clone())?;
    let comparison = engine.compare_paths(&cli.candidate, &config.reference_path)?;

    let hu = if cli.hu {
        Some(hu_moments(&cli.candidate, &config.hu)?)
    } else {
        None
    };

    if let Some(out) = &config.visualization.output {
        save_matches(&comparison, out, config.visualization.max_matches)?;
    }

    println!("ORB similarity: {:.4}", comparison.report.score);
    if let Some(hu) = hu {
        let values: Vec<String> = hu.iter().map(|v| format!("{:.6}", v)).collect();
        println!("Hu moments: [{}]", values.join(", "));
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
