//! cdiv - community diversity analysis CLI
//!
//! Command-line interface for the composable diversity pipeline.

use clap::{Parser, Subcommand, ValueEnum};
use composable_diversity::data::{write_diversity_tsv, AbundanceMatrix, CommunityDataset, Metadata, Taxonomy};
use composable_diversity::diversity::{estimate, AlphaIndex};
use composable_diversity::error::{DivError, Result};
use composable_diversity::pipeline::{DiversityPipeline, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CLI-friendly alpha index selection
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliIndex {
    Observed,
    Chao1,
    Shannon,
    Simpson,
    InvSimpson,
    Pielou,
}

impl From<CliIndex> for AlphaIndex {
    fn from(index: CliIndex) -> Self {
        match index {
            CliIndex::Observed => AlphaIndex::Observed,
            CliIndex::Chao1 => AlphaIndex::Chao1,
            CliIndex::Shannon => AlphaIndex::Shannon,
            CliIndex::Simpson => AlphaIndex::Simpson,
            CliIndex::InvSimpson => AlphaIndex::InverseSimpson,
            CliIndex::Pielou => AlphaIndex::Pielou,
        }
    }
}

/// Composable community diversity analysis
#[derive(Parser)]
#[command(name = "cdiv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level filter (e.g. "info", "debug", "composable_diversity=trace")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(long)]
        config: PathBuf,

        /// Path to abundance table TSV (taxa x samples)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Path to taxonomy TSV
        #[arg(short, long)]
        taxonomy: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Output directory for result tables
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Re-run the analysis from the filtered dataset snapshot
    Resume {
        /// Path to pipeline configuration YAML (must set snapshot_dir)
        #[arg(long)]
        config: PathBuf,

        /// Output directory for result tables
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Estimate alpha diversity only
    Alpha {
        /// Path to abundance table TSV (taxa x samples)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Path to taxonomy TSV
        #[arg(short, long)]
        taxonomy: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Indices to compute (repeatable; defaults to Observed, Shannon, Simpson)
        #[arg(short, long, value_enum)]
        index: Vec<CliIndex>,

        /// Output path for the long-format TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example pipeline configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "diversity.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            abundance,
            taxonomy,
            metadata,
            output,
        } => cmd_run(&config, &abundance, &taxonomy, &metadata, &output),

        Commands::Resume { config, output } => cmd_resume(&config, &output),

        Commands::Alpha {
            abundance,
            taxonomy,
            metadata,
            index,
            output,
        } => cmd_alpha(&abundance, &taxonomy, &metadata, &index, &output),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &PathBuf) -> Result<PipelineConfig> {
    eprintln!("Loading pipeline configuration from {:?}...", path);
    let yaml = std::fs::read_to_string(path)?;
    PipelineConfig::from_yaml(&yaml)
}

fn load_dataset(abundance: &PathBuf, taxonomy: &PathBuf, metadata: &PathBuf) -> Result<CommunityDataset> {
    eprintln!("Loading data...");
    let abundance = AbundanceMatrix::from_tsv(abundance)?;
    let taxonomy = Taxonomy::from_tsv(taxonomy)?;
    let metadata = Metadata::from_tsv(metadata)?;
    let dataset = CommunityDataset::build(abundance, taxonomy, metadata)?;
    eprintln!(
        "Loaded {} taxa x {} samples",
        dataset.n_taxa(),
        dataset.n_samples()
    );
    Ok(dataset)
}

/// Run the full pipeline
fn cmd_run(
    config_path: &PathBuf,
    abundance_path: &PathBuf,
    taxonomy_path: &PathBuf,
    metadata_path: &PathBuf,
    output_dir: &PathBuf,
) -> Result<()> {
    let config = load_config(config_path)?;
    let dataset = load_dataset(abundance_path, taxonomy_path, metadata_path)?;

    eprintln!("Running pipeline '{}'...", config.name);
    let report = DiversityPipeline::from_config(&config).run(&dataset)?;

    eprintln!("Writing results to {:?}...", output_dir);
    report.write_to(output_dir)?;
    eprintln!("{}", report);
    Ok(())
}

/// Resume from the filtered snapshot
fn cmd_resume(config_path: &PathBuf, output_dir: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(dir) = &config.snapshot_dir else {
        return Err(DivError::InvalidParameter(
            "Configuration has no snapshot_dir to resume from".into(),
        ));
    };

    eprintln!("Resuming pipeline '{}' from {:?}...", config.name, dir);
    let report = DiversityPipeline::from_config(&config).resume()?;

    eprintln!("Writing results to {:?}...", output_dir);
    report.write_to(output_dir)?;
    eprintln!("{}", report);
    Ok(())
}

/// Alpha diversity only
fn cmd_alpha(
    abundance_path: &PathBuf,
    taxonomy_path: &PathBuf,
    metadata_path: &PathBuf,
    indices: &[CliIndex],
    output_path: &PathBuf,
) -> Result<()> {
    let dataset = load_dataset(abundance_path, taxonomy_path, metadata_path)?;
    let indices: Vec<AlphaIndex> = if indices.is_empty() {
        AlphaIndex::DEFAULT.to_vec()
    } else {
        indices.iter().map(|&i| i.into()).collect()
    };

    let records = estimate(&dataset, &indices)?;
    write_diversity_tsv(&records, output_path)?;
    eprintln!(
        "Wrote {} values for {} samples to {:?}",
        records.len(),
        dataset.n_samples(),
        output_path
    );
    Ok(())
}

/// Write an example configuration
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let yaml = PipelineConfig::example().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example pipeline to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
