//! Tethne command line: read bibliographic records, build networks and fit
//! topic models.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tethne_config::TethneConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tethne", version, about = "Bibliographic corpus analysis")]
struct Cli {
    /// Configuration file; defaults to $TETHNE_CONFIG, then ./tethne.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Wos,
    Dfr,
    Csv,
    Scopus,
    Pubmed,
    Plaintext,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GraphKind {
    Coauthors,
    Citations,
    Coupling,
    Cocitation,
    Cooccurrence,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Writer {
    Graphml,
    Gexf,
    Sif,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    Gibbs,
    Mallet,
}

#[derive(clap::Args, Debug)]
pub struct Input {
    /// File or directory to read.
    #[arg(long)]
    input: PathBuf,
    #[arg(long, value_enum, default_value_t = Format::Wos)]
    format: Format,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print paper counts, the yearly distribution and the top features.
    Summarize {
        #[command(flatten)]
        input: Input,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Build a network and write it. With `--window`, write one graph per
    /// slice as dynamic XGMML instead.
    Graph {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_enum, default_value_t = GraphKind::Coauthors)]
        kind: GraphKind,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Writer::Graphml)]
        writer: Writer,
        #[arg(long)]
        window: Option<usize>,
        /// Feature set for co-occurrence networks.
        #[arg(long, default_value = "atitle")]
        feature: String,
    },

    /// Fit LDA over a feature set and print the topics.
    Lda {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_enum, default_value_t = Backend::Gibbs)]
        backend: Backend,
        /// Overrides `lda.num_topics`.
        #[arg(long)]
        topics: Option<usize>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long, default_value = "atitle")]
        feature: String,
        #[arg(long, default_value_t = 10)]
        words: usize,
    },

    /// Fit LDA, then topical affinity propagation over yearly co-author
    /// graphs. Writes one GraphML file per slice and topic.
    Tap {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        topics: Option<usize>,
        #[arg(long, default_value = "atitle")]
        feature: String,
        #[arg(long, default_value_t = 1)]
        window: usize,
        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TethneConfig> {
    let config = match path {
        Some(path) => TethneConfig::load_from(path),
        None => TethneConfig::load(),
    };
    config.context("loading configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "tethne starting");

    match cli.command {
        Command::Summarize { input, top } => commands::summarize(&config, &input, top),
        Command::Graph {
            input,
            kind,
            output,
            writer,
            window,
            feature,
        } => commands::graph(&config, &input, kind, &output, writer, window, &feature),
        Command::Lda {
            input,
            backend,
            topics,
            iterations,
            feature,
            words,
        } => commands::lda(&config, &input, backend, topics, iterations, &feature, words).await,
        Command::Tap {
            input,
            topics,
            feature,
            window,
            output_dir,
        } => commands::tap(&config, &input, topics, &feature, window, &output_dir).await,
    }
}
