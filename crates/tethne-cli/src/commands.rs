use std::path::Path;

use anyhow::Context;
use petgraph::EdgeType;
use tethne_common::Field;
use tethne_config::{CorpusConfig, TethneConfig};
use tethne_corpus::{Corpus, Ranking, SliceSpec, WordTokenizer};
use tethne_graph::builders::{
    bibliographic_coupling, coauthors, cocitation, direct_citation, term_cooccurrence, CitationOptions,
    CoauthorOptions, CocitationOptions, CooccurrenceOptions, CouplingOptions,
};
use tethne_graph::{write_gexf, write_graphml, write_sif, write_xgmml_dynamic, GraphCollection, Network};
use tethne_ingestion::{
    CsvReader, DfrReader, PlainTextReader, PubMedReader, ReadOptions, Reader, ScopusReader, WosReader,
};
use tethne_model::{
    author_theta, GibbsLdaManager, GibbsParams, LdaModel, MalletManager, MalletParams, ModelManager, TapManager,
    TapParams, TapStatus,
};
use tracing::{info, warn};

use crate::{Backend, Format, GraphKind, Input, Writer};

fn reader(format: Format) -> anyhow::Result<Box<dyn Reader>> {
    Ok(match format {
        Format::Wos => Box::new(WosReader::new()?),
        Format::Dfr => Box::new(DfrReader::new()),
        Format::Csv => Box::new(CsvReader::new()),
        Format::Scopus => Box::new(ScopusReader::new()?),
        Format::Pubmed => Box::new(PubMedReader::new()),
        Format::Plaintext => Box::new(PlainTextReader::new()?),
    })
}

fn fields(names: &[String]) -> anyhow::Result<Vec<Field>> {
    names
        .iter()
        .map(|name| name.parse::<Field>().with_context(|| format!("unknown field {name}")))
        .collect()
}

fn read_options(config: &CorpusConfig) -> anyhow::Result<ReadOptions> {
    Ok(ReadOptions {
        index_by: config.index_by.parse().context("corpus.index_by")?,
        parse_only: None,
        index_fields: fields(&config.index_fields)?,
        index_features: fields(&config.index_features)?,
    })
}

fn read_corpus(config: &TethneConfig, input: &Input) -> anyhow::Result<Corpus> {
    let corpus = reader(input.format)?
        .read_corpus(&input.input, &read_options(&config.corpus)?)
        .with_context(|| format!("reading {}", input.input.display()))?;
    info!(papers = corpus.len(), path = %input.input.display(), "read corpus");
    Ok(corpus)
}

/// Tokenize `name` into a feature set unless the reader already did.
fn ensure_feature(corpus: &mut Corpus, name: &str) -> anyhow::Result<()> {
    if corpus.feature_set(name).is_some() {
        return Ok(());
    }
    let field: Field = name.parse().with_context(|| format!("no feature set or field named {name}"))?;
    corpus.index_feature(&field, &WordTokenizer::new()?, false)?;
    Ok(())
}

pub fn summarize(config: &TethneConfig, input: &Input, top: usize) -> anyhow::Result<()> {
    let corpus = read_corpus(config, input)?;
    println!("papers: {}", corpus.len());
    let duplicates: usize = corpus.duplicate_papers().values().sum();
    if duplicates > 0 {
        println!("duplicates: {duplicates}");
    }
    for (key, count) in corpus.distribution(&SliceSpec::yearly())? {
        if count > 0 {
            println!("{key}\t{count}");
        }
    }
    let names: Vec<String> = corpus.feature_set_names().map(str::to_string).collect();
    for name in names {
        println!("\ntop {name}:");
        for (element, count) in corpus.top_features(&name, top, Ranking::Count)? {
            println!("  {element}\t{count}");
        }
    }
    Ok(())
}

fn write_one<Ty: EdgeType>(net: &Network<Ty>, output: &Path, writer: Writer) -> anyhow::Result<()> {
    match writer {
        Writer::Graphml => write_graphml(net, output)?,
        Writer::Gexf => write_gexf(net, output)?,
        Writer::Sif => {
            let files = write_sif(net, output)?;
            info!(files = files.len(), "wrote SIF with attribute files");
        }
    }
    Ok(())
}

fn emit<Ty, F>(corpus: &Corpus, window: Option<usize>, output: &Path, writer: Writer, build: F) -> anyhow::Result<()>
where
    Ty: EdgeType,
    F: Fn(&Corpus) -> tethne_common::Result<Network<Ty>>,
{
    match window {
        Some(window) => {
            let collection = GraphCollection::build(corpus, &SliceSpec::window(window), &build)?;
            write_xgmml_dynamic(&collection, output)?;
        }
        None => write_one(&build(corpus)?, output, writer)?,
    }
    info!(path = %output.display(), "wrote network");
    Ok(())
}

pub fn graph(
    config: &TethneConfig,
    input: &Input,
    kind: GraphKind,
    output: &Path,
    writer: Writer,
    window: Option<usize>,
    feature: &str,
) -> anyhow::Result<()> {
    let mut corpus = read_corpus(config, input)?;
    match kind {
        GraphKind::Coauthors => emit(&corpus, window, output, writer, |c| coauthors(c, &CoauthorOptions::default())),
        GraphKind::Citations => emit(&corpus, window, output, writer, |c| {
            Ok(direct_citation(c, &CitationOptions::default())?.internal)
        }),
        GraphKind::Coupling => emit(&corpus, window, output, writer, |c| {
            bibliographic_coupling(c, &CouplingOptions::default())
        }),
        GraphKind::Cocitation => emit(&corpus, window, output, writer, |c| cocitation(c, &CocitationOptions::default())),
        GraphKind::Cooccurrence => {
            ensure_feature(&mut corpus, feature)?;
            emit(&corpus, window, output, writer, |c| {
                term_cooccurrence(c, feature, &CooccurrenceOptions::default())
            })
        }
    }
}

async fn fit_gibbs(corpus: &Corpus, feature: &str, params: &GibbsParams) -> anyhow::Result<LdaModel> {
    let mut manager = GibbsLdaManager::new(corpus, feature)?;
    manager.prep().await?;
    manager.fit(params).await?;
    if let Some((iteration, ll)) = manager.convergence().log_likelihood.last() {
        info!(iteration, ll, "final log-likelihood per token");
    }
    Ok(manager.load()?)
}

pub async fn lda(
    config: &TethneConfig,
    input: &Input,
    backend: Backend,
    topics: Option<usize>,
    iterations: Option<usize>,
    feature: &str,
    words: usize,
) -> anyhow::Result<()> {
    let mut corpus = read_corpus(config, input)?;
    ensure_feature(&mut corpus, feature)?;
    let mut lda = config.lda.clone();
    lda.num_topics = topics.unwrap_or(lda.num_topics);
    lda.iterations = iterations.unwrap_or(lda.iterations);

    let model = match backend {
        Backend::Gibbs => fit_gibbs(&corpus, feature, &GibbsParams::from(&lda)).await?,
        Backend::Mallet => {
            let mut manager = MalletManager::new(&corpus, feature, &config.mallet)?;
            manager.prep().await?;
            manager
                .fit(&MalletParams::from(&lda))
                .await
                .with_context(|| format!("MALLET run in {}", manager.workdir().display()))?;
            manager.load()?
        }
    };
    for k in 0..model.num_topics {
        println!("{k:>3}  {}", model.print_topic(k, words)?);
    }
    Ok(())
}

pub async fn tap(
    config: &TethneConfig,
    input: &Input,
    topics: Option<usize>,
    feature: &str,
    window: usize,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let mut corpus = read_corpus(config, input)?;
    ensure_feature(&mut corpus, feature)?;
    let mut params = GibbsParams::from(&config.lda);
    params.num_topics = topics.unwrap_or(params.num_topics);
    let model = fit_gibbs(&corpus, feature, &params).await?;
    let theta = author_theta(&corpus, &model.theta)?;

    let collection = GraphCollection::build(&corpus, &SliceSpec::window(window), |sub| {
        coauthors(sub, &CoauthorOptions::default())
    })?;
    let mut manager = TapManager::new(&collection, theta);
    manager.prep().await?;
    manager.fit(&TapParams::from(&config.tap)).await?;

    std::fs::create_dir_all(output_dir)?;
    for (slice, result) in manager.load()? {
        if result.status == TapStatus::IterationCap {
            warn!(%slice, "TAP did not converge");
        }
        for (topic, graph) in result.mu.iter() {
            let path = output_dir.join(format!("tap_{slice}_topic{topic}.graphml"));
            write_graphml(graph, &path)?;
        }
    }
    info!(dir = %output_dir.display(), slices = collection.len(), "wrote TAP graphs");
    Ok(())
}
