//! Dynamic topic models through Gerrish's `dtm` binary.
//!
//! Input files share the `tethne` prefix in the manager's working
//! directory; the binary writes its results under `out/lda-seq/`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tethne_common::{Result, TethneError, Value};
use tethne_config::DtmConfig;
use tethne_corpus::{Corpus, Feature, FeatureSet, SliceKey, SliceSpec};
use tracing::{debug, info, instrument, warn};

use crate::manager::{ConvergenceLog, ModelManager, WorkDir};
use crate::process::ExternalProcess;

const PREFIX: &str = "tethne";
const OUTPUT_DIR: &str = "out";
const EM_PATTERN: &str = r"EM iter\s+(\d+)";

#[derive(Debug, Clone, PartialEq)]
pub struct DtmParams {
    pub num_topics: usize,
    pub top_chain_var: f64,
    pub alpha: f64,
    pub lda_sequence_min_iter: usize,
    pub lda_sequence_max_iter: usize,
    pub lda_max_em_iter: usize,
}

impl DtmParams {
    pub fn new(num_topics: usize, config: &DtmConfig) -> Self {
        Self {
            num_topics,
            top_chain_var: config.top_chain_var,
            alpha: config.alpha,
            lda_sequence_min_iter: config.lda_sequence_min_iter,
            lda_sequence_max_iter: config.lda_sequence_max_iter,
            lda_max_em_iter: config.lda_max_em_iter,
        }
    }
}

/// A fitted dynamic topic model.
#[derive(Debug, Clone)]
pub struct DtmModel {
    /// `phi[k][t][w]`: probability of word `w` in topic `k` at time `t`.
    pub phi: Vec<Vec<Vec<f64>>>,
    /// Document → `Int(topic)` → probability.
    pub theta: FeatureSet,
    pub vocabulary: Vec<Value>,
    pub times: Vec<SliceKey>,
    /// Document id and the index of its time slice, in file order.
    pub documents: Vec<(String, usize)>,
}

impl DtmModel {
    pub fn num_topics(&self) -> usize {
        self.phi.len()
    }

    fn topic(&self, k: usize) -> Result<&Vec<Vec<f64>>> {
        self.phi
            .get(k)
            .ok_or_else(|| TethneError::NotFound(format!("topic {k} (model has {})", self.phi.len())))
    }

    /// Mean share of topic `k` among the documents of each slice.
    pub fn topic_over_time(&self, k: usize) -> Result<Vec<(SliceKey, f64)>> {
        self.topic(k)?;
        let topic = Value::Int(k as i64);
        let mut sums = vec![(0.0, 0usize); self.times.len()];
        for (doc, t) in &self.documents {
            if let Some(feature) = self.theta.get(doc) {
                sums[*t].0 += feature.get(&topic).unwrap_or(0.0);
                sums[*t].1 += 1;
            }
        }
        Ok(self
            .times
            .iter()
            .zip(sums)
            .map(|(key, (sum, n))| (*key, if n == 0 { 0.0 } else { sum / n as f64 }))
            .collect())
    }

    /// The `n` most probable words of topic `k` at time index `t`.
    pub fn list_topic(&self, k: usize, t: usize, n: usize) -> Result<Vec<(Value, f64)>> {
        let row = self
            .topic(k)?
            .get(t)
            .ok_or_else(|| TethneError::NotFound(format!("time index {t} (model has {})", self.times.len())))?;
        let mut words: Vec<(Value, f64)> = self.vocabulary.iter().cloned().zip(row.iter().copied()).collect();
        words.sort_by(|a, b| b.1.total_cmp(&a.1));
        words.truncate(n);
        Ok(words)
    }

    /// [`list_topic`](Self::list_topic) for every time slice.
    pub fn list_topic_diachronic(&self, k: usize, n: usize) -> Result<Vec<(SliceKey, Vec<(Value, f64)>)>> {
        let mut out = Vec::with_capacity(self.times.len());
        for (t, key) in self.times.iter().enumerate() {
            out.push((*key, self.list_topic(k, t, n)?));
        }
        Ok(out)
    }

    /// Install `theta` on `corpus` as `dtm_theta`, or `{prefix}_theta`.
    pub fn attach(&self, corpus: &mut Corpus, prefix: &str) -> Result<String> {
        let name = if prefix.is_empty() { "dtm_theta".to_string() } else { format!("{prefix}_theta") };
        corpus.add_feature_set(name.clone(), self.theta.clone())?;
        Ok(name)
    }
}

/// Drives a `dtm` binary over a feature set and the slices of its corpus.
///
/// A document belongs to the first slice that contains it. Slices without
/// any featured document are left out of the model.
pub struct DtmManager {
    dtm: PathBuf,
    input: FeatureSet,
    slices: Vec<(SliceKey, Vec<String>)>,
    workdir: WorkDir,
    fitted: Option<DtmParams>,
    log: ConvergenceLog,
}

impl DtmManager {
    pub fn new(corpus: &Corpus, set_name: &str, spec: &SliceSpec, config: &DtmConfig) -> Result<Self> {
        let input = corpus.local_feature_set(set_name)?;
        let mut seen = HashSet::new();
        let mut slices = Vec::new();
        for (key, sub) in corpus.slice(spec)? {
            let mut docs = Vec::new();
            for (doc, _) in sub.entries() {
                let Some(feature) = input.get(doc).filter(|f| !f.is_empty()) else { continue };
                if !seen.insert(doc.to_string()) {
                    continue;
                }
                if word_counts(&input, feature).is_empty() {
                    warn!(document = %doc, "skipping document whose counts round to zero");
                    continue;
                }
                docs.push(doc.to_string());
            }
            if docs.is_empty() {
                warn!(slice = %key, "skipping slice without documents");
                continue;
            }
            slices.push((key, docs));
        }
        if slices.is_empty() {
            return Err(TethneError::Inconsistency(format!("feature set {set_name} has no documents to model")));
        }
        Ok(Self {
            dtm: config.path.clone(),
            input,
            slices,
            workdir: WorkDir::new("tethne-dtm")?,
            fitted: None,
            log: ConvergenceLog::default(),
        })
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    pub fn times(&self) -> Vec<SliceKey> {
        self.slices.iter().map(|(key, _)| *key).collect()
    }

    fn input_file(&self, suffix: &str) -> PathBuf {
        self.workdir.join(&format!("{PREFIX}-{suffix}.dat"))
    }

    fn output_file(&self, name: &str) -> Result<PathBuf> {
        let path = self.workdir.path().join(OUTPUT_DIR).join("lda-seq").join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(TethneError::MissingOutput { path })
        }
    }

    fn documents(&self) -> Vec<(String, usize)> {
        self.slices
            .iter()
            .enumerate()
            .flat_map(|(t, (_, docs))| docs.iter().map(move |d| (d.clone(), t)))
            .collect()
    }
}

/// `(word id, count)` pairs of one `-mult.dat` line. DTM reads integer
/// counts, so fractional weights are rounded and zeros dropped.
fn word_counts(input: &FeatureSet, feature: &Feature) -> Vec<(usize, u64)> {
    let mut pairs: Vec<(usize, u64)> = feature
        .iter()
        .filter_map(|(element, count)| input.element_id(element).map(|id| (id, count.round() as u64)))
        .filter(|(_, count)| *count > 0)
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Whitespace-separated floats of a DTM output file.
fn read_floats(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)?;
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| {
                TethneError::input_format(path, Some(line_no + 1), format!("not a number: {token}"))
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

fn expect_len(path: &Path, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(TethneError::input_format(
            path,
            None,
            format!("expected {expected} values, found {}", values.len()),
        ));
    }
    Ok(())
}

/// Exponentiate a flat `(W, T)` log-probability array into `[t][w]`,
/// renormalised per time slice.
pub fn parse_topic_log_probs(values: &[f64], words: usize, times: usize) -> Vec<Vec<f64>> {
    let mut by_time = vec![vec![0.0; words]; times];
    for w in 0..words {
        for (t, row) in by_time.iter_mut().enumerate() {
            row[w] = values[w * times + t].exp();
        }
    }
    for row in &mut by_time {
        let total: f64 = row.iter().sum();
        if total > 0.0 {
            row.iter_mut().for_each(|p| *p /= total);
        }
    }
    by_time
}

#[async_trait]
impl ModelManager for DtmManager {
    type Params = DtmParams;
    type Model = DtmModel;

    /// Write the `-mult`, `-seq`, `-vocab` and `-meta` files.
    async fn prep(&mut self) -> Result<()> {
        let mut mult = String::new();
        let mut meta = String::from("id\trow\tslice\n");
        let mut row = 0usize;
        for (key, docs) in &self.slices {
            for doc in docs {
                let Some(feature) = self.input.get(doc) else { continue };
                let pairs = word_counts(&self.input, feature);
                let _ = write!(mult, "{}", pairs.len());
                for (id, count) in pairs {
                    let _ = write!(mult, " {id}:{count}");
                }
                mult.push('\n');
                let _ = writeln!(meta, "{doc}\t{row}\t{key}");
                row += 1;
            }
        }
        let mut seq = format!("{}\n", self.slices.len());
        for (_, docs) in &self.slices {
            let _ = writeln!(seq, "{}", docs.len());
        }
        let vocab: String = self.input.elements().iter().map(|e| format!("{e}\n")).collect();

        tokio::fs::write(self.input_file("mult"), mult).await?;
        tokio::fs::write(self.input_file("seq"), seq).await?;
        tokio::fs::write(self.input_file("vocab"), vocab).await?;
        tokio::fs::write(self.input_file("meta"), meta).await?;
        debug!(documents = row, slices = self.slices.len(), "wrote DTM corpus");
        Ok(())
    }

    #[instrument(skip(self), fields(topics = params.num_topics))]
    async fn fit(&mut self, params: &DtmParams) -> Result<()> {
        if !self.input_file("mult").exists() {
            self.prep().await?;
        }
        let progress = Regex::new(EM_PATTERN).map_err(|e| TethneError::Config(e.to_string()))?;
        let process = ExternalProcess::new(&self.dtm)
            .arg(format!("--ntopics={}", params.num_topics))
            .args(["--mode=fit", "--rng_seed=0", "--initialize_lda=true"])
            .arg(format!("--corpus_prefix={PREFIX}"))
            .arg(format!("--outname={OUTPUT_DIR}"))
            .arg(format!("--top_chain_var={}", params.top_chain_var))
            .arg(format!("--alpha={}", params.alpha))
            .arg(format!("--lda_sequence_min_iter={}", params.lda_sequence_min_iter))
            .arg(format!("--lda_sequence_max_iter={}", params.lda_sequence_max_iter))
            .arg(format!("--lda_max_em_iter={}", params.lda_max_em_iter))
            .progress(progress);
        let matches = match process.run(self.workdir.path()).await {
            Ok(matches) => matches,
            Err(err) => {
                self.workdir.keep();
                return Err(err);
            }
        };

        self.log = ConvergenceLog::default();
        self.log.iterations = matches
            .iter()
            .filter_map(|groups| groups.first()?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        info!(em_iterations = self.log.iterations, "DTM finished");
        self.fitted = Some(params.clone());
        Ok(())
    }

    fn load(&self) -> Result<DtmModel> {
        let params = self
            .fitted
            .as_ref()
            .ok_or_else(|| TethneError::Inconsistency("DTM manager has not been fitted".into()))?;
        self.load_topics(params.num_topics)
    }

    fn convergence(&self) -> &ConvergenceLog {
        &self.log
    }
}

impl DtmManager {
    /// Parse the output files of a `num_topics` run.
    pub fn load_topics(&self, num_topics: usize) -> Result<DtmModel> {
        let words = self.input.vocabulary_len();
        let times = self.slices.len();
        let mut phi = Vec::with_capacity(num_topics);
        for k in 0..num_topics {
            let path = self.output_file(&format!("topic-{k:03}-var-e-log-prob.dat"))?;
            let values = read_floats(&path)?;
            expect_len(&path, &values, words * times)?;
            phi.push(parse_topic_log_probs(&values, words, times));
        }

        let documents = self.documents();
        let path = self.output_file("gam.dat")?;
        let gamma = read_floats(&path)?;
        expect_len(&path, &gamma, documents.len() * num_topics)?;
        let mut theta = FeatureSet::new();
        for (row, (doc, _)) in documents.iter().enumerate() {
            let weights = &gamma[row * num_topics..(row + 1) * num_topics];
            if weights.iter().sum::<f64>() <= 0.0 {
                warn!(document = %doc, "skipping zero gamma row");
                continue;
            }
            let feature = Feature::new(weights.iter().enumerate().map(|(k, &w)| (Value::Int(k as i64), w)))?;
            theta.add(doc.clone(), feature.normalized())?;
        }

        debug!(topics = num_topics, words, times, documents = theta.len(), "loaded DTM output");
        Ok(DtmModel {
            phi,
            theta,
            vocabulary: self.input.elements().to_vec(),
            times: self.times(),
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_common::Field;
    use tethne_corpus::WordTokenizer;
    use tethne_test_utils::{assert_close, paper};

    fn corpus() -> Corpus {
        let docs = [(2000, "gene gene cell"), (2000, "cell fossil"), (2002, "fossil record")];
        let papers = docs
            .iter()
            .enumerate()
            .map(|(i, (year, title))| {
                let mut p = paper(&[(["ALPHA", "BETA", "GAMMA"][i], "A")], *year, "J");
                p.atitle = Some(title.to_string());
                p
            })
            .collect();
        let mut corpus = Corpus::new(papers).unwrap();
        corpus.index_feature(&Field::Atitle, &WordTokenizer::new().unwrap(), false).unwrap();
        corpus
    }

    fn manager(corpus: &Corpus) -> DtmManager {
        DtmManager::new(corpus, "atitle", &SliceSpec::yearly(), &DtmConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_prep_writes_gerrish_corpus() {
        let corpus = corpus();
        let mut manager = manager(&corpus);
        // 2001 has no papers.
        assert_eq!(manager.times(), vec![SliceKey::Point(2000), SliceKey::Point(2002)]);
        manager.prep().await.unwrap();

        let seq = std::fs::read_to_string(manager.workdir().join("tethne-seq.dat")).unwrap();
        assert_eq!(seq, "2\n2\n1\n");
        let mult = std::fs::read_to_string(manager.workdir().join("tethne-mult.dat")).unwrap();
        let first = mult.lines().next().unwrap();
        assert!(first.starts_with("2 "));
        assert!(first.contains(":2"));
        let meta = std::fs::read_to_string(manager.workdir().join("tethne-meta.dat")).unwrap();
        assert_eq!(meta.lines().count(), 4);
        assert!(meta.lines().nth(3).unwrap().ends_with("\t2\t2002"));
        let vocab = std::fs::read_to_string(manager.workdir().join("tethne-vocab.dat")).unwrap();
        assert_eq!(vocab.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_documents_rounding_to_zero_are_skipped() {
        let mut corpus = corpus();
        let keys: Vec<String> = corpus.entries().map(|(k, _)| k.to_string()).collect();
        let word = |w: &str| Value::from(w);
        let weighted = FeatureSet::from_features([
            (keys[0].clone(), Feature::new([(word("gene"), 2.0), (word("cell"), 1.0)]).unwrap()),
            (keys[1].clone(), Feature::new([(word("cell"), 0.2), (word("fossil"), 0.3)]).unwrap()),
            (keys[2].clone(), Feature::new([(word("fossil"), 1.0), (word("record"), 1.0)]).unwrap()),
        ])
        .unwrap();
        corpus.add_feature_set("weighted", weighted).unwrap();

        let mut manager = DtmManager::new(&corpus, "weighted", &SliceSpec::yearly(), &DtmConfig::default()).unwrap();
        assert_eq!(manager.documents().len(), 2);
        manager.prep().await.unwrap();

        let seq = std::fs::read_to_string(manager.workdir().join("tethne-seq.dat")).unwrap();
        assert_eq!(seq, "2\n1\n1\n");
        let mult = std::fs::read_to_string(manager.workdir().join("tethne-mult.dat")).unwrap();
        assert_eq!(mult.lines().count(), 2);
        assert!(mult.lines().all(|line| !line.starts_with("0")));
    }

    #[test]
    fn test_log_probs_are_normalised_per_time() {
        // Two words, two times, laid out word-major.
        let values = [0.5f64.ln(), 0.2f64.ln(), 0.5f64.ln(), 0.6f64.ln()];
        let by_time = parse_topic_log_probs(&values, 2, 2);
        assert_close(by_time[0][0], 0.5, 1e-12);
        assert_close(by_time[1][0], 0.25, 1e-12);
        assert_close(by_time[1][1], 0.75, 1e-12);
    }

    #[test]
    fn test_load_parses_outputs() {
        let corpus = corpus();
        let manager = manager(&corpus);
        let dir = manager.workdir().join("out").join("lda-seq");
        std::fs::create_dir_all(&dir).unwrap();
        let words = manager.input.vocabulary_len();
        for k in 0..2 {
            let lines: String = (0..words * 2).map(|i| format!("{}\n", -((i + k + 1) as f64))).collect();
            std::fs::write(dir.join(format!("topic-{k:03}-var-e-log-prob.dat")), lines).unwrap();
        }
        std::fs::write(dir.join("gam.dat"), "3\n1\n0\n0\n2\n2\n").unwrap();

        let model = manager.load_topics(2).unwrap();
        assert_eq!(model.num_topics(), 2);
        for topic in &model.phi {
            for row in topic {
                assert_close(row.iter().sum(), 1.0, 1e-9);
            }
        }
        // The zero row is skipped.
        assert_eq!(model.theta.len(), 2);
        for (_, feature) in model.theta.iter() {
            assert_close(feature.total(), 1.0, 1e-9);
        }
        let over_time = model.topic_over_time(0).unwrap();
        assert_close(over_time[0].1, 0.75, 1e-12);
        assert_close(over_time[1].1, 0.5, 1e-12);
        assert_eq!(model.list_topic_diachronic(1, 3).unwrap().len(), 2);
        assert_eq!(model.documents.iter().filter(|(_, t)| *t == 0).count(), 2);
    }

    #[test]
    fn test_missing_output_is_reported() {
        let corpus = corpus();
        let manager = manager(&corpus);
        assert!(matches!(manager.load_topics(1), Err(TethneError::MissingOutput { .. })));
    }
}
