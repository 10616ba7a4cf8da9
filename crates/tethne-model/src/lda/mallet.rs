//! LDA through the MALLET command line (`import-file`, `train-topics`).

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tethne_common::{Result, TethneError, Value};
use tethne_config::{LdaConfig, MalletConfig};
use tethne_corpus::{Corpus, Feature, FeatureSet};
use tracing::{debug, info, instrument, warn};

use super::LdaModel;
use crate::manager::{ConvergenceLog, ModelManager, WorkDir};
use crate::process::ExternalProcess;

const CORPUS_FILE: &str = "corpus.txt";
const INPUT_FILE: &str = "input.mallet";
const DOC_TOPICS: &str = "doc_topics.txt";
const WORD_TOPIC_COUNTS: &str = "word_topic_counts.txt";
const TOPIC_KEYS: &str = "topic_keys.txt";
/// Serialized sampler state, kept in the work directory for later reuse.
pub const MODEL_FILE: &str = "model.mallet";
const LL_PATTERN: &str = r"<(\d+)> LL/token: (-?[\d.]+)";

#[derive(Debug, Clone, PartialEq)]
pub struct MalletParams {
    pub num_topics: usize,
    pub iterations: usize,
    /// Per-topic prior; MALLET receives `alpha * num_topics`.
    pub alpha: f64,
    pub beta: f64,
    pub seed: u64,
}

impl From<&LdaConfig> for MalletParams {
    fn from(config: &LdaConfig) -> Self {
        Self {
            num_topics: config.num_topics,
            iterations: config.iterations,
            alpha: config.alpha,
            beta: config.beta,
            seed: config.seed,
        }
    }
}

/// Drives a MALLET installation. Documents are written by row number, so
/// corpus keys containing whitespace survive the round trip.
pub struct MalletManager {
    mallet: PathBuf,
    remove_stopwords: bool,
    input: FeatureSet,
    doc_ids: Vec<String>,
    tokens: HashMap<String, Value>,
    workdir: WorkDir,
    fitted: Option<MalletParams>,
    log: ConvergenceLog,
}

impl MalletManager {
    pub fn new(corpus: &Corpus, set_name: &str, config: &MalletConfig) -> Result<Self> {
        Ok(Self {
            mallet: config.path.clone(),
            remove_stopwords: config.remove_stopwords,
            input: corpus.local_feature_set(set_name)?,
            doc_ids: Vec::new(),
            tokens: HashMap::new(),
            workdir: WorkDir::new("tethne-mallet")?,
            fitted: None,
            log: ConvergenceLog::default(),
        })
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// MALLET splits on whitespace; elements are written with `_` instead.
    fn token(element: &Value) -> String {
        element.to_string().split_whitespace().collect::<Vec<_>>().join("_")
    }

    async fn run(&mut self, process: ExternalProcess) -> Result<Vec<Vec<String>>> {
        match process.run(self.workdir.path()).await {
            Ok(matches) => Ok(matches),
            Err(err) => {
                self.workdir.keep();
                Err(err)
            }
        }
    }

    fn require(&self, name: &str) -> Result<PathBuf> {
        let path = self.workdir.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(TethneError::MissingOutput { path })
        }
    }
}

#[async_trait]
impl ModelManager for MalletManager {
    type Params = MalletParams;
    type Model = LdaModel;

    /// Write `corpus.txt` (one `row label tokens` line per document) and
    /// import it.
    async fn prep(&mut self) -> Result<()> {
        let mut text = String::new();
        self.doc_ids.clear();
        self.tokens.clear();
        for (doc, feature) in self.input.iter() {
            let mut words = Vec::new();
            for (element, count) in feature.iter() {
                let token = Self::token(element);
                self.tokens.entry(token.clone()).or_insert_with(|| element.clone());
                for _ in 0..count.round() as usize {
                    words.push(token.clone());
                }
            }
            let _ = writeln!(text, "{}\tx\t{}", self.doc_ids.len(), words.join(" "));
            self.doc_ids.push(doc.to_string());
        }
        tokio::fs::write(self.workdir.join(CORPUS_FILE), text).await?;

        let mut import = ExternalProcess::new(&self.mallet)
            .arg("import-file")
            .args(["--input", CORPUS_FILE, "--output", INPUT_FILE, "--keep-sequence"])
            .args(["--token-regex", r"\S+"]);
        if self.remove_stopwords {
            import = import.arg("--remove-stopwords");
        }
        self.run(import).await?;
        debug!(documents = self.doc_ids.len(), "imported corpus into MALLET");
        Ok(())
    }

    #[instrument(skip(self), fields(topics = params.num_topics, iterations = params.iterations))]
    async fn fit(&mut self, params: &MalletParams) -> Result<()> {
        if !self.workdir.join(INPUT_FILE).exists() {
            self.prep().await?;
        }
        let progress = Regex::new(LL_PATTERN).map_err(|e| TethneError::Config(e.to_string()))?;
        let train = ExternalProcess::new(&self.mallet)
            .args(train_topics_args(params))
            .progress(progress);
        let matches = self.run(train).await?;

        self.log = ConvergenceLog::default();
        for groups in matches {
            if let (Some(Ok(iteration)), Some(Ok(ll))) = (
                groups.first().map(|s| s.parse::<usize>()),
                groups.get(1).map(|s| s.parse::<f64>()),
            ) {
                self.log.record(iteration, ll);
            }
        }
        self.log.iterations = self.log.iterations.max(params.iterations);
        info!(ll_points = self.log.log_likelihood.len(), "MALLET training finished");
        self.fitted = Some(params.clone());
        Ok(())
    }

    fn load(&self) -> Result<LdaModel> {
        let params = self
            .fitted
            .as_ref()
            .ok_or_else(|| TethneError::Inconsistency("load called before fit".into()))?;
        let doc_topics_path = self.require(DOC_TOPICS)?;
        let counts_path = self.require(WORD_TOPIC_COUNTS)?;

        let text = std::fs::read_to_string(&doc_topics_path)?;
        let mut theta = FeatureSet::new();
        for (row, shares) in parse_doc_topics(&text, params.num_topics, &doc_topics_path)? {
            let Some(doc) = self.doc_ids.get(row) else {
                return Err(TethneError::input_format(&doc_topics_path, None, format!("unknown document row {row}")));
            };
            let pairs = shares.into_iter().map(|(k, p)| (Value::Int(k as i64), p));
            theta.add(doc.clone(), Feature::new(pairs)?.normalized())?;
        }

        let text = std::fs::read_to_string(&counts_path)?;
        let mut topics: BTreeMap<usize, Vec<(Value, f64)>> = BTreeMap::new();
        for (word, per_topic) in parse_word_topic_counts(&text, &counts_path)? {
            let element = self.tokens.get(&word).cloned().unwrap_or(Value::Text(word));
            for (k, count) in per_topic {
                if k >= params.num_topics {
                    return Err(TethneError::input_format(&counts_path, None, format!("topic {k} out of range")));
                }
                topics.entry(k).or_default().push((element.clone(), count));
            }
        }
        let mut phi = FeatureSet::new();
        for k in 0..params.num_topics {
            match topics.remove(&k) {
                Some(pairs) => phi.add(k.to_string(), Feature::new(pairs)?.normalized())?,
                None => warn!(topic = k, "topic has no word counts"),
            }
        }

        Ok(LdaModel {
            theta,
            phi,
            vocabulary: self.input.elements().to_vec(),
            z: BTreeMap::new(),
            num_topics: params.num_topics,
        })
    }

    fn convergence(&self) -> &ConvergenceLog {
        &self.log
    }
}

/// Command line for `mallet train-topics`, relative to the work directory.
pub fn train_topics_args(params: &MalletParams) -> Vec<String> {
    let mut args = vec!["train-topics".to_string()];
    let mut push = |flag: &str, value: String| {
        args.push(flag.to_string());
        args.push(value);
    };
    push("--input", INPUT_FILE.into());
    push("--num-topics", params.num_topics.to_string());
    push("--num-iterations", params.iterations.to_string());
    push("--alpha", (params.alpha * params.num_topics as f64).to_string());
    push("--beta", params.beta.to_string());
    push("--random-seed", params.seed.to_string());
    push("--output-model", MODEL_FILE.into());
    push("--output-doc-topics", DOC_TOPICS.into());
    push("--word-topic-counts-file", WORD_TOPIC_COUNTS.into());
    push("--output-topic-keys", TOPIC_KEYS.into());
    args
}

/// `(row, [(topic, share)])` per document of a `--output-doc-topics` file.
///
/// Reads both layouts MALLET has produced: `doc name topic share ...`
/// pairs (announced by a `#doc name topic proportion` header) and one dense
/// column per topic. The row is the instance name when numeric, otherwise
/// the leading document number.
pub fn parse_doc_topics(text: &str, num_topics: usize, path: &Path) -> Result<Vec<(usize, Vec<(usize, f64)>)>> {
    let paired = text.lines().next().is_some_and(|l| l.starts_with("#doc name topic"));
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = Some(i + 1);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(TethneError::input_format(path, line_no, "expected document number and name"));
        }
        let number: usize = fields[0]
            .parse()
            .map_err(|_| TethneError::input_format(path, line_no, format!("bad document number {}", fields[0])))?;
        let row = fields[1].parse().unwrap_or(number);
        let rest = &fields[2..];
        let number_at = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| TethneError::input_format(path, line_no, format!("bad number {s}")))
        };

        let mut shares = Vec::with_capacity(num_topics);
        if !paired && rest.len() == num_topics {
            for (k, s) in rest.iter().enumerate() {
                shares.push((k, number_at(s)?));
            }
        } else {
            if rest.len() % 2 != 0 {
                return Err(TethneError::input_format(path, line_no, "unpaired topic/proportion columns"));
            }
            for pair in rest.chunks(2) {
                let k = number_at(pair[0])? as usize;
                if k >= num_topics {
                    return Err(TethneError::input_format(path, line_no, format!("topic {k} out of range")));
                }
                shares.push((k, number_at(pair[1])?));
            }
        }
        rows.push((row, shares));
    }
    Ok(rows)
}

/// `(word, [(topic, count)])` per line of a `--word-topic-counts-file`.
pub fn parse_word_topic_counts(text: &str, path: &Path) -> Result<Vec<(String, Vec<(usize, f64)>)>> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let (Some(_), Some(word)) = (fields.next(), fields.next()) else {
            continue;
        };
        let mut counts = Vec::new();
        for field in fields {
            let parsed = field
                .split_once(':')
                .and_then(|(k, c)| Some((k.parse::<usize>().ok()?, c.parse::<f64>().ok()?)));
            match parsed {
                Some(pair) => counts.push(pair),
                None => return Err(TethneError::input_format(path, Some(i + 1), format!("bad topic:count {field}"))),
            }
        }
        out.push((word.to_string(), counts));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_doc_topics() {
        let text = "#doc name topic proportion ...\n0\t0\t1\t0.75\t0\t0.25\n1\t1\t0\t1.0\n";
        let rows = parse_doc_topics(text, 2, Path::new("doc_topics.txt")).unwrap();
        assert_eq!(rows[0], (0, vec![(1, 0.75), (0, 0.25)]));
        assert_eq!(rows[1], (1, vec![(0, 1.0)]));
    }

    #[test]
    fn test_dense_doc_topics() {
        let text = "0\t0\t0.1\t0.2\t0.7\n1\t1\t0.3\t0.3\t0.4\n";
        let rows = parse_doc_topics(text, 3, Path::new("doc_topics.txt")).unwrap();
        assert_eq!(rows[1], (1, vec![(0, 0.3), (1, 0.3), (2, 0.4)]));
    }

    #[test]
    fn test_bad_doc_topics_line_is_reported() {
        let text = "0\t0\t0.1\t0.9\n1\t1\t0.5\tnope\n";
        let err = parse_doc_topics(text, 2, Path::new("doc_topics.txt")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_word_topic_counts() {
        let text = "0 gene 0:12 3:1\n1 fossil_record 2:5\n";
        let rows = parse_word_topic_counts(text, Path::new("wtc.txt")).unwrap();
        assert_eq!(rows[1], ("fossil_record".to_string(), vec![(2, 5.0)]));
        assert_eq!(rows[0].1.len(), 2);
    }

    #[test]
    fn test_train_topics_keeps_model_state() {
        let params = MalletParams {
            num_topics: 4,
            iterations: 50,
            alpha: 0.25,
            beta: 0.01,
            seed: 7,
        };
        let args = train_topics_args(&params);
        assert_eq!(args[0], "train-topics");
        let model = args.iter().position(|a| a == "--output-model").unwrap();
        assert_eq!(args[model + 1], MODEL_FILE);
        let alpha = args.iter().position(|a| a == "--alpha").unwrap();
        assert_eq!(args[alpha + 1], "1");
    }

    #[test]
    fn test_multiword_elements_become_single_tokens() {
        assert_eq!(MalletManager::token(&Value::from("fossil  record")), "fossil_record");
    }
}
