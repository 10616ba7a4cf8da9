//! In-process LDA by collapsed Gibbs sampling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tethne_common::{Result, TethneError, Value};
use tethne_config::LdaConfig;
use tethne_corpus::{Corpus, Feature, FeatureSet};
use tracing::{debug, info, instrument, warn};

use super::LdaModel;
use crate::manager::{ConvergenceLog, ModelManager};

#[derive(Debug, Clone, PartialEq)]
pub struct GibbsParams {
    pub num_topics: usize,
    pub iterations: usize,
    /// Symmetric document-topic prior.
    pub alpha: f64,
    /// Symmetric topic-word prior.
    pub beta: f64,
    pub seed: u64,
    /// Log-likelihood is recorded every this many iterations.
    pub ll_interval: usize,
}

impl Default for GibbsParams {
    fn default() -> Self {
        Self::from(&LdaConfig::default())
    }
}

impl From<&LdaConfig> for GibbsParams {
    fn from(config: &LdaConfig) -> Self {
        Self {
            num_topics: config.num_topics,
            iterations: config.iterations,
            alpha: config.alpha,
            beta: config.beta,
            seed: config.seed,
            ll_interval: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct Sampler {
    params: GibbsParams,
    /// Topic of every token.
    z: Vec<Vec<usize>>,
    doc_topic: Vec<Vec<usize>>,
    topic_word: Vec<Vec<usize>>,
    topic_total: Vec<usize>,
}

impl Sampler {
    fn new(docs: &[Vec<usize>], vocab: usize, params: &GibbsParams, rng: &mut StdRng) -> Self {
        let k = params.num_topics;
        let mut sampler = Self {
            params: params.clone(),
            z: Vec::with_capacity(docs.len()),
            doc_topic: vec![vec![0; k]; docs.len()],
            topic_word: vec![vec![0; vocab]; k],
            topic_total: vec![0; k],
        };
        for (d, words) in docs.iter().enumerate() {
            let topics: Vec<usize> = words.iter().map(|_| rng.gen_range(0..k)).collect();
            for (&w, &t) in words.iter().zip(&topics) {
                sampler.doc_topic[d][t] += 1;
                sampler.topic_word[t][w] += 1;
                sampler.topic_total[t] += 1;
            }
            sampler.z.push(topics);
        }
        sampler
    }

    fn sweep(&mut self, docs: &[Vec<usize>], rng: &mut StdRng, weights: &mut [f64]) {
        let vocab = self.topic_word.first().map_or(0, Vec::len) as f64;
        let (alpha, beta) = (self.params.alpha, self.params.beta);
        for (d, words) in docs.iter().enumerate() {
            for (i, &w) in words.iter().enumerate() {
                let old = self.z[d][i];
                self.doc_topic[d][old] -= 1;
                self.topic_word[old][w] -= 1;
                self.topic_total[old] -= 1;

                let mut total = 0.0;
                for (t, weight) in weights.iter_mut().enumerate() {
                    *weight = (self.doc_topic[d][t] as f64 + alpha) * (self.topic_word[t][w] as f64 + beta)
                        / (self.topic_total[t] as f64 + vocab * beta);
                    total += *weight;
                }
                let mut u = rng.gen::<f64>() * total;
                let mut new = weights.len() - 1;
                for (t, weight) in weights.iter().enumerate() {
                    if u < *weight {
                        new = t;
                        break;
                    }
                    u -= weight;
                }

                self.z[d][i] = new;
                self.doc_topic[d][new] += 1;
                self.topic_word[new][w] += 1;
                self.topic_total[new] += 1;
            }
        }
    }

    fn theta(&self, d: usize) -> Vec<f64> {
        let k = self.params.num_topics as f64;
        let n: usize = self.doc_topic[d].iter().sum();
        self.doc_topic[d]
            .iter()
            .map(|&c| (c as f64 + self.params.alpha) / (n as f64 + k * self.params.alpha))
            .collect()
    }

    fn phi(&self, t: usize) -> Vec<f64> {
        let vocab = self.topic_word[t].len() as f64;
        let denominator = self.topic_total[t] as f64 + vocab * self.params.beta;
        self.topic_word[t]
            .iter()
            .map(|&c| (c as f64 + self.params.beta) / denominator)
            .collect()
    }

    /// Mean log probability of the tokens under the current estimates.
    fn log_likelihood_per_token(&self, docs: &[Vec<usize>]) -> f64 {
        let phis: Vec<Vec<f64>> = (0..self.params.num_topics).map(|t| self.phi(t)).collect();
        let mut total = 0.0;
        let mut tokens = 0usize;
        for (d, words) in docs.iter().enumerate() {
            let theta = self.theta(d);
            for &w in words {
                let p: f64 = theta.iter().zip(&phis).map(|(th, phi)| th * phi[w]).sum();
                total += p.ln();
                tokens += 1;
            }
        }
        if tokens == 0 {
            0.0
        } else {
            total / tokens as f64
        }
    }
}

/// Collapsed Gibbs sampler over one feature set of a corpus.
pub struct GibbsLdaManager {
    input: FeatureSet,
    doc_ids: Vec<String>,
    docs: Vec<Vec<usize>>,
    vocabulary: Vec<Value>,
    sampler: Option<Sampler>,
    log: ConvergenceLog,
}

impl GibbsLdaManager {
    pub fn new(corpus: &Corpus, set_name: &str) -> Result<Self> {
        Ok(Self {
            input: corpus.local_feature_set(set_name)?,
            doc_ids: Vec::new(),
            docs: Vec::new(),
            vocabulary: Vec::new(),
            sampler: None,
            log: ConvergenceLog::default(),
        })
    }
}

#[async_trait]
impl ModelManager for GibbsLdaManager {
    type Params = GibbsParams;
    type Model = LdaModel;

    /// Expand counts into token sequences; documents without tokens are
    /// left out of the model.
    async fn prep(&mut self) -> Result<()> {
        self.vocabulary = self.input.elements().to_vec();
        self.doc_ids.clear();
        self.docs.clear();
        let mut empty = 0usize;
        for (doc, feature) in self.input.iter() {
            let mut words = Vec::new();
            for (element, count) in feature.iter() {
                if let Some(id) = self.input.element_id(element) {
                    words.extend(std::iter::repeat(id).take(count.round() as usize));
                }
            }
            if words.is_empty() {
                empty += 1;
                continue;
            }
            self.doc_ids.push(doc.to_string());
            self.docs.push(words);
        }
        if empty > 0 {
            warn!(empty, "documents without tokens left out of LDA");
        }
        debug!(documents = self.docs.len(), vocabulary = self.vocabulary.len(), "prepared Gibbs input");
        Ok(())
    }

    #[instrument(skip(self), fields(topics = params.num_topics, iterations = params.iterations))]
    async fn fit(&mut self, params: &GibbsParams) -> Result<()> {
        if params.num_topics == 0 {
            return Err(TethneError::Config("LDA needs at least one topic".into()));
        }
        if self.docs.is_empty() {
            self.prep().await?;
        }
        if self.docs.is_empty() {
            return Err(TethneError::Inconsistency("no documents with tokens to model".into()));
        }
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut sampler = Sampler::new(&self.docs, self.vocabulary.len(), params, &mut rng);
        let mut weights = vec![0.0; params.num_topics];
        self.log = ConvergenceLog::default();
        let interval = params.ll_interval.max(1);
        for iteration in 1..=params.iterations {
            sampler.sweep(&self.docs, &mut rng, &mut weights);
            if iteration % interval == 0 || iteration == params.iterations {
                let ll = sampler.log_likelihood_per_token(&self.docs);
                debug!(iteration, ll, "LL/token");
                self.log.record(iteration, ll);
            }
        }
        info!(iterations = params.iterations, "Gibbs sampling finished");
        self.sampler = Some(sampler);
        Ok(())
    }

    fn load(&self) -> Result<LdaModel> {
        let sampler = self
            .sampler
            .as_ref()
            .ok_or_else(|| TethneError::Inconsistency("load called before fit".into()))?;
        let mut theta = FeatureSet::new();
        let mut z = BTreeMap::new();
        for (d, doc) in self.doc_ids.iter().enumerate() {
            let pairs = sampler
                .theta(d)
                .into_iter()
                .enumerate()
                .map(|(t, p)| (Value::Int(t as i64), p));
            theta.add(doc.clone(), Feature::new(pairs)?)?;
            z.insert(doc.clone(), sampler.z[d].clone());
        }
        let mut phi = FeatureSet::new();
        for t in 0..sampler.params.num_topics {
            let pairs = self.vocabulary.iter().cloned().zip(sampler.phi(t));
            phi.add(t.to_string(), Feature::new(pairs)?)?;
        }
        Ok(LdaModel {
            theta,
            phi,
            vocabulary: self.vocabulary.clone(),
            z,
            num_topics: sampler.params.num_topics,
        })
    }

    fn convergence(&self) -> &ConvergenceLog {
        &self.log
    }
}
