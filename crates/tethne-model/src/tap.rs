//! Topical affinity propagation over co-authorship graphs.
//!
//! For every topic `k` each author `i` exchanges responsibility (`r`) and
//! availability (`a`) messages with its neighbours and itself. Affinities
//! are the neighbour's share of the topic weighted by the number of shared
//! papers. The result is one directed influence graph per topic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use petgraph::{Directed, Undirected};
use tethne_common::{Result, TethneError, Value};
use tethne_config::TapConfig;
use tethne_corpus::{Corpus, FeatureSet, SliceKey};
use tethne_graph::{Attr, DirectedNetwork, EdgeData, GraphCollection, Network};
use tracing::{debug, info, instrument, warn};

use crate::manager::{ConvergenceLog, ModelManager};

/// Floor for affinities before taking logarithms.
const EPS: f64 = 1e-10;
/// `σ(±30)` is still strictly inside (0, 1) in `f64`.
const LOGIT_BOUND: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TapParams {
    /// λ: share of the previous message kept on every update.
    pub damping: f64,
    pub max_iterations: usize,
    pub stability_window: usize,
    /// Choices within this margin of the maximum keep their previous value.
    pub epsilon: f64,
}

impl Default for TapParams {
    fn default() -> Self {
        Self::from(&TapConfig::default())
    }
}

impl From<&TapConfig> for TapParams {
    fn from(config: &TapConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            stability_window: config.stability_window,
            epsilon: config.epsilon,
        }
    }
}

/// Average each author's topic distribution over their papers, then
/// renormalise. Authors are keyed `"SURNAME INITIAL"`, as in co-author
/// graphs; papers without a `theta` row are ignored.
pub fn author_theta(corpus: &Corpus, theta: &FeatureSet) -> Result<BTreeMap<String, Vec<f64>>> {
    let num_topics = theta
        .elements()
        .iter()
        .filter_map(Value::as_int)
        .max()
        .map(|k| k as usize + 1)
        .ok_or_else(|| TethneError::Inconsistency("theta has no topics".into()))?;

    let mut sums: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (doc, paper) in corpus.entries() {
        let Some(feature) = theta.get(doc) else { continue };
        for author in paper.authors() {
            let row = sums.entry(author).or_insert_with(|| vec![0.0; num_topics]);
            for (topic, p) in feature.iter() {
                if let Some(k) = topic.as_int() {
                    row[k as usize] += p;
                }
            }
        }
    }
    for row in sums.values_mut() {
        let total: f64 = row.iter().sum();
        if total > 0.0 {
            row.iter_mut().for_each(|p| *p /= total);
        }
    }
    debug!(authors = sums.len(), topics = num_topics, "averaged author topic distributions");
    Ok(sums)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapStatus {
    /// Every author's choice held for the whole stability window.
    Converged,
    IterationCap,
}

#[derive(Debug, Clone)]
pub struct TapResult {
    pub status: TapStatus,
    pub iterations: usize,
    /// One graph per topic, keyed `SliceKey::Point(k)`.
    pub mu: GraphCollection<Directed>,
}

/// Messages of one topic: `[node][neighbour]`.
type Messages = Vec<BTreeMap<usize, f64>>;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x.clamp(-LOGIT_BOUND, LOGIT_BOUND)).exp())
}

#[derive(Debug, Clone)]
pub struct TapModel {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// Sorted neighbourhood of every node, including itself.
    neighbors: Vec<Vec<usize>>,
    /// `theta[i][k]`.
    theta: Vec<Vec<f64>>,
    b: Vec<Messages>,
    r: Vec<Messages>,
    a: Vec<Messages>,
    params: TapParams,
}

impl TapModel {
    /// Authors missing from `theta` get a uniform distribution.
    pub fn new(graph: &Network<Undirected>, theta: &BTreeMap<String, Vec<f64>>, params: TapParams) -> Result<Self> {
        let num_topics = theta
            .values()
            .next()
            .map(Vec::len)
            .filter(|&z| z > 0)
            .ok_or_else(|| TethneError::Inconsistency("TAP needs at least one topic distribution".into()))?;
        if let Some((author, row)) = theta.iter().find(|(_, row)| row.len() != num_topics) {
            return Err(TethneError::Inconsistency(format!(
                "author {author} has {} topics, expected {num_topics}",
                row.len()
            )));
        }

        let labels: Vec<String> = graph.labels().map(str::to_string).collect();
        let index: HashMap<String, usize> = labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect();
        let mut missing = 0usize;
        let node_theta: Vec<Vec<f64>> = labels
            .iter()
            .map(|label| match theta.get(label) {
                Some(row) => row.clone(),
                None => {
                    missing += 1;
                    vec![1.0 / num_topics as f64; num_topics]
                }
            })
            .collect();
        if missing > 0 {
            warn!(missing, "authors without a topic distribution; using uniform");
        }

        let mut neighbors = Vec::with_capacity(labels.len());
        let mut weights: Vec<BTreeMap<usize, f64>> = Vec::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            let mut around = BTreeMap::from([(i, 1.0)]);
            for other in graph.neighbors(label) {
                let j = index[other];
                if j != i {
                    let w = graph.edge(label, other).map_or(1.0, EdgeData::weight);
                    around.insert(j, w);
                }
            }
            neighbors.push(around.keys().copied().collect::<Vec<_>>());
            weights.push(around);
        }

        let b: Vec<Messages> = (0..num_topics)
            .map(|k| {
                weights
                    .iter()
                    .map(|around| {
                        let g: BTreeMap<usize, f64> = around
                            .iter()
                            .map(|(&j, &w)| (j, (w * node_theta[j][k]).max(EPS)))
                            .collect();
                        let total: f64 = g.values().sum();
                        g.into_iter().map(|(j, v)| (j, (v / total).ln())).collect()
                    })
                    .collect()
            })
            .collect();
        let zeros: Messages = neighbors.iter().map(|nb| nb.iter().map(|&j| (j, 0.0)).collect()).collect();

        Ok(Self {
            labels,
            index,
            neighbors,
            theta: node_theta,
            b,
            r: vec![zeros.clone(); num_topics],
            a: vec![zeros; num_topics],
            params,
        })
    }

    pub fn num_topics(&self) -> usize {
        self.b.len()
    }

    /// Start from `previous`'s messages on every (author, neighbour) pair
    /// the two graphs share. Returns the number of pairs copied.
    pub fn prime(&mut self, previous: &TapModel) -> usize {
        let mut copied = 0;
        for k in 0..self.num_topics().min(previous.num_topics()) {
            for (i, label) in self.labels.iter().enumerate() {
                let Some(&pi) = previous.index.get(label) else { continue };
                for &j in &self.neighbors[i] {
                    let Some(&pj) = previous.index.get(&self.labels[j]) else { continue };
                    if let (Some(&r), Some(&a)) = (previous.r[k][pi].get(&pj), previous.a[k][pi].get(&pj)) {
                        self.r[k][i].insert(j, r);
                        self.a[k][i].insert(j, a);
                        copied += 1;
                    }
                }
            }
        }
        debug!(copied, "primed TAP messages");
        copied
    }

    fn update_responsibility(&mut self, k: usize) {
        let lambda = self.params.damping;
        let (b, a) = (&self.b[k], &self.a[k]);
        let mut next = self.r[k].clone();
        for (i, nb) in self.neighbors.iter().enumerate() {
            for &j in nb {
                let competitor = nb
                    .iter()
                    .filter(|&&m| m != j)
                    .map(|&m| b[i][&m] + a[i][&m])
                    .fold(f64::NEG_INFINITY, f64::max);
                let competitor = if competitor.is_finite() { competitor } else { 0.0 };
                let fresh = b[i][&j] - competitor;
                let old = self.r[k][i][&j];
                next[i].insert(j, lambda * old + (1.0 - lambda) * fresh);
            }
        }
        self.r[k] = next;
    }

    fn update_availability(&mut self, k: usize) {
        let lambda = self.params.damping;
        let r = &self.r[k];
        let mut next = self.a[k].clone();
        for (i, nb) in self.neighbors.iter().enumerate() {
            for &j in nb {
                let fresh = if j == i {
                    nb.iter().filter(|&&m| m != i).map(|&m| r[m][&i].max(0.0)).sum()
                } else {
                    let own = r[j][&j];
                    let best = self.neighbors[j]
                        .iter()
                        .filter(|&&m| m != i && m != j)
                        .map(|&m| r[m][&j].max(0.0))
                        .fold(0.0, f64::max);
                    own.max(0.0).min(-(own.min(0.0) + best))
                };
                let old = self.a[k][i][&j];
                next[i].insert(j, lambda * old + (1.0 - lambda) * fresh);
            }
        }
        self.a[k] = next;
    }

    /// Best neighbour of every author for topic `k`; a previous choice
    /// within epsilon of the maximum is kept.
    fn choices(&self, k: usize, previous: Option<&[usize]>) -> Vec<usize> {
        let epsilon = self.params.epsilon;
        self.neighbors
            .iter()
            .enumerate()
            .map(|(i, nb)| {
                let score = |j: usize| self.r[k][i][&j] + self.a[k][i][&j];
                let (best, value) = nb
                    .iter()
                    .map(|&j| (j, score(j)))
                    .fold((i, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
                match previous.map(|p| p[i]) {
                    Some(held) if held != best && score(held) >= value - epsilon => held,
                    _ => best,
                }
            })
            .collect()
    }

    fn propagate(&mut self) -> (TapStatus, usize) {
        let topics = self.num_topics();
        let mut choices: Vec<Vec<usize>> = (0..topics).map(|k| self.choices(k, None)).collect();
        let mut stable = 0usize;
        for iteration in 1..=self.params.max_iterations {
            let mut changed = false;
            for (k, held) in choices.iter_mut().enumerate() {
                self.update_responsibility(k);
                self.update_availability(k);
                let next = self.choices(k, Some(held.as_slice()));
                changed |= next != *held;
                *held = next;
            }
            stable = if changed { 0 } else { stable + 1 };
            if stable >= self.params.stability_window {
                return (TapStatus::Converged, iteration);
            }
        }
        (TapStatus::IterationCap, self.params.max_iterations)
    }

    /// Run message passing, then build one influence graph per topic.
    ///
    /// Edge `j → i` carries `σ(r[i][j] + a[i][j])` and exists only when that
    /// exceeds the reverse direction. Nodes carry their `theta` share.
    #[instrument(skip(self), fields(authors = self.labels.len(), topics = self.num_topics()))]
    pub fn build(&mut self) -> Result<TapResult> {
        let (status, iterations) = self.propagate();
        match status {
            TapStatus::Converged => info!(iterations, "TAP converged"),
            TapStatus::IterationCap => warn!(iterations, "TAP stopped at the iteration cap"),
        }

        let mut mu = GraphCollection::<Directed>::new();
        for k in 0..self.num_topics() {
            let mut graph = DirectedNetwork::new();
            for (i, label) in self.labels.iter().enumerate() {
                graph.add_node_with(label, [("theta".to_string(), Attr::Float(self.theta[i][k]))]);
            }
            for (i, nb) in self.neighbors.iter().enumerate() {
                for &j in nb.iter().filter(|&&j| j != i) {
                    let forward = sigmoid(self.r[k][i][&j] + self.a[k][i][&j]);
                    let reverse = sigmoid(self.r[k][j][&i] + self.a[k][j][&i]);
                    if forward > reverse {
                        graph.add_or_update_edge(
                            &self.labels[j],
                            &self.labels[i],
                            [(EdgeData::WEIGHT.to_string(), Attr::Float(forward))],
                        );
                    }
                }
            }
            mu.insert(SliceKey::Point(k as i64), graph);
        }
        Ok(TapResult { status, iterations, mu })
    }
}

/// TAP over every slice of a co-authorship collection. Each slice's model
/// is primed with the previous slice's messages.
pub struct TapManager {
    slices: Vec<(SliceKey, Network<Undirected>)>,
    theta: BTreeMap<String, Vec<f64>>,
    results: BTreeMap<SliceKey, TapResult>,
    log: ConvergenceLog,
}

impl TapManager {
    pub fn new(collection: &GraphCollection<Undirected>, theta: BTreeMap<String, Vec<f64>>) -> Self {
        Self {
            slices: collection.iter().map(|(key, net)| (key, net.clone())).collect(),
            theta,
            results: BTreeMap::new(),
            log: ConvergenceLog::default(),
        }
    }
}

#[async_trait]
impl ModelManager for TapManager {
    type Params = TapParams;
    type Model = BTreeMap<SliceKey, TapResult>;

    async fn prep(&mut self) -> Result<()> {
        if self.slices.is_empty() {
            return Err(TethneError::Inconsistency("TAP needs at least one co-authorship graph".into()));
        }
        if self.theta.is_empty() {
            return Err(TethneError::Inconsistency("TAP needs author topic distributions".into()));
        }
        Ok(())
    }

    #[instrument(skip(self, params), fields(slices = self.slices.len()))]
    async fn fit(&mut self, params: &TapParams) -> Result<()> {
        self.prep().await?;
        self.results.clear();
        self.log = ConvergenceLog::default();
        let mut previous: Option<TapModel> = None;
        for (key, net) in &self.slices {
            let mut model = TapModel::new(net, &self.theta, params.clone())?;
            if let Some(previous) = &previous {
                model.prime(previous);
            }
            let result = model.build()?;
            debug!(slice = %key, iterations = result.iterations, status = ?result.status, "fitted TAP slice");
            self.log.iterations += result.iterations;
            self.results.insert(*key, result);
            previous = Some(model);
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<SliceKey, TapResult>> {
        if self.results.is_empty() {
            return Err(TethneError::Inconsistency("TAP manager has not been fitted".into()));
        }
        Ok(self.results.clone())
    }

    fn convergence(&self) -> &ConvergenceLog {
        &self.log
    }
}
