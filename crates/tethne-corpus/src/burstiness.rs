//! Kleinberg burst detection over the slice axis.

use std::collections::BTreeMap;

use tethne_common::{Result, TethneError, Value};
use tracing::warn;

use crate::corpus::{Corpus, SliceKey, SliceSpec};
use crate::featureset::Ranking;

#[derive(Debug, Clone)]
pub struct BurstOptions {
    /// Rate multiplier between consecutive states.
    pub s: f64,
    /// Cost of moving up one state.
    pub gamma: f64,
    /// Number of states.
    pub k: usize,
    /// Divide states by `k - 1` so intensities fall in `[0, 1]`.
    pub normalize: bool,
    /// Elements scored by [`burstiness`], highest count first.
    pub topn: usize,
    pub slice: SliceSpec,
}

impl Default for BurstOptions {
    fn default() -> Self {
        Self {
            s: 1.1,
            gamma: 1.0,
            k: 5,
            normalize: true,
            topn: 20,
            slice: SliceSpec::yearly(),
        }
    }
}

/// Minimum-cost state sequence for the inter-arrival `gaps`.
fn state_sequence(gaps: &[f64], k: usize, s: f64, gamma: f64) -> Vec<usize> {
    let n = gaps.len();
    let total: f64 = gaps.iter().sum();
    if n == 0 || total <= 0.0 {
        return vec![0; n];
    }
    let g_hat = total / n as f64;
    let alphas: Vec<f64> = (0..k).map(|i| s.powi(i as i32) / g_hat).collect();
    let up = gamma * (n as f64).ln();
    let tau = |from: usize, to: usize| if from >= to { 0.0 } else { (to - from) as f64 * up };
    let emit = |j: usize, x: f64| -alphas[j].ln() + alphas[j] * x;

    let mut cost = vec![f64::INFINITY; k];
    cost[0] = 0.0;
    let mut back: Vec<Vec<usize>> = Vec::with_capacity(n);
    for &x in gaps {
        let mut next = vec![f64::INFINITY; k];
        let mut from = vec![0; k];
        for j in 0..k {
            let (best, arg) = (0..k)
                .map(|l| (cost[l] + tau(l, j), l))
                .fold((f64::INFINITY, 0), |acc, c| if c.0 < acc.0 { c } else { acc });
            next[j] = best + emit(j, x);
            from[j] = arg;
        }
        back.push(from);
        cost = next;
    }

    let mut state = (0..k)
        .min_by(|&a, &b| cost[a].partial_cmp(&cost[b]).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0);
    let mut states = vec![0; n];
    for t in (0..n).rev() {
        states[t] = state;
        state = back[t][state];
    }
    states
}

/// Burst intensity of one element of `set_name`, per slice.
///
/// Events are the axis values of the papers containing the element; a burst
/// state is attributed to the later event of each gap.
pub fn feature_burstiness(corpus: &Corpus, set_name: &str, element: &Value, options: &BurstOptions) -> Result<Vec<(SliceKey, f64)>> {
    if options.k == 0 || options.s <= 1.0 {
        return Err(TethneError::Config("burstiness needs k >= 1 and s > 1".into()));
    }
    let set = corpus
        .feature_set(set_name)
        .ok_or_else(|| TethneError::NotFound(format!("feature set {set_name}")))?;

    let mut events: Vec<i64> = set
        .documents_with(element)
        .iter()
        .filter_map(|doc| corpus.get(doc))
        .filter_map(|paper| paper.get(&options.slice.key).and_then(|v| v.as_int()))
        .collect();
    events.sort_unstable();

    let gaps: Vec<f64> = events.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    if !gaps.is_empty() && gaps.iter().sum::<f64>() <= 0.0 {
        warn!(%element, "all occurrences share one axis value; no burst structure");
    }
    let states = state_sequence(&gaps, options.k, options.s, options.gamma);

    let mut intensity: BTreeMap<i64, usize> = BTreeMap::new();
    for (i, &date) in events.iter().enumerate() {
        let state = if i == 0 { 0 } else { states[i - 1] };
        let entry = intensity.entry(date).or_insert(0);
        *entry = (*entry).max(state);
    }

    let scale = if options.normalize && options.k > 1 { (options.k - 1) as f64 } else { 1.0 };
    let distribution = corpus.distribution(&options.slice)?;
    Ok(distribution
        .into_iter()
        .map(|(key, _)| {
            let peak = intensity
                .range(key.start()..key.end())
                .map(|(_, s)| *s)
                .max()
                .unwrap_or(0);
            (key, peak as f64 / scale)
        })
        .collect())
}

/// [`feature_burstiness`] for the `topn` most frequent elements.
pub fn burstiness(corpus: &Corpus, set_name: &str, options: &BurstOptions) -> Result<BTreeMap<Value, Vec<(SliceKey, f64)>>> {
    let top = corpus.top_features(set_name, options.topn, Ranking::Count)?;
    let mut out = BTreeMap::new();
    for (element, _) in top {
        let series = feature_burstiness(corpus, set_name, &element, options)?;
        out.insert(element, series);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_common::{Field, Paper};

    fn corpus(years: &[(i64, bool)]) -> Corpus {
        let papers = years
            .iter()
            .enumerate()
            .map(|(i, &(year, tagged))| {
                let mut p = Paper::new();
                p.aulast = vec![if tagged { "BURST".into() } else { format!("A{i}") }];
                p.auinit = vec!["X".into()];
                p.date = Some(year);
                p.jtitle = Some(format!("J{i}"));
                p
            })
            .collect();
        Corpus::builder().index_features([Field::Authors]).build(papers).unwrap()
    }

    #[test]
    fn test_uniform_gaps_stay_in_base_state() {
        assert_eq!(state_sequence(&[1.0, 1.0, 1.0, 1.0], 3, 2.0, 1.0), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_dense_cluster_enters_higher_state() {
        let mut gaps = vec![10.0; 6];
        gaps.extend(vec![0.1; 12]);
        gaps.extend(vec![10.0; 6]);
        let states = state_sequence(&gaps, 3, 2.0, 1.0);
        assert_eq!(states[0], 0);
        assert!(states[10] > 0);
        assert_eq!(*states.last().unwrap(), 0);
    }

    #[test]
    fn test_feature_burstiness_covers_every_slice() {
        let mut years: Vec<(i64, bool)> = (2000..2010).map(|y| (y, false)).collect();
        years.extend([(2000, true), (2004, true), (2005, true), (2005, true), (2005, true), (2009, true)]);
        let corpus = corpus(&years);
        let burst = Value::tuple(["BURST", "X"]);
        let series = feature_burstiness(&corpus, "authors", &burst, &BurstOptions::default()).unwrap();
        assert_eq!(series.len(), 10);
        assert!(series.iter().all(|(_, v)| (0.0..=1.0).contains(v)));
        assert_eq!(series[0], (SliceKey::Point(2000), 0.0));
    }

    #[test]
    fn test_unknown_feature_set() {
        let corpus = corpus(&[(2000, true)]);
        assert!(feature_burstiness(&corpus, "words", &Value::text("x"), &BurstOptions::default()).is_err());
    }
}
