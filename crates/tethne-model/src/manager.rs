//! The prep → fit → load contract shared by every model backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tethne_common::Result;
use tracing::warn;

/// Per-iteration progress retained for plotting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceLog {
    pub iterations: usize,
    /// `(iteration, log-likelihood per token)`.
    pub log_likelihood: Vec<(usize, f64)>,
}

impl ConvergenceLog {
    pub fn record(&mut self, iteration: usize, ll: f64) {
        self.log_likelihood.push((iteration, ll));
        self.iterations = self.iterations.max(iteration);
    }
}

#[async_trait]
pub trait ModelManager: Send {
    type Params: Send + Sync;
    type Model: Send;

    /// Materialise the backend's input.
    async fn prep(&mut self) -> Result<()>;

    /// Run the algorithm. May be called again with other parameters.
    async fn fit(&mut self, params: &Self::Params) -> Result<()>;

    /// Parse the latest fit into a model.
    fn load(&self) -> Result<Self::Model>;

    fn convergence(&self) -> &ConvergenceLog;
}

/// Scratch directory of one manager, removed on drop unless a failure
/// asked for it to be kept.
#[derive(Debug)]
pub struct WorkDir {
    temp: Option<TempDir>,
    kept: PathBuf,
}

impl WorkDir {
    pub fn new(prefix: &str) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let kept = temp.path().to_path_buf();
        Ok(Self { temp: Some(temp), kept })
    }

    pub fn path(&self) -> &Path {
        match &self.temp {
            Some(temp) => temp.path(),
            None => &self.kept,
        }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Stop deleting the directory on drop; returns its path.
    pub fn keep(&mut self) -> &Path {
        if let Some(temp) = self.temp.take() {
            self.kept = temp.keep();
            warn!(path = %self.kept.display(), "keeping model working directory");
        }
        &self.kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workdir_removed_unless_kept() {
        let removed = {
            let dir = WorkDir::new("tethne-test").unwrap();
            dir.path().to_path_buf()
        };
        assert!(!removed.exists());

        let kept = {
            let mut dir = WorkDir::new("tethne-test").unwrap();
            dir.keep().to_path_buf()
        };
        assert!(kept.exists());
        std::fs::remove_dir_all(kept).unwrap();
    }

    #[test]
    fn test_convergence_log_tracks_last_iteration() {
        let mut log = ConvergenceLog::default();
        log.record(10, -9.0);
        log.record(20, -8.0);
        assert_eq!(log.iterations, 20);
        assert_eq!(log.log_likelihood.len(), 2);
    }
}
