//! Configuration loading for Tethne.
//! Reads tethne.toml from the current directory or the path in TETHNE_CONFIG.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tethne_common::{Result, TethneError};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "TETHNE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "tethne.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TethneConfig {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub lda: LdaConfig,
    #[serde(default)]
    pub mallet: MalletConfig,
    #[serde(default)]
    pub dtm: DtmConfig,
    #[serde(default)]
    pub tap: TapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_index_by")]
    pub index_by: String,
    #[serde(default = "default_index_fields")]
    pub index_fields: Vec<String>,
    #[serde(default = "default_index_features")]
    pub index_features: Vec<String>,
}

fn default_index_by()       -> String      { "ayjid".to_string() }
fn default_index_fields()   -> Vec<String> { vec!["date".to_string()] }
fn default_index_features() -> Vec<String> { vec!["authors".to_string(), "citations".to_string()] }

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            index_by: default_index_by(),
            index_fields: default_index_fields(),
            index_features: default_index_features(),
        }
    }
}

/// Hyperparameters shared by both LDA backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdaConfig {
    #[serde(default = "default_num_topics")]
    pub num_topics: usize,
    #[serde(default = "default_lda_iterations")]
    pub iterations: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_topics()     -> usize { 20 }
fn default_lda_iterations() -> usize { 1000 }
fn default_alpha()          -> f64   { 0.1 }
fn default_beta()           -> f64   { 0.01 }
fn default_seed()           -> u64   { 42 }

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            num_topics: default_num_topics(),
            iterations: default_lda_iterations(),
            alpha: default_alpha(),
            beta: default_beta(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalletConfig {
    /// Path to the `mallet` launcher script.
    #[serde(default = "default_mallet_path")]
    pub path: PathBuf,
    #[serde(default = "bool_true")]
    pub remove_stopwords: bool,
}

fn default_mallet_path() -> PathBuf { PathBuf::from("mallet") }
fn bool_true()           -> bool    { true }

impl Default for MalletConfig {
    fn default() -> Self {
        Self {
            path: default_mallet_path(),
            remove_stopwords: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtmConfig {
    /// Path to the compiled `dtm` binary.
    #[serde(default = "default_dtm_path")]
    pub path: PathBuf,
    #[serde(default = "default_top_chain_var")]
    pub top_chain_var: f64,
    #[serde(default = "default_dtm_alpha")]
    pub alpha: f64,
    #[serde(default = "default_seq_min_iter")]
    pub lda_sequence_min_iter: usize,
    #[serde(default = "default_seq_max_iter")]
    pub lda_sequence_max_iter: usize,
    #[serde(default = "default_em_iter")]
    pub lda_max_em_iter: usize,
}

fn default_dtm_path()      -> PathBuf { PathBuf::from("dtm") }
fn default_top_chain_var() -> f64     { 0.005 }
fn default_dtm_alpha()     -> f64     { 0.01 }
fn default_seq_min_iter()  -> usize   { 6 }
fn default_seq_max_iter()  -> usize   { 20 }
fn default_em_iter()       -> usize   { 10 }

impl Default for DtmConfig {
    fn default() -> Self {
        Self {
            path: default_dtm_path(),
            top_chain_var: default_top_chain_var(),
            alpha: default_dtm_alpha(),
            lda_sequence_min_iter: default_seq_min_iter(),
            lda_sequence_max_iter: default_seq_max_iter(),
            lda_max_em_iter: default_em_iter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Damping factor λ applied to message updates.
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Iterations the argmax assignment must stay unchanged.
    #[serde(default = "default_stability_window")]
    pub stability_window: usize,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_damping()          -> f64   { 0.5 }
fn default_max_iterations()   -> usize { 500 }
fn default_stability_window() -> usize { 50 }
fn default_epsilon()          -> f64   { 1e-5 }

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            stability_window: default_stability_window(),
            epsilon: default_epsilon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by RUST_LOG.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String { "tethne=info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

mod tests;

impl TethneConfig {
    /// Load configuration from tethne.toml.
    /// Checks TETHNE_CONFIG first, then the current directory. A missing
    /// file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(?config, "Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TethneConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.tap.damping) {
            return Err(TethneError::Config(format!(
                "tap.damping must be in [0, 1), got {}",
                self.tap.damping
            )));
        }
        if self.lda.num_topics == 0 {
            return Err(TethneError::Config("lda.num_topics must be positive".into()));
        }
        if self.tap.stability_window == 0 || self.tap.stability_window > self.tap.max_iterations {
            return Err(TethneError::Config(format!(
                "tap.stability_window ({}) must be in 1..={}",
                self.tap.stability_window, self.tap.max_iterations
            )));
        }
        Ok(())
    }
}
