//! tethne-config: `tethne.toml` loading.

pub mod config;

pub use config::{
    CorpusConfig, DtmConfig, LdaConfig, LoggingConfig, MalletConfig, TapConfig, TethneConfig, CONFIG_ENV,
};
