//! tethne-model: corpus-level generative models.
//! Every backend follows the prep → fit → load contract of
//! [`ModelManager`]; external binaries run through [`ExternalProcess`].

pub mod dtm;
pub mod lda;
pub mod manager;
pub mod process;
pub mod tap;

pub use dtm::{parse_topic_log_probs, DtmManager, DtmModel, DtmParams};
pub use lda::{GibbsLdaManager, GibbsParams, LdaModel, MalletManager, MalletParams, TopicMode};
pub use manager::{ConvergenceLog, ModelManager, WorkDir};
pub use process::{ExternalProcess, STDERR_TAIL};
pub use tap::{author_theta, TapManager, TapModel, TapParams, TapResult, TapStatus};
