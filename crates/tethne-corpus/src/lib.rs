//! tethne-corpus: the indexed corpus and its derived views.
//! Papers are indexed by arbitrary fields, tokenized into feature sets,
//! sliced along a numeric axis and merged across sources.

pub mod burstiness;
pub mod corpus;
pub mod feature;
pub mod featureset;
pub mod merge;
pub mod structured;
pub mod tokenize;

pub use burstiness::{burstiness, feature_burstiness, BurstOptions};
pub use corpus::{Corpus, CorpusBuilder, FieldIndex, SliceKey, SliceSpec};
pub use feature::Feature;
pub use featureset::{FeatureSet, Ranking, SparseMatrix};
pub use merge::{merge, MatchBy, MatchPredicate, MergeOptions};
pub use structured::{StructuredFeature, StructuredFeatureSet};
pub use tokenize::{ListTokenizer, Tokenizer, WordTokenizer, STOP_WORDS};
