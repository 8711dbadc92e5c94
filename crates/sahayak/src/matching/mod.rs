pub mod pattern;
pub mod scorer;

pub use pattern::{best_pattern_match, build_entry_pattern};
pub use scorer::{rank_candidates, score_entry, QueryFeatures};
