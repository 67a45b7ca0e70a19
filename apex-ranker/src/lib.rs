//! The ranker (C6): signal→score pipeline with explanations (spec.md §4.6).

pub mod error;
pub mod ranker;
pub mod score;
pub mod signals;

pub use error::{RankerError, RankerResult};
pub use ranker::Ranker;
pub use signals::{FrameworkSignal, RankExplain, RankSignals, RankedPattern, SubScoreExplain};
