pub mod aggregator;
pub mod dispatcher;
pub mod outcome;
pub mod view;

#[cfg(test)]
pub mod testing;

pub use aggregator::{CurrentBatters, CurrentInningsPolicy, MatchAggregator, MatchView};
pub use dispatcher::{CommandError, ScoringCommand, ScoringDispatcher};
pub use outcome::{DismissalType, OutcomeCode};
pub use view::ScorerForm;
