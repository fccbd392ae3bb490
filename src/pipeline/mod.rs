pub mod classifier;
pub mod containment;
pub mod extract;

pub use classifier::{ClassifierError, ClassifierInvocation, ClassifierRun};
pub use containment::{rank_report, CandidateTaxon, RankError};
pub use extract::{ExtractionError, ExtractionJob};
