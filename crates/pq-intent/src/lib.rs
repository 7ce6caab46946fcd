//! Question understanding: typo-tolerant intent classification, parameter
//! extraction, routing signals and follow-up resolution.

pub mod classifier;
pub mod context;
pub mod extract;
pub mod followup;
pub mod fuzzy;
pub mod signals;
pub mod vocab;

pub use classifier::{ClassifierConfig, IntentClassifier, IntentScore};
pub use context::{ContextEntry, QuickContext};
pub use followup::{FollowUpConfig, FollowUpContext, FollowUpKind, FollowUpResolver, PriorTurn};
pub use signals::Signals;
