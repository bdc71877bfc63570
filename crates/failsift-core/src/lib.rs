//! # failsift
//!
//! Failure significance tracking for noise-free alerting.
//!
//! failsift keeps a bounded, newest-first history of success/failure
//! outcomes per identifier and decides, via named rules, whether the
//! current failure pattern is a real incident or noise that alerting
//! should ignore. Callers wrap risky operations (external API calls,
//! third-party hooks) so alerting reacts to sustained failure patterns
//! rather than isolated blips.
//!
//! ## Architecture
//!
//! - **Store**: per-identifier bounded histories, Redis-backed or in-memory
//! - **Rules**: named breach predicates (`percent_10`, `sequence_of_5`,
//!   plus custom closures)
//! - **Tracker**: records outcomes, evaluates rules, resets breached
//!   histories, and classifies errors as significant or not
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use failsift::{MemoryStore, Tracker};
//!
//! # async fn demo() -> failsift::Result<()> {
//! let tracker = Tracker::new(Arc::new(MemoryStore::new()));
//!
//! let result = tracker
//!     .track("payments-api", "sequence_of_5", || async {
//!         Err::<(), std::io::Error>(std::io::Error::other("timeout"))
//!     })
//!     .await?;
//!
//! if let Err(err) = result {
//!     if err.is_significant() {
//!         // page someone
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod rules;
pub mod store;
pub mod tracker;

pub use config::{Config, RedisConfig, TrackerConfig};
pub use error::{Error, Result};
pub use rules::{FnRule, Outcome, RatioRule, Rule, RuleRegistry, SequenceRule};
pub use store::{HistoryStore, MemoryStore, RedisHistoryStore};
pub use tracker::{Classified, FailureOptions, FailureOutcome, Tracker, TrackerBuilder};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::rules::{Outcome, RatioRule, Rule, RuleRegistry, SequenceRule};
    pub use crate::store::{HistoryStore, MemoryStore, RedisHistoryStore};
    pub use crate::tracker::{Classified, FailureOptions, Tracker};
}
