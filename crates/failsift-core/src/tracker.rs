//! Outcome tracking and breach orchestration
//!
//! The [`Tracker`] ties the pieces together: it records outcomes into the
//! history store, evaluates the named rule against the just-updated history,
//! resets the history on breach, and classifies errors from scoped
//! operations as significant or not.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::rules::{FnRule, Outcome, Rule, RuleRegistry};
use crate::store::HistoryStore;

/// Callback invoked with the identifier on every success or failure
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// An error routed through the failure path, annotated with significance
///
/// Wraps the original error instead of replacing it: `source()` returns the
/// underlying error so callers matching by kind keep working, and message
/// formatting delegates unchanged. An error is tagged non-significant only
/// when the configured rule did not breach and the error matched the
/// per-call filter; everything else stays significant.
#[derive(Debug)]
pub struct Classified<E> {
    source: E,
    significant: bool,
}

impl<E> Classified<E> {
    /// Whether this failure should be treated as a real incident
    pub fn is_significant(&self) -> bool {
        self.significant
    }

    /// Borrow the original error
    pub fn get_ref(&self) -> &E {
        &self.source
    }

    /// Unwrap back to the original error
    pub fn into_inner(self) -> E {
        self.source
    }
}

impl<E: fmt::Display> fmt::Display for Classified<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Classified<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Per-call classification filter for `failure_with` / `track_with`
///
/// The default matches every error, mirroring "catch everything". A
/// restricted filter leaves non-matching errors unannotated: they come back
/// to the caller still marked significant.
pub struct FailureOptions<E> {
    classify: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> Default for FailureOptions<E> {
    fn default() -> Self {
        Self {
            classify: Arc::new(|_| true),
        }
    }
}

impl<E> Clone for FailureOptions<E> {
    fn clone(&self) -> Self {
        Self {
            classify: self.classify.clone(),
        }
    }
}

impl<E> FailureOptions<E> {
    /// Filter matching every error (the default)
    pub fn all() -> Self {
        Self::default()
    }

    /// Only errors for which `pred` returns true are eligible for the
    /// non-significant tag
    pub fn only<F>(pred: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            classify: Arc::new(pred),
        }
    }

    fn matches(&self, error: &E) -> bool {
        (self.classify)(error)
    }
}

impl<E> fmt::Debug for FailureOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureOptions").finish_non_exhaustive()
    }
}

/// Result of a `failure_with` call
#[derive(Debug)]
pub struct FailureOutcome<T, E> {
    /// Whether the configured rule breached on the post-record history
    pub breach: bool,
    /// The scoped operation's result, with any error classified
    pub result: std::result::Result<T, Classified<E>>,
}

/// Records outcomes and decides whether failure patterns are significant
pub struct Tracker {
    store: Arc<dyn HistoryStore>,
    rules: RuleRegistry,
    on_success: Option<Callback>,
    on_failure: Option<Callback>,
    list_length: usize,
}

impl Tracker {
    /// Create a tracker with default rules, callbacks, and history length
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self::builder(store).build()
    }

    /// Start building a tracker with custom rules and callbacks
    pub fn builder(store: Arc<dyn HistoryStore>) -> TrackerBuilder {
        TrackerBuilder {
            store,
            rules: RuleRegistry::new(),
            on_success: None,
            on_failure: None,
            list_length: TrackerConfig::default().list_length,
        }
    }

    /// Record a success for the identifier
    pub async fn success(&self, identifier: &str) -> Result<()> {
        if let Some(callback) = &self.on_success {
            callback(identifier);
        }

        self.store
            .record(identifier, Outcome::Success, self.list_length)
            .await
    }

    /// Record a failure for the identifier and evaluate the named rule
    ///
    /// The failure is recorded before evaluation, so the rule sees it as the
    /// newest entry: `sequence_of_5` breaches on the fifth consecutive
    /// failure including this one. On breach the identifier's history is
    /// reset to empty. Returns whether the rule breached.
    pub async fn failure(&self, identifier: &str, rule_name: &str) -> Result<bool> {
        self.run_failure(identifier, rule_name).await
    }

    /// Record a failure, then run a scoped operation whose error gets
    /// classified
    ///
    /// The operation always runs, whatever the rule decided. If it fails and
    /// the error matches `options`, the error is tagged non-significant iff
    /// the rule did not breach; the error itself is handed back either way.
    pub async fn failure_with<T, E, F, Fut>(
        &self,
        identifier: &str,
        rule_name: &str,
        options: FailureOptions<E>,
        op: F,
    ) -> Result<FailureOutcome<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let breach = self.run_failure(identifier, rule_name).await?;

        let result = match op().await {
            Ok(value) => Ok(value),
            Err(error) => Err(classify(error, breach, &options)),
        };

        Ok(FailureOutcome { breach, result })
    }

    /// Run an operation, recording its outcome
    ///
    /// On success the operation's value is returned unchanged. On error the
    /// failure path runs (record, evaluate, conditional reset) and the error
    /// comes back classified.
    pub async fn track<T, E, F, Fut>(
        &self,
        identifier: &str,
        rule_name: &str,
        op: F,
    ) -> Result<std::result::Result<T, Classified<E>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.track_with(identifier, rule_name, FailureOptions::default(), op)
            .await
    }

    /// `track` with a per-call classification filter
    pub async fn track_with<T, E, F, Fut>(
        &self,
        identifier: &str,
        rule_name: &str,
        options: FailureOptions<E>,
        op: F,
    ) -> Result<std::result::Result<T, Classified<E>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        match op().await {
            Ok(value) => {
                self.success(identifier).await?;
                Ok(Ok(value))
            }
            Err(error) => {
                let breach = self.run_failure(identifier, rule_name).await?;
                Ok(Err(classify(error, breach, &options)))
            }
        }
    }

    /// The failure path shared by `failure`, `failure_with`, and `track`:
    /// callback, record, evaluate, conditional reset.
    async fn run_failure(&self, identifier: &str, rule_name: &str) -> Result<bool> {
        if let Some(callback) = &self.on_failure {
            callback(identifier);
        }

        let rule = self
            .rules
            .get(rule_name)
            .ok_or_else(|| Error::unknown_rule(rule_name))?
            .clone();

        self.store
            .record(identifier, Outcome::Failure, self.list_length)
            .await?;

        let history = self.store.read(identifier).await?;
        let breach = rule.evaluate(&history);

        debug!(
            identifier,
            rule = rule_name,
            records = history.len(),
            breach,
            "Evaluated failure"
        );

        if breach {
            info!(identifier, rule = rule_name, "Breach detected, resetting history");
            self.store.reset(identifier).await?;
        }

        Ok(breach)
    }
}

fn classify<E>(error: E, breach: bool, options: &FailureOptions<E>) -> Classified<E> {
    let non_significant = !breach && options.matches(&error);
    Classified {
        source: error,
        significant: !non_significant,
    }
}

/// Builder for [`Tracker`]
pub struct TrackerBuilder {
    store: Arc<dyn HistoryStore>,
    rules: RuleRegistry,
    on_success: Option<Callback>,
    on_failure: Option<Callback>,
    list_length: usize,
}

impl TrackerBuilder {
    /// Register a rule, replacing any existing entry with the same name
    pub fn rule(mut self, name: impl Into<String>, rule: Arc<dyn Rule>) -> Self {
        self.rules.register(name, rule);
        self
    }

    /// Register a closure as a rule
    pub fn rule_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Outcome]) -> bool + Send + Sync + 'static,
    {
        self.rules.register(name, Arc::new(FnRule::new(f)));
        self
    }

    /// Callback invoked with the identifier on every success
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Callback invoked with the identifier on every failure
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Maximum number of outcomes retained per identifier
    pub fn list_length(mut self, list_length: usize) -> Self {
        self.list_length = list_length;
        self
    }

    /// Apply tracker settings from configuration
    pub fn config(mut self, config: &TrackerConfig) -> Self {
        self.list_length = config.list_length;
        self
    }

    /// Build the tracker
    pub fn build(self) -> Tracker {
        Tracker {
            store: self.store,
            rules: self.rules,
            on_success: self.on_success,
            on_failure: self.on_failure,
            list_length: self.list_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum OpError {
        #[error("boom")]
        Boom,
        #[error("nope")]
        Nope,
    }

    fn tracker_over(store: Arc<MemoryStore>) -> Tracker {
        Tracker::new(store)
    }

    #[tokio::test]
    async fn success_records_a_success_outcome() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store.clone());

        tracker.success("key").await.unwrap();

        assert_eq!(store.read("key").await.unwrap(), vec![Outcome::Success]);
    }

    #[tokio::test]
    async fn failure_records_a_failure_outcome() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store.clone());

        let breach = tracker.failure("key", "percent_10").await.unwrap();

        assert!(!breach);
        assert_eq!(store.read("key").await.unwrap(), vec![Outcome::Failure]);
    }

    #[tokio::test]
    async fn callbacks_fire_with_the_identifier() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::new());

        let on_success = seen.clone();
        let on_failure = seen.clone();
        let tracker = Tracker::builder(store)
            .on_success(move |id| on_success.lock().push(format!("success: {id}")))
            .on_failure(move |id| on_failure.lock().push(format!("failure: {id}")))
            .build();

        tracker.success("key").await.unwrap();
        tracker.failure("key", "percent_10").await.unwrap();

        assert_eq!(*seen.lock(), vec!["success: key", "failure: key"]);
    }

    #[tokio::test]
    async fn history_is_capped_at_list_length() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store.clone()).list_length(100).build();

        for _ in 0..105 {
            tracker.success("key").await.unwrap();
        }

        assert_eq!(store.read("key").await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn breach_resets_the_history() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store.clone())
            .rule_fn("always", |_| true)
            .build();

        let breach = tracker.failure("key", "always").await.unwrap();

        assert!(breach);
        assert_eq!(store.read("key").await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn non_breach_keeps_the_recorded_failure() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store.clone())
            .rule_fn("never", |_| false)
            .build();

        let breach = tracker.failure("key", "never").await.unwrap();

        assert!(!breach);
        assert_eq!(store.read("key").await.unwrap(), vec![Outcome::Failure]);
    }

    #[tokio::test]
    async fn sequence_rule_breaches_on_the_fifth_consecutive_failure() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store.clone());

        for _ in 0..4 {
            assert!(!tracker.failure("key", "sequence_of_5").await.unwrap());
        }
        assert!(tracker.failure("key", "sequence_of_5").await.unwrap());

        assert_eq!(store.read("key").await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn unknown_rule_is_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store);

        let err = tracker.failure("key", "missing").await.unwrap_err();
        assert!(matches!(err, Error::UnknownRule { name } if name == "missing"));
    }

    #[tokio::test]
    async fn failure_with_always_runs_the_operation() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store);
        let ran = Arc::new(Mutex::new(false));

        let flag = ran.clone();
        let outcome = tracker
            .failure_with("key", "percent_10", FailureOptions::<OpError>::all(), || async move {
                *flag.lock() = true;
                Ok::<_, OpError>("done")
            })
            .await
            .unwrap();

        assert!(*ran.lock());
        assert_eq!(outcome.result.unwrap(), "done");
    }

    #[tokio::test]
    async fn error_is_non_significant_below_threshold() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store)
            .rule_fn("never", |_| false)
            .build();

        let outcome = tracker
            .failure_with("key", "never", FailureOptions::all(), || async {
                Err::<(), _>(OpError::Boom)
            })
            .await
            .unwrap();

        assert!(!outcome.breach);
        let err = outcome.result.unwrap_err();
        assert!(!err.is_significant());
        assert_eq!(err.into_inner(), OpError::Boom);
    }

    #[tokio::test]
    async fn error_stays_significant_on_breach() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store)
            .rule_fn("always", |_| true)
            .build();

        let outcome = tracker
            .failure_with("key", "always", FailureOptions::all(), || async {
                Err::<(), _>(OpError::Boom)
            })
            .await
            .unwrap();

        assert!(outcome.breach);
        assert!(outcome.result.unwrap_err().is_significant());
    }

    #[tokio::test]
    async fn filtered_out_errors_are_never_tagged() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store)
            .rule_fn("never", |_| false)
            .build();

        let options = FailureOptions::only(|e: &OpError| matches!(e, OpError::Boom));
        let outcome = tracker
            .failure_with("key", "never", options, || async {
                Err::<(), _>(OpError::Nope)
            })
            .await
            .unwrap();

        // The rule did not breach, but the error type is outside the filter,
        // so it comes back unannotated.
        assert!(outcome.result.unwrap_err().is_significant());
    }

    #[tokio::test]
    async fn track_returns_the_operation_result_and_records_success() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store.clone());

        let result = tracker
            .track("key", "percent_10", || async { Ok::<_, OpError>("result") })
            .await
            .unwrap();

        assert_eq!(result.unwrap(), "result");
        assert_eq!(store.read("key").await.unwrap(), vec![Outcome::Success]);
    }

    #[tokio::test]
    async fn track_classifies_the_error_and_records_failure() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store.clone());

        let result = tracker
            .track("key", "percent_10", || async { Err::<(), _>(OpError::Boom) })
            .await
            .unwrap();

        let err = result.unwrap_err();
        assert!(!err.is_significant());
        assert_eq!(err.into_inner(), OpError::Boom);
        assert_eq!(store.read("key").await.unwrap(), vec![Outcome::Failure]);
    }

    #[tokio::test]
    async fn track_breach_empties_history_and_stays_significant() {
        let store = Arc::new(MemoryStore::new());
        let tracker = Tracker::builder(store.clone())
            .rule_fn("always", |_| true)
            .build();

        let result = tracker
            .track("key", "always", || async { Err::<(), _>(OpError::Boom) })
            .await
            .unwrap();

        assert!(result.unwrap_err().is_significant());
        assert_eq!(store.read("key").await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn classified_error_preserves_the_source() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker_over(store);

        let result = tracker
            .track("key", "percent_10", || async { Err::<(), _>(OpError::Boom) })
            .await
            .unwrap();

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let source = std::error::Error::source(&err).unwrap();
        assert!(matches!(
            source.downcast_ref::<OpError>(),
            Some(OpError::Boom)
        ));
    }
}
