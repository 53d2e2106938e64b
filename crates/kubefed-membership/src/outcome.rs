//! Aggregated outcome of best-effort teardown steps

use std::fmt;
use std::future::Future;

use kubefed_common::kube_utils::ignore_not_found;
use kubefed_common::Error;
use tracing::{debug, error};

/// A single object that could not be cleaned up
#[derive(Debug)]
pub struct TeardownFailure {
    /// Kind and name of the object, e.g. `ClusterRole "kubefed-controller-manager:a-b"`
    pub object: String,
    /// Why it could not be cleaned up
    pub error: Error,
}

/// Failures collected while tearing down member-side state.
///
/// An empty outcome means every object is gone (deleted now or already absent).
#[derive(Debug, Default)]
pub struct TeardownOutcome {
    failures: Vec<TeardownFailure>,
}

impl TeardownOutcome {
    /// True when nothing failed
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// The recorded failures, in attempt order
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Record the result of one step; `Ok` results are not stored
    pub fn record(&mut self, object: impl Into<String>, result: Result<(), Error>) {
        if let Err(error) = result {
            self.failures.push(TeardownFailure {
                object: object.into(),
                error,
            });
        }
    }

    /// Append another outcome's failures
    pub fn merge(&mut self, other: TeardownOutcome) {
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for TeardownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded() {
            return write!(f, "all objects removed");
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|fail| format!("{}: {}", fail.object, fail.error))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Delete every target, never short-circuiting.
///
/// Absence counts as success. Any other error is logged and collected so the
/// remaining targets are still attempted.
pub async fn delete_all<T, F, Fut>(targets: impl IntoIterator<Item = T>, mut delete: F) -> TeardownOutcome
where
    T: fmt::Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let mut outcome = TeardownOutcome::default();

    for target in targets {
        let object = target.to_string();
        match ignore_not_found(delete(target).await) {
            Ok(true) => debug!(object = %object, "Deleted"),
            Ok(false) => debug!(object = %object, "Already absent"),
            Err(e) => {
                error!(object = %object, error = %e, "Could not delete");
                outcome.record(object, Err(e));
            }
        }
    }

    outcome
}
