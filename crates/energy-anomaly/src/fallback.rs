//! Ordered fallback strategies for numeric stages.
//!
//! A [`FallbackChain`] holds named strategies for one stage. They run in
//! order until one succeeds. Fatal errors ([`AnomalyError::is_fatal`]) stop
//! the chain immediately; any other error is logged at `warn!` and the next
//! strategy runs.
//!
//! ```text
//!   attempt("pca") ──err──► attempt("zscore-sum") ──err──► ... ──► Computation error
//!        │ok                      │ok
//!        ▼                        ▼
//!   Resolved { degraded: false }  Resolved { degraded: true, failures: [...] }
//! ```

use tracing::{debug, warn};

use crate::error::{AnomalyError, AnomalyResult};

type Strategy<'a, T> = Box<dyn FnOnce() -> AnomalyResult<T> + 'a>;

/// Outcome of a chain: the value plus which strategy produced it.
#[derive(Clone, Debug)]
pub struct Resolved<T> {
    pub value: T,
    /// Name of the strategy that succeeded.
    pub strategy: &'static str,
    /// True when a strategy other than the first produced the value.
    pub degraded: bool,
    /// `"strategy: error"` for each strategy that failed first.
    pub failures: Vec<String>,
}

impl<T> Resolved<T> {
    /// Human-readable note describing a degraded resolution.
    pub fn note(&self, stage: &str) -> Option<String> {
        self.degraded.then(|| {
            format!(
                "{stage}: used fallback '{}' ({})",
                self.strategy,
                self.failures.join("; ")
            )
        })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            strategy: self.strategy,
            degraded: self.degraded,
            failures: self.failures,
        }
    }
}

/// Ordered list of strategies for a single stage.
pub struct FallbackChain<'a, T> {
    stage: &'static str,
    strategies: Vec<(&'static str, Strategy<'a, T>)>,
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy. The first one added is the primary attempt.
    pub fn attempt(
        mut self,
        name: &'static str,
        strategy: impl FnOnce() -> AnomalyResult<T> + 'a,
    ) -> Self {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    /// Run strategies in order until one succeeds.
    pub fn run(self) -> AnomalyResult<Resolved<T>> {
        let stage = self.stage;
        let mut failures = Vec::new();
        for (name, strategy) in self.strategies {
            match strategy() {
                Ok(value) => {
                    let degraded = !failures.is_empty();
                    if degraded {
                        warn!(stage, strategy = name, "recovered with fallback strategy");
                    } else {
                        debug!(stage, strategy = name, "strategy succeeded");
                    }
                    return Ok(Resolved {
                        value,
                        strategy: name,
                        degraded,
                        failures,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(stage, strategy = name, error = %e, "strategy failed");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }
        Err(AnomalyError::computation(
            stage,
            if failures.is_empty() {
                "no strategies configured".to_string()
            } else {
                failures.join("; ")
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_success_wins() {
        let r = FallbackChain::new("score")
            .attempt("primary", || Ok(1))
            .attempt("backup", || Ok(2))
            .run()
            .unwrap();
        assert_eq!(r.value, 1);
        assert_eq!(r.strategy, "primary");
        assert!(!r.degraded);
        assert!(r.note("score").is_none());
    }

    #[test]
    fn degraded_computation_falls_through() {
        let r = FallbackChain::new("score")
            .attempt("primary", || Err(AnomalyError::computation("pca", "singular")))
            .attempt("backup", || Ok(2))
            .run()
            .unwrap();
        assert_eq!(r.value, 2);
        assert!(r.degraded);
        assert_eq!(r.failures.len(), 1);
        let note = r.note("score").unwrap();
        assert!(note.contains("backup") && note.contains("singular"));
    }

    #[test]
    fn fatal_errors_stop_the_chain() {
        let mut backup_ran = false;
        let r = FallbackChain::new("features")
            .attempt("primary", || Err(AnomalyError::NoFeatures("empty".into())))
            .attempt("backup", || {
                backup_ran = true;
                Ok(())
            })
            .run();
        assert!(matches!(r, Err(AnomalyError::NoFeatures(_))));
        assert!(!backup_ran);
    }

    #[test]
    fn exhausted_chain_is_computation_error() {
        let r: AnomalyResult<Resolved<u8>> = FallbackChain::new("threshold")
            .attempt("a", || Err(AnomalyError::computation("a", "nan")))
            .run();
        let err = r.unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn map_keeps_provenance() {
        let r = FallbackChain::new("s")
            .attempt("x", || Err(AnomalyError::computation("s", "bad")))
            .attempt("y", || Ok(3))
            .run()
            .unwrap()
            .map(|v| v * 2);
        assert_eq!((r.value, r.strategy, r.degraded), (6, "y", true));
    }
}
