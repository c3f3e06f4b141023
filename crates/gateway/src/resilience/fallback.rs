//! Ordered primary/fallback source chains.
//!
//! A chain holds named strategies for one logical dataset. Strategies run
//! strictly in priority order: the first success wins wholesale and later
//! strategies are never started. If all fail, the returned error carries
//! every strategy's failure.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use log::{info, warn};

use crate::errors::{GatewayError, SourceFailure};
use crate::models::Sourced;

type Strategy<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, GatewayError>> + Send + 'a>;

/// Builder and executor for a fallback chain.
pub struct FallbackChain<'a, T> {
    dataset: &'static str,
    strategies: Vec<(String, Strategy<'a, T>)>,
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    pub fn new(dataset: &'static str) -> Self {
        Self {
            dataset,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; earlier strategies have higher priority.
    pub fn source<F, Fut>(mut self, name: impl Into<String>, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, GatewayError>> + Send + 'a,
    {
        let strategy: Strategy<'a, T> = Box::new(move || fetch().boxed());
        self.strategies.push((name.into(), strategy));
        self
    }

    /// Run the strategies in order and return the first success.
    pub async fn execute(self) -> Result<Sourced<T>, GatewayError> {
        let Self {
            dataset,
            strategies,
        } = self;
        let mut failures: Vec<SourceFailure> = Vec::new();

        for (name, strategy) in strategies {
            match strategy().await {
                Ok(data) => {
                    if !failures.is_empty() {
                        info!(
                            "{}: served by '{}' after {} failed source(s)",
                            dataset,
                            name,
                            failures.len()
                        );
                    }
                    return Ok(Sourced { data, source: name });
                }
                Err(error) => {
                    warn!("{}: source '{}' failed: {}", dataset, name, error);
                    failures.push(SourceFailure {
                        source: name,
                        error,
                    });
                }
            }
        }

        Err(GatewayError::AllSourcesExhausted {
            dataset: dataset.to_string(),
            attempts: failures,
        })
    }
}
