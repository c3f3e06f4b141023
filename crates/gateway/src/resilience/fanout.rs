//! Best-effort concurrent fan-out.

use std::future::Future;

use futures::future::join_all;
use log::warn;

use crate::errors::GatewayError;

/// Run every labelled branch concurrently and wait for all of them to settle.
///
/// A failed branch is logged and reported as `None`; it never affects its
/// siblings. Results come back in input order. Total latency is that of the
/// slowest branch.
pub async fn settle_all<T, Fut>(branches: Vec<(String, Fut)>) -> Vec<(String, Option<T>)>
where
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let (labels, pending): (Vec<String>, Vec<Fut>) = branches.into_iter().unzip();
    let outcomes = join_all(pending).await;

    labels
        .into_iter()
        .zip(outcomes)
        .map(|(label, outcome)| match outcome {
            Ok(value) => (label, Some(value)),
            Err(e) => {
                warn!("Fan-out branch '{}' failed: {}", label, e);
                (label, None)
            }
        })
        .collect()
}
