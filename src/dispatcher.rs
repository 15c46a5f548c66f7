use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::TransportError;
use crate::request::AdminRequest;
use crate::result::{FailureReason, ResultSequence, aggregate};
use crate::transport::AdminTransport;

/// Send one batch and wait for the answers.
///
/// Returns once every item has been answered, `timeout` has elapsed across
/// the whole batch, or either token is cancelled. In the last two cases the
/// answers already received are kept and every other item is reported as
/// `TimedOut` or `Canceled`. A transport failure fails the whole call.
#[instrument(skip_all, fields(request_id = %request.id, operation = request.operation(), items = request.len()))]
pub async fn dispatch<T: AdminTransport>(
    transport: &T,
    request: AdminRequest,
    timeout: Duration,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
) -> Result<ResultSequence, TransportError> {
    let start = Instant::now();
    let operation = request.operation();
    let names = request.item_names();

    if cancel.is_cancelled() || shutdown.is_cancelled() {
        debug!("Cancelled before the request was sent");
        let results = aggregate(&names, vec![], FailureReason::Canceled);
        record(operation, &results, start);
        return Ok(results);
    }

    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);

    let mut responses = transport.send(request);
    let mut received = Vec::with_capacity(names.len());
    let mut pending: HashSet<&str> = names.iter().map(String::as_str).collect();

    let missing = loop {
        if pending.is_empty() {
            break FailureReason::NoResponse;
        }

        select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Request cancelled with {} items pending", pending.len());
                break FailureReason::Canceled;
            }
            _ = shutdown.cancelled() => {
                debug!("Session closing with {} items pending", pending.len());
                break FailureReason::Canceled;
            }
            _ = &mut deadline => {
                warn!(
                    "Request timed out after {:?} with {} items pending",
                    timeout,
                    pending.len()
                );
                break FailureReason::TimedOut;
            }
            next = responses.next() => match next {
                Some(Ok(response)) => {
                    pending.remove(response.name.as_str());
                    received.push(response);
                }
                Some(Err(e)) => {
                    metrics::counter!("admin.dispatch.error", "operation" => operation)
                        .increment(1);
                    return Err(e);
                }
                None => {
                    warn!("Transport finished with {} items unanswered", pending.len());
                    break FailureReason::NoResponse;
                }
            }
        }
    };

    let results = aggregate(&names, received, missing);
    record(operation, &results, start);
    Ok(results)
}

fn record(operation: &'static str, results: &ResultSequence, start: Instant) {
    metrics::histogram!("admin.dispatch.duration", "operation" => operation)
        .record(start.elapsed());
    for result in results {
        let outcome = match result.reason() {
            None => "success",
            Some(FailureReason::TimedOut) => "timed_out",
            Some(FailureReason::Canceled) => "canceled",
            Some(_) => "failure",
        };
        metrics::counter!("admin.dispatch.items", "operation" => operation, "outcome" => outcome)
            .increment(1);
    }
}
