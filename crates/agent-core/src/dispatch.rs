//! Batch Tool Dispatch
//!
//! Runs every tool call of one LLM turn, either one after another or as a
//! bounded fan-out. Whatever happens, the batch yields exactly one
//! [`ToolResult`] per call, in call order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::error::AgentError;
use crate::invoker::ToolInvoker;
use crate::telemetry::{self, DispatchMode, Telemetry};
use crate::tool::{ToolCall, ToolResult};

/// Executes tool-call batches through a [`ToolInvoker`]
#[derive(Clone, Debug)]
pub struct ToolDispatcher {
    invoker: ToolInvoker,
    telemetry: Telemetry,
}

impl ToolDispatcher {
    pub const fn new(invoker: ToolInvoker, telemetry: Telemetry) -> Self {
        Self { invoker, telemetry }
    }

    pub const fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }

    /// Run a batch with at most `max_concurrency` calls in flight.
    ///
    /// `max_concurrency <= 1` runs the calls strictly in sequence. Results are
    /// returned in the order of `calls`, not completion order.
    pub async fn dispatch(&self, calls: &[ToolCall], max_concurrency: usize) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let mode = DispatchMode::for_batch(calls.len(), max_concurrency);
        let span = self.telemetry.dispatch_span(mode, calls.len());

        let results = match mode {
            DispatchMode::Sequential => self.dispatch_sequential(calls).instrument(span.clone()).await,
            DispatchMode::Concurrent { limit } => {
                self.dispatch_concurrent(calls, limit)
                    .instrument(span.clone())
                    .await
            }
        };

        let failed = results.iter().filter(|r| r.is_error).count();
        span.record("failed", failed);
        if failed == 0 {
            telemetry::record_ok(&span);
        } else {
            span.record("otel.status_code", "ERROR");
        }
        tracing::debug!(
            mode = mode.as_str(),
            calls = calls.len(),
            failed,
            "Tool batch finished"
        );

        results
    }

    async fn dispatch_sequential(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let outcome = AssertUnwindSafe(self.invoker.invoke(call))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(result) => result,
                Err(panic) => batch_failure(call, &AgentError::Dispatch(panic_message(&*panic))),
            };
            results.push(result);
        }

        results
    }

    async fn dispatch_concurrent(&self, calls: &[ToolCall], limit: usize) -> Vec<ToolResult> {
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut handles = Vec::with_capacity(calls.len());

        // Permits are handed out in spawn order; a finished call frees its
        // slot for the next waiting one.
        for call in calls {
            let invoker = self.invoker.clone();
            let semaphore = Arc::clone(&semaphore);
            let call = call.clone();

            let task = async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AgentError::Dispatch(e.to_string()))?;
                Ok::<_, AgentError>(invoker.invoke(&call).await)
            };
            handles.push(tokio::spawn(task.in_current_span()));
        }

        let mut results = Vec::with_capacity(calls.len());
        for (call, handle) in calls.iter().zip(handles) {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => batch_failure(call, &e),
                Err(join_error) => {
                    let cause = if join_error.is_panic() {
                        panic_message(&*join_error.into_panic())
                    } else {
                        join_error.to_string()
                    };
                    batch_failure(call, &AgentError::Dispatch(cause))
                }
            };
            results.push(result);
        }

        results
    }
}

fn batch_failure(call: &ToolCall, error: &AgentError) -> ToolResult {
    tracing::error!(tool = %call.name, call_id = %call.id, error = %error, "Unhandled failure while dispatching tool");
    ToolResult::failure(
        call,
        format!(
            "Unhandled exception during execution of tool '{}': {error}",
            call.name
        ),
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tool panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{multiply_registry, PanickingTool, SleepTool};
    use crate::tool::ToolRegistry;

    fn dispatcher(registry: ToolRegistry) -> ToolDispatcher {
        let invoker = ToolInvoker::new(Arc::new(registry), Telemetry::disabled());
        ToolDispatcher::new(invoker, Telemetry::disabled())
    }

    /// Later calls finish first: delay shrinks with the index
    fn staggered_calls(n: usize) -> Vec<ToolCall> {
        (0..n)
            .map(|i| {
                let delay = (n - i) * 10;
                ToolCall::new(format!("call-{i}"), "sleep", format!(r#"{{"delay_ms": {delay}}}"#))
            })
            .collect()
    }

    #[tokio::test]
    async fn results_follow_call_order_for_any_cap() {
        let calls = staggered_calls(6);

        for cap in [0, 1, 2, 3, 6, 10] {
            let sleeper = SleepTool::new();
            let mut registry = ToolRegistry::new();
            registry.register(sleeper.clone());

            let results = dispatcher(registry).dispatch(&calls, cap).await;

            assert_eq!(results.len(), calls.len(), "cap {cap}");
            for (call, result) in calls.iter().zip(&results) {
                assert_eq!(result.call_id, call.id, "cap {cap}");
                assert!(!result.is_error, "{}", result.content);
            }
        }
    }

    #[tokio::test]
    async fn sequential_dispatch_never_overlaps() {
        let sleeper = SleepTool::new();
        let mut registry = ToolRegistry::new();
        registry.register(sleeper.clone());

        let calls = staggered_calls(4);
        dispatcher(registry).dispatch(&calls, 1).await;

        let mut intervals = sleeper.intervals();
        assert_eq!(intervals.len(), 4);
        intervals.sort_by_key(|(start, _)| *start);
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "intervals overlap: {pair:?}");
        }
        assert_eq!(sleeper.max_in_flight(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_cap_is_respected() {
        let sleeper = SleepTool::new();
        let mut registry = ToolRegistry::new();
        registry.register(sleeper.clone());

        let calls: Vec<ToolCall> = (0..8)
            .map(|i| ToolCall::new(format!("call-{i}"), "sleep", r#"{"delay_ms": 30}"#))
            .collect();
        let results = dispatcher(registry).dispatch(&calls, 3).await;

        assert_eq!(results.len(), 8);
        assert!(sleeper.max_in_flight() <= 3);
        assert!(sleeper.max_in_flight() > 1, "batch never ran concurrently");
    }

    #[tokio::test]
    async fn cap_matching_batch_runs_every_call_at_once() {
        let sleeper = SleepTool::new();
        let mut registry = ToolRegistry::new();
        registry.register(sleeper.clone());

        let calls: Vec<ToolCall> = (0..4)
            .map(|i| ToolCall::new(format!("call-{i}"), "sleep", r#"{"delay_ms": 50}"#))
            .collect();
        dispatcher(registry).dispatch(&calls, 4).await;

        assert_eq!(sleeper.max_in_flight(), 4);
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let mut registry = multiply_registry();
        registry.register(PanickingTool);

        let calls = vec![
            ToolCall::new("a", "multiply", r#"{"a": 2, "b": 3}"#),
            ToolCall::new("b", "panic", "{}"),
            ToolCall::new("c", "missing", "{}"),
            ToolCall::new("d", "multiply", "not json"),
            ToolCall::new("e", "multiply", r#"{"a": 4, "b": 5}"#),
        ];
        let dispatcher = dispatcher(registry);

        for cap in [1, 3] {
            let results = dispatcher.dispatch(&calls, cap).await;

            assert_eq!(results.len(), 5);
            let flags: Vec<bool> = results.iter().map(|r| r.is_error).collect();
            assert_eq!(flags, vec![false, true, true, true, false], "cap {cap}");
            assert!(results[1].content.contains("Unhandled exception"));
            assert!(results[1].content.contains("tool panic"));
            assert_eq!(results[1].call_id, "b");
            assert!(results[4].content.contains("20"));
        }
    }

    #[tokio::test]
    async fn empty_batch_yields_no_results() {
        let results = dispatcher(multiply_registry()).dispatch(&[], 4).await;
        assert!(results.is_empty());
    }
}
