//! Integration tests for the attempt loop.
//!
//! These tests drive `robust_fetch` end to end through a scripted transport
//! on a paused clock, checking call counts, waits and terminal errors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use robust_fetch::prelude::*;
use robust_fetch::testing::{ScriptedTransport, Step};
use robust_fetch::{assert_fetch_err, assert_fetch_ok, Method};
use serde_json::json;
use tokio::time::Instant;

// ============================================================================
// Retry budget
// ============================================================================

#[tokio::test(start_paused = true)]
async fn sustained_failure_makes_exactly_n_plus_one_calls() {
    for attempts in [0, 1, 4] {
        let transport = ScriptedTransport::repeating(Step::status(503));
        let options =
            FetchOptions::new().with_retry(RetryPolicy::linear(attempts, Duration::from_millis(5)));

        let result = robust_fetch(&transport, "/flaky", &options).await;

        let err = assert_fetch_err!(result, FetchErrorKind::RetriesExhausted);
        assert_eq!(err.attempts(), Some(attempts + 1));
        assert_eq!(err.last_response().map(Response::status), Some(503));
        assert_eq!(transport.calls(), attempts + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn linear_policy_waits_between_each_call() {
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();
    let transport = ScriptedTransport::repeating(Step::status(500)).on_send({
        let stamps = stamps.clone();
        move || stamps.lock().unwrap().push(start.elapsed())
    });
    let options =
        FetchOptions::new().with_retry(RetryPolicy::linear(3, Duration::from_millis(50)));

    let _ = robust_fetch(&transport, "/", &options).await;

    let stamps = stamps.lock().unwrap().clone();
    assert_eq!(stamps.len(), 4);
    let gaps: Vec<_> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps, vec![Duration::from_millis(50); 3]);
}

#[tokio::test(start_paused = true)]
async fn exponential_policy_waits_grow() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport::repeating(Step::status(500));
    let options = FetchOptions::new()
        .with_retry(
            RetryPolicy::exponential(5, Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(1000)),
        )
        .on_retry({
            let delays = delays.clone();
            move |event| delays.lock().unwrap().push(event.next_delay.as_millis())
        });

    let started = Instant::now();
    let _ = robust_fetch(&transport, "/", &options).await;

    assert_eq!(*delays.lock().unwrap(), vec![100, 200, 400, 800, 1000]);
    assert_eq!(started.elapsed(), Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn predicate_false_stops_after_first_call() {
    let transport = ScriptedTransport::repeating(Step::status(500));
    let options = FetchOptions::new()
        .with_retry(RetryPolicy::linear(5, Duration::from_millis(10)).with_should_retry(|_, _| false));

    let err = assert_fetch_err!(
        robust_fetch(&transport, "/", &options).await,
        FetchErrorKind::RetriesExhausted
    );

    assert_eq!(err.attempts(), Some(1));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn predicate_can_select_retryable_statuses() {
    let transport = ScriptedTransport::new([Step::status(503), Step::status(404), Step::status(200)]);
    let options = FetchOptions::new().with_retry(
        RetryPolicy::linear(5, Duration::from_millis(10))
            .with_should_retry(|response, _| response.status() >= 500),
    );

    let err = assert_fetch_err!(
        robust_fetch(&transport, "/", &options).await,
        FetchErrorKind::RetriesExhausted
    );

    assert_eq!(err.last_response().map(Response::status), Some(404));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_script_same_outcome() {
    let script = || {
        ScriptedTransport::new([
            Step::status(502),
            Step::fail(TransportError::message("reset")),
            Step::Hang,
        ])
    };
    let options = FetchOptions::new()
        .with_timeout(Duration::from_millis(20))
        .with_retry(RetryPolicy::linear(2, Duration::from_millis(5)));

    let first = robust_fetch(&script(), "/", &options).await.unwrap_err();
    let second = robust_fetch(&script(), "/", &options).await.unwrap_err();

    assert_eq!(first.kind(), second.kind());
    assert_eq!(first.kind(), FetchErrorKind::TimeoutExceeded);
    assert_eq!(first.attempts(), second.attempts());
}

// ============================================================================
// Timeouts and transport failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_transport_is_bounded_by_timeout() {
    let transport = ScriptedTransport::repeating(Step::Hang);
    let options = FetchOptions::new().with_timeout(Duration::from_millis(250));

    let started = Instant::now();
    let err = assert_fetch_err!(
        robust_fetch(&transport, "/slow", &options).await,
        FetchErrorKind::TimeoutExceeded
    );

    assert_eq!(started.elapsed(), Duration::from_millis(250));
    assert!(matches!(
        err,
        FetchError::TimeoutExceeded { timeout, attempts: 1 } if timeout == Duration::from_millis(250)
    ));
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried() {
    let transport = ScriptedTransport::new([Step::Hang, Step::CancelAware, Step::text(200, "late")]);
    let options = FetchOptions::new()
        .with_timeout(Duration::from_millis(100))
        .with_retry(RetryPolicy::linear(2, Duration::ZERO));

    let response = assert_fetch_ok!(robust_fetch(&transport, "/", &options).await);

    assert_eq!(response.body().text().unwrap(), "late");
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_response_past_deadline_times_out() {
    let transport = ScriptedTransport::new([Step::status(200).after(Duration::from_secs(5))]);
    let options = FetchOptions::new().with_timeout(Duration::from_secs(1));

    assert_fetch_err!(
        robust_fetch(&transport, "/", &options).await,
        FetchErrorKind::TimeoutExceeded
    );
}

#[tokio::test]
async fn transport_failure_keeps_cause() {
    let transport = ScriptedTransport::repeating(Step::fail(TransportError::connect(
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
    )));

    let err = assert_fetch_err!(
        robust_fetch(&transport, "/", &FetchOptions::new()).await,
        FetchErrorKind::Transport
    );

    let cause = std::error::Error::source(&err).expect("transport error");
    assert!(cause.to_string().contains("refused"));
}

#[tokio::test]
async fn panicking_transport_is_an_error_not_a_panic() {
    let transport = ScriptedTransport::repeating(Step::Panic("driver bug".to_string()));

    let err = assert_fetch_err!(
        robust_fetch(&transport, "/", &FetchOptions::new()).await,
        FetchErrorKind::Transport
    );

    assert!(err.to_string().contains("driver bug"));
}

#[tokio::test(start_paused = true)]
async fn panicking_predicate_is_an_error_not_a_panic() {
    let transport = ScriptedTransport::repeating(Step::status(500));
    let options = FetchOptions::new().with_retry(
        RetryPolicy::linear(2, Duration::from_millis(1)).with_should_retry(|_, _| panic!("predicate bug")),
    );

    let err = assert_fetch_err!(
        robust_fetch(&transport, "/", &options).await,
        FetchErrorKind::Transport
    );

    assert!(err.to_string().contains("predicate bug"));
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(transport.calls(), 1);
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn every_attempt_sends_the_same_request() {
    let transport = ScriptedTransport::new([Step::status(500), Step::status(201)]);
    let request = Request::post("https://api.example.test/orders")
        .header("idempotency-key", "abc")
        .body(r#"{"qty":1}"#);
    let options = FetchOptions::new().with_retry(RetryPolicy::linear(1, Duration::ZERO));

    let response = assert_fetch_ok!(robust_fetch(&transport, request.clone(), &options).await);

    assert_eq!(response.status(), 201);
    let sent = transport.requests();
    assert_eq!(sent, vec![request.clone(), request]);
    assert_eq!(sent[0].method(), Method::Post);
}

#[tokio::test]
async fn hook_is_not_called_without_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let transport = ScriptedTransport::repeating(Step::status(500));
    let options = FetchOptions::new().on_retry({
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    });

    let _ = robust_fetch(&transport, "/", &options).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Validation
// ============================================================================

fn non_negative_age() -> impl Schema<Output = serde_json::Value> {
    schema::from_fn(|value: serde_json::Value| {
        match value.get("age").and_then(serde_json::Value::as_i64) {
            Some(age) if age < 0 => {
                Validation::invalid(ValidationIssue::new("must be non-negative").at(["age"]))
            }
            _ => Validation::valid(value),
        }
    })
}

#[tokio::test(start_paused = true)]
async fn validation_rejection_is_not_retried() {
    let transport = ScriptedTransport::repeating(Step::json(200, &json!({"age": -1})));
    let options = FetchOptions::new().with_retry(RetryPolicy::linear(3, Duration::from_millis(10)));

    let err = assert_fetch_err!(
        robust_fetch_validated(&transport, "/person", &options, &non_negative_age()).await,
        FetchErrorKind::ValidationRejected
    );

    let issues = err.issues().expect("issues");
    assert_eq!(
        *issues,
        vec![ValidationIssue::new("must be non-negative").at(["age"])]
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn validation_runs_after_retries() {
    let transport = ScriptedTransport::new([Step::status(503), Step::json(200, &json!({"age": 30}))]);
    let options = FetchOptions::new().with_retry(RetryPolicy::linear(1, Duration::from_millis(10)));

    let response = assert_fetch_ok!(
        robust_fetch_validated(&transport, "/person", &options, &non_negative_age()).await
    );

    assert_eq!(response.body()["age"], 30);
}

#[tokio::test]
async fn async_schema_is_awaited() {
    let transport = ScriptedTransport::new([Step::json(200, &json!(["a", "b"]))]);
    let counted = schema::from_async(|value: serde_json::Value| async move {
        tokio::task::yield_now().await;
        match value.as_array() {
            Some(items) => Validation::valid(items.len()),
            None => Validation::invalid(ValidationIssue::new("expected array")),
        }
    });

    let response = assert_fetch_ok!(
        robust_fetch_validated(&transport, "/", &FetchOptions::new(), &counted).await
    );

    assert_eq!(*response.body(), 2);
}

#[tokio::test]
async fn malformed_body_is_transport_error_not_validation() {
    let transport = ScriptedTransport::new([Step::text(200, "not json")]);

    let err = assert_fetch_err!(
        robust_fetch_validated(&transport, "/", &FetchOptions::new(), &non_negative_age()).await,
        FetchErrorKind::Transport
    );

    assert!(err.issues().is_none());
    assert!(matches!(
        err,
        FetchError::Transport { ref source, .. } if source.is_malformed_body()
    ));
}

#[tokio::test]
async fn non_success_response_is_never_validated() {
    let validated = Arc::new(AtomicU32::new(0));
    let transport = ScriptedTransport::new([Step::json(500, &json!({"age": 1}))]);
    let counting = schema::from_fn({
        let validated = validated.clone();
        move |value: serde_json::Value| {
            validated.fetch_add(1, Ordering::SeqCst);
            Validation::valid(value)
        }
    });

    assert_fetch_err!(
        robust_fetch_validated(&transport, "/", &FetchOptions::new(), &counting).await,
        FetchErrorKind::RetriesExhausted
    );
    assert_eq!(validated.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_fetches_share_nothing() {
    let transport = Arc::new(ScriptedTransport::repeating(Step::text(200, "ok")));
    let options = FetchOptions::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let transport = transport.clone();
            let options = options.clone();
            tokio::spawn(async move {
                robust_fetch(&transport, format!("/item/{}", i), &options).await
            })
        })
        .collect();

    for handle in handles {
        assert_fetch_ok!(handle.await.unwrap());
    }
    assert_eq!(transport.calls(), 8);
}
