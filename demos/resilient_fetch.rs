//! Resilient Fetch Example
//!
//! Demonstrates the attempt loop against a scripted transport.
//! Shows practical patterns including:
//! - Retrying transient failures with exponential backoff
//! - Observing retries through the `on_retry` hook and tracing
//! - Bounding a hanging server with a per-attempt timeout
//! - Cancelling from the caller's side
//! - Validating the response body with a schema

use std::time::Duration;

use robust_fetch::prelude::*;
use robust_fetch::testing::{ScriptedTransport, Step};
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ==================== Retries ====================

/// Example 1: Transient failures
///
/// Two 503s, then a success. The hook and the tracing subscriber both see
/// every retry.
async fn example_retries() {
    println!("\n=== Example 1: Retries ===");

    let transport = ScriptedTransport::new([
        Step::status(503),
        Step::fail(TransportError::message("connection reset")),
        Step::text(200, "hello"),
    ]);
    let options = FetchOptions::new()
        .with_retry(RetryPolicy::exponential(3, Duration::from_millis(50)))
        .on_retry(|event| {
            println!(
                "attempt {} failed ({}), retrying in {:?}",
                event.attempt,
                event.failure.describe(),
                event.next_delay
            )
        });

    match robust_fetch(&transport, "https://api.example.test/hello", &options).await {
        Ok(response) => println!("Got {}: {:?}", response.status(), response.body()),
        Err(err) => println!("Failed: {}", err),
    }
}

// ==================== Timeouts ====================

/// Example 2: A server that never answers
async fn example_timeout() {
    println!("\n=== Example 2: Timeouts ===");

    let transport = ScriptedTransport::repeating(Step::Hang);
    let options = FetchOptions::new()
        .with_timeout(Duration::from_millis(100))
        .with_retry(RetryPolicy::linear(1, Duration::from_millis(10)));

    let err = robust_fetch(&transport, "/slow", &options).await.unwrap_err();
    println!("Error: {} (kind {:?})", err, err.kind());
}

// ==================== Cancellation ====================

/// Example 3: The caller gives up
async fn example_cancellation() {
    println!("\n=== Example 3: Cancellation ===");

    let shutdown = CancellationToken::new();
    let transport = ScriptedTransport::repeating(Step::status(503));
    let options = FetchOptions::new()
        .with_retry(RetryPolicy::linear(10, Duration::from_secs(1)))
        .with_cancellation(shutdown.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        shutdown.cancel();
    });

    let err = robust_fetch(&transport, "/", &options).await.unwrap_err();
    println!("Error: {} after {} calls", err, transport.calls());
}

// ==================== Validation ====================

/// Example 4: Accumulating schema issues
async fn example_validation() {
    println!("\n=== Example 4: Validation ===");

    let transport = ScriptedTransport::new([Step::json(200, &json!({"name": "", "age": -1}))]);
    let person = schema::from_fn(|value: serde_json::Value| {
        let name = match value["name"].as_str() {
            Some(name) if !name.is_empty() => Validation::valid(name.to_string()),
            _ => Validation::invalid(ValidationIssue::new("must not be empty").at(["name"])),
        };
        let age = match value["age"].as_i64() {
            Some(age) if age >= 0 => Validation::valid(age),
            _ => Validation::invalid(ValidationIssue::new("must be non-negative").at(["age"])),
        };
        name.and(age)
    });

    match robust_fetch_validated(&transport, "/person", &FetchOptions::new(), &person).await {
        Ok(response) => println!("Valid: {:?}", response.body()),
        Err(err) => {
            println!("Rejected: {}", err);
            for issue in err.issues().into_iter().flat_map(|issues| issues.iter()) {
                println!("  - {}", issue);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    println!("Resilient Fetch Examples");
    println!("========================");

    example_retries().await;
    example_timeout().await;
    example_cancellation().await;
    example_validation().await;

    println!("\n=== All examples completed successfully! ===");
}
