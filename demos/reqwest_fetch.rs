//! Reqwest Fetch Example
//!
//! Fetches a real URL through `ReqwestTransport` with a timeout, retries on
//! server errors and a typed schema.
//!
//! ```text
//! cargo run --example reqwest_fetch --features reqwest -- https://httpbin.org/json
//! ```

use std::time::Duration;

use robust_fetch::prelude::*;
use robust_fetch::ReqwestTransport;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/json".to_string());

    // Ctrl-C cancels the fetch, including any retry wait.
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let transport = ReqwestTransport::new();
    let options = FetchOptions::new()
        .with_timeout(Duration::from_secs(10))
        .with_retry(
            RetryPolicy::exponential(3, Duration::from_millis(250))
                .with_max_delay(Duration::from_secs(2))
                .with_should_retry(|response, _| response.status() >= 500 || response.status() == 429),
        )
        .with_cancellation(shutdown);

    let request = Request::get(url).header("accept", "application/json");
    let json = schema::from_deserialize::<serde_json::Value>();

    match robust_fetch_validated(&transport, request, &options, &json).await {
        Ok(response) => {
            println!("status {}", response.status());
            println!("{:#}", response.body());
        }
        Err(err) => {
            eprintln!("fetch failed: {}", err);
            std::process::exit(1);
        }
    }
}
