//! [`Transport`] backed by a `reqwest::Client`.

use tokio_util::sync::CancellationToken;

use super::{Body, Method, Request, Response, Transport, TransportError};

/// Sends requests through a shared `reqwest::Client`.
///
/// The client is cheap to clone; keep one per process and hand references to
/// the fetch entry points. Client-level timeouts are unnecessary since every
/// attempt is already bounded by the orchestrator.
///
/// # Examples
///
/// ```rust,no_run
/// use robust_fetch::{robust_fetch, FetchOptions, ReqwestTransport, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let transport = ReqwestTransport::new();
/// let options = FetchOptions::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryPolicy::exponential(3, Duration::from_millis(200)));
///
/// let response = robust_fetch(&transport, "https://example.com", &options).await;
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = self.client.request(to_reqwest_method(request.method()), request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.as_bytes().to_vec());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = convert_headers(response.headers());
        let bytes = response.bytes().await.map_err(classify)?;

        Ok(Response::from_parts(status, headers, Body::from(Vec::from(bytes))))
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &Request,
        signal: CancellationToken,
    ) -> Result<Response, TransportError> {
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(TransportError::Cancelled),
            result = self.exchange(request) => result,
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

// Non-UTF-8 header values are kept, lossily decoded.
fn convert_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        TransportError::connect(error)
    } else if error.is_body() || error.is_request() {
        TransportError::io(error)
    } else if error.is_decode() {
        TransportError::malformed_body(error)
    } else {
        TransportError::other(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(Method::Options), reqwest::Method::OPTIONS);
    }

    #[test]
    fn test_non_utf8_header_is_kept() {
        use reqwest::header::{HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.insert("x-legacy", HeaderValue::from_bytes(b"caf\xe9").unwrap());

        let converted = convert_headers(&headers);

        assert_eq!(converted.len(), 2);
        assert!(converted.contains(&("content-type".to_string(), "text/plain".to_string())));
        assert!(converted.contains(&("x-legacy".to_string(), "caf\u{fffd}".to_string())));
    }

    #[tokio::test]
    async fn test_cancelled_signal_short_circuits() {
        let transport = ReqwestTransport::new();
        let signal = CancellationToken::new();
        signal.cancel();

        let result = transport
            .send(&Request::get("http://127.0.0.1:9/never"), signal)
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new();
        let result = transport
            .send(
                &Request::get("http://127.0.0.1:9/closed"),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Connect(_) | TransportError::Io(_) | TransportError::Other(_))
        ));
    }
}
