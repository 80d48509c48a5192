//! Request and response values exchanged with a [`Transport`](super::Transport).

use std::fmt;
use std::sync::Arc;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// The method name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, cheaply clonable byte buffer.
///
/// Unlike a streaming body, a `Body` can be read any number of times. Cloning
/// shares the underlying allocation, so a response can be inspected by a retry
/// predicate and still be parsed afterwards.
///
/// # Examples
///
/// ```
/// use robust_fetch::Body;
///
/// let body = Body::from(r#"{"ok":true}"#);
/// let copy = body.clone();
///
/// assert_eq!(body.as_bytes(), copy.as_bytes());
/// assert_eq!(body.text().unwrap(), r#"{"ok":true}"#);
/// assert_eq!(body.json_value().unwrap()["ok"], true);
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Body(Arc<[u8]>);

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the body.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the body holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret the body as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Parse the body as an untyped JSON document.
    pub fn json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    /// Deserialize the body as JSON into `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Ok(text) => write!(f, "Body({:?})", text),
            Err(_) => write!(f, "Body(<{} bytes>)", self.0.len()),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body(bytes.into())
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body(bytes.into())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body(text.into_bytes().into())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body(text.as_bytes().into())
    }
}

impl From<&serde_json::Value> for Body {
    fn from(value: &serde_json::Value) -> Self {
        Body(value.to_string().into_bytes().into())
    }
}

/// Ordered header list. Lookups are case-insensitive.
pub type Headers = Vec<(String, String)>;

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// The target of a fetch plus the options passed through to the transport.
///
/// # Examples
///
/// ```
/// use robust_fetch::{Method, Request};
///
/// let request = Request::post("https://api.example.com/users")
///     .header("content-type", "application/json")
///     .body(r#"{"name":"Ada"}"#);
///
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.header_value("Content-Type"), Some("application/json"));
///
/// // A bare URL is a GET request.
/// let request: Request = "https://api.example.com/health".into();
/// assert_eq!(request.method(), Method::Get);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Option<Body>,
}

impl Request {
    /// Create a request with an explicit method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Create a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Create a `PUT` request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    /// Create a `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First header value with the given name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The request body, if any.
    pub fn body_bytes(&self) -> Option<&Body> {
        self.body.as_ref()
    }
}

impl From<&str> for Request {
    fn from(url: &str) -> Self {
        Request::get(url)
    }
}

impl From<String> for Request {
    fn from(url: String) -> Self {
        Request::get(url)
    }
}

/// An immutable HTTP response.
///
/// The body type defaults to raw [`Body`] bytes. After validation the body is
/// replaced by the validated value while status and headers are preserved
/// (see [`Response::map_body`]).
///
/// # Examples
///
/// ```
/// use robust_fetch::Response;
///
/// let response = Response::new(503, "busy").with_header("retry-after", "2");
/// assert!(!response.is_success());
/// assert_eq!(response.header("Retry-After"), Some("2"));
///
/// let typed = response.map_body(|body| body.len());
/// assert_eq!(typed.status(), 503);
/// assert_eq!(*typed.body(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<B = Body> {
    status: u16,
    headers: Headers,
    body: B,
}

impl Response<Body> {
    /// Create a response from a status code and body bytes.
    pub fn new(status: u16, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

impl<B> Response<B> {
    /// Create a response from its parts.
    pub fn from_parts(status: u16, headers: Headers, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true for a status in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// All headers in received order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First header value with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Borrow the body.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Take the body, discarding status and headers.
    pub fn into_body(self) -> B {
        self.body
    }

    /// Replace the body while keeping status and headers.
    pub fn map_body<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(B) -> U,
    {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_reads_repeatedly() {
        let body = Body::from(r#"{"id": 7}"#);
        let first = body.json_value().unwrap();
        let second = body.json_value().unwrap();
        assert_eq!(first, second);
        assert_eq!(first["id"], 7);
    }

    #[test]
    fn test_body_json_deserializes_typed() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Item {
            id: u32,
            tags: Vec<String>,
        }

        let body = Body::from(r#"{"id": 7, "tags": ["a", "b"]}"#);
        let item: Item = body.json().unwrap();
        assert_eq!(
            item,
            Item {
                id: 7,
                tags: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert!(Body::from("[1, 2]").json::<Item>().is_err());
    }

    #[test]
    fn test_body_debug_for_binary() {
        let body = Body::from(vec![0xff, 0xfe]);
        assert_eq!(format!("{:?}", body), "Body(<2 bytes>)");
    }

    #[test]
    fn test_success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(Response::new(299, "").is_success());
        assert!(!Response::new(199, "").is_success());
        assert!(!Response::new(301, "").is_success());
        assert!(!Response::new(500, "").is_success());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = Response::new(200, "").with_header("X-Request-Id", "abc");
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn test_map_body_preserves_status_and_headers() {
        let response = Response::new(201, "created").with_header("location", "/users/1");
        let mapped = response.map_body(|_| 42);
        assert_eq!(mapped.status(), 201);
        assert_eq!(mapped.header("location"), Some("/users/1"));
        assert_eq!(mapped.into_body(), 42);
    }

    #[test]
    fn test_request_builder() {
        let request = Request::put("http://localhost/items/1")
            .header("authorization", "Bearer t")
            .body("payload");
        assert_eq!(request.method().as_str(), "PUT");
        assert_eq!(request.url(), "http://localhost/items/1");
        assert_eq!(request.body_bytes().map(Body::len), Some(7));
    }
}
