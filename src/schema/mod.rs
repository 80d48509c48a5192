//! Response validation.
//!
//! A [`Schema`] inspects the parsed JSON body of a successful response and
//! either hands back a validated (possibly transformed) value or a non-empty
//! list of [`ValidationIssue`]s.
//!
//! Schemas may be synchronous or asynchronous; both are driven through the
//! same future-returning trait:
//!
//! - [`from_fn`]: wrap a plain closure
//! - [`from_async`]: wrap a closure returning a future
//! - [`from_deserialize`]: accept anything that deserializes into `T`
//!
//! # Example
//!
//! ```rust
//! use robust_fetch::schema::{self, Schema, Validation, ValidationIssue};
//! use serde_json::json;
//!
//! let age = schema::from_fn(|value: serde_json::Value| match value["age"].as_i64() {
//!     Some(age) if age >= 0 => Validation::valid(age),
//!     Some(_) => Validation::invalid(ValidationIssue::new("must be non-negative").at(["age"])),
//!     None => Validation::invalid(ValidationIssue::new("required").at(["age"])),
//! });
//!
//! # tokio_test::block_on(async {
//! assert_eq!(age.validate(json!({"age": 30})).await, Validation::Valid(30));
//! assert!(age.validate(json!({"age": -1})).await.is_invalid());
//! # });
//! ```

mod issue;
mod validation;

use std::error::Error as StdError;
use std::fmt;
use std::future::{ready, Future};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use issue::{Issues, PathSegment, ValidationIssue};
pub use validation::Validation;

use crate::transport::Response;

/// Validates a parsed response body.
pub trait Schema: Send + Sync {
    /// The validated value.
    type Output: Send;

    /// Validate `value`.
    fn validate(&self, value: Value) -> impl Future<Output = Validation<Self::Output>> + Send;
}

impl<S: Schema + ?Sized> Schema for &S {
    type Output = S::Output;

    fn validate(&self, value: Value) -> impl Future<Output = Validation<Self::Output>> + Send {
        (**self).validate(value)
    }
}

/// A schema backed by a synchronous closure. See [`from_fn`].
pub struct FnSchema<F> {
    check: F,
}

/// Wrap a synchronous closure as a [`Schema`].
pub fn from_fn<F, T>(check: F) -> FnSchema<F>
where
    F: Fn(Value) -> Validation<T> + Send + Sync,
    T: Send,
{
    FnSchema { check }
}

impl<F, T> Schema for FnSchema<F>
where
    F: Fn(Value) -> Validation<T> + Send + Sync,
    T: Send,
{
    type Output = T;

    fn validate(&self, value: Value) -> impl Future<Output = Validation<T>> + Send {
        ready((self.check)(value))
    }
}

impl<F> fmt::Debug for FnSchema<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema").finish_non_exhaustive()
    }
}

/// A schema backed by an asynchronous closure. See [`from_async`].
pub struct AsyncFnSchema<F> {
    check: F,
}

/// Wrap a closure returning a future as a [`Schema`].
///
/// ```rust
/// use robust_fetch::schema::{self, Schema, Validation};
/// use serde_json::json;
///
/// let lookup = schema::from_async(|value: serde_json::Value| async move {
///     tokio::task::yield_now().await;
///     Validation::valid(value["id"].as_u64().unwrap_or_default())
/// });
///
/// # tokio_test::block_on(async {
/// assert_eq!(lookup.validate(json!({"id": 9})).await, Validation::Valid(9));
/// # });
/// ```
pub fn from_async<F, Fut, T>(check: F) -> AsyncFnSchema<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Validation<T>> + Send,
    T: Send,
{
    AsyncFnSchema { check }
}

impl<F, Fut, T> Schema for AsyncFnSchema<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Validation<T>> + Send,
    T: Send,
{
    type Output = T;

    fn validate(&self, value: Value) -> impl Future<Output = Validation<T>> + Send {
        (self.check)(value)
    }
}

impl<F> fmt::Debug for AsyncFnSchema<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnSchema").finish_non_exhaustive()
    }
}

/// A schema that accepts any body deserializing into `T`. See [`from_deserialize`].
pub struct DeserializeSchema<T> {
    _target: PhantomData<fn() -> T>,
}

/// Accept bodies that deserialize into `T`.
///
/// A deserialization failure becomes a single root-level issue carrying the
/// deserializer's message.
///
/// ```rust
/// use robust_fetch::schema::{self, Schema};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct User { id: u64 }
///
/// let users = schema::from_deserialize::<User>();
/// # tokio_test::block_on(async {
/// assert!(users.validate(json!({"id": 1})).await.is_valid());
/// assert!(users.validate(json!({"id": "one"})).await.is_invalid());
/// # });
/// ```
pub fn from_deserialize<T: DeserializeOwned + Send>() -> DeserializeSchema<T> {
    DeserializeSchema {
        _target: PhantomData,
    }
}

impl<T: DeserializeOwned + Send> Schema for DeserializeSchema<T> {
    type Output = T;

    fn validate(&self, value: Value) -> impl Future<Output = Validation<T>> + Send {
        ready(match serde_json::from_value(value) {
            Ok(typed) => Validation::Valid(typed),
            Err(error) => Validation::invalid(ValidationIssue::new(error.to_string())),
        })
    }
}

impl<T> fmt::Debug for DeserializeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeserializeSchema<{}>", std::any::type_name::<T>())
    }
}

/// Why the validation pipeline did not produce a value.
#[derive(Debug)]
pub enum SchemaError {
    /// The body is not well-formed JSON. This is a transport-level problem,
    /// never reported as a validation issue.
    Malformed(serde_json::Error),
    /// The schema rejected the body.
    Rejected(Issues),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed response body: {}", e),
            Self::Rejected(issues) => write!(f, "response failed validation: {}", issues),
        }
    }
}

impl StdError for SchemaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Malformed(e) => Some(e),
            Self::Rejected(_) => None,
        }
    }
}

/// Parse `response`'s body and run it through `schema`.
///
/// On success the returned response carries the validated value as its body,
/// with the original status and headers.
///
/// ```rust
/// use robust_fetch::schema::{self, validate_response, Validation};
/// use robust_fetch::Response;
///
/// # tokio_test::block_on(async {
/// let response = Response::new(200, r#"{"name":"Ada"}"#).with_header("etag", "v1");
/// let names = schema::from_fn(|value: serde_json::Value| {
///     Validation::valid(value["name"].as_str().unwrap_or_default().to_uppercase())
/// });
///
/// let validated = validate_response(response, &names).await.unwrap();
/// assert_eq!(validated.body(), "ADA");
/// assert_eq!(validated.header("etag"), Some("v1"));
/// # });
/// ```
pub async fn validate_response<S>(
    response: Response,
    schema: &S,
) -> Result<Response<S::Output>, SchemaError>
where
    S: Schema + ?Sized,
{
    let value = response.body().json_value().map_err(SchemaError::Malformed)?;

    match schema.validate(value).await {
        Validation::Valid(validated) => Ok(response.map_body(|_| validated)),
        Validation::Invalid(issues) => Err(SchemaError::Rejected(issues)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn non_negative_age() -> impl Schema<Output = Value> {
        from_fn(|value: Value| match value.get("age").and_then(Value::as_i64) {
            Some(age) if age < 0 => {
                Validation::invalid(ValidationIssue::new("must be non-negative").at(["age"]))
            }
            _ => Validation::valid(value),
        })
    }

    #[tokio::test]
    async fn test_rejection_keeps_issues_verbatim() {
        let response = Response::new(200, r#"{"age": -1}"#);
        match validate_response(response, &non_negative_age()).await {
            Err(SchemaError::Rejected(issues)) => {
                assert_eq!(
                    issues,
                    vec![ValidationIssue::new("must be non-negative").at(["age"])]
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_an_issue() {
        let response = Response::new(200, "{not json");
        let result = validate_response(response, &non_negative_age()).await;
        assert!(matches!(result, Err(SchemaError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_empty_body_is_malformed() {
        let response = Response::new(204, "");
        let result = validate_response(response, &non_negative_age()).await;
        assert!(matches!(result, Err(SchemaError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_success_preserves_status_and_headers() {
        let response = Response::new(201, r#"{"age": 4}"#).with_header("x-trace", "t1");
        let validated = validate_response(response, &non_negative_age()).await.unwrap();
        assert_eq!(validated.status(), 201);
        assert_eq!(validated.header("x-trace"), Some("t1"));
        assert_eq!(validated.body(), &json!({"age": 4}));
    }

    #[tokio::test]
    async fn test_async_schema_is_awaited() {
        let schema = from_async(|value: Value| async move {
            tokio::task::yield_now().await;
            match value.as_array() {
                Some(items) => Validation::valid(items.len()),
                None => Validation::invalid(ValidationIssue::new("expected array")),
            }
        });
        let response = Response::new(200, "[1, 2, 3]");
        let validated = validate_response(response, &schema).await.unwrap();
        assert_eq!(validated.into_body(), 3);
    }

    #[tokio::test]
    async fn test_deserialize_schema_coerces() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Item {
            id: u32,
        }

        let response = Response::new(200, r#"{"id": 5, "extra": true}"#);
        let validated = validate_response(response, &from_deserialize::<Item>())
            .await
            .unwrap();
        assert_eq!(validated.into_body(), Item { id: 5 });
    }

    #[tokio::test]
    async fn test_deserialize_schema_rejects_wrong_shape() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Item {
            id: u32,
        }

        let response = Response::new(200, r#"{"id": "five"}"#);
        let result = validate_response(response, &from_deserialize::<Item>()).await;
        match result {
            Err(SchemaError::Rejected(issues)) => {
                assert_eq!(issues.len(), 1);
                assert!(issues.first().path().is_empty());
            }
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::Rejected(Issues::single(ValidationIssue::new("bad")));
        assert_eq!(err.to_string(), "response failed validation: bad");
    }
}
