//! The validator result type.

use super::issue::{Issues, ValidationIssue};

/// Outcome of validating a value: the validated value or the issues found.
///
/// Exactly one arm is ever populated. Unlike `Result`, combining validations
/// with [`and`](Validation::and) accumulates issues from both sides instead of
/// stopping at the first failure, so a schema can report everything wrong
/// with a payload at once.
///
/// # Examples
///
/// ```
/// use robust_fetch::schema::{Validation, ValidationIssue};
///
/// fn positive(field: &str, n: i64) -> Validation<i64> {
///     if n >= 0 {
///         Validation::valid(n)
///     } else {
///         Validation::invalid(ValidationIssue::new("must be non-negative").at([field]))
///     }
/// }
///
/// let both = positive("age", -1).and(positive("score", -5));
/// assert_eq!(both.issues().map(|issues| issues.len()), Some(2));
///
/// let ok = positive("age", 30).and(positive("score", 7));
/// assert_eq!(ok.into_result().ok(), Some((30, 7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation<T> {
    /// The validated, possibly transformed, value.
    Valid(T),
    /// One or more issues.
    Invalid(Issues),
}

impl<T> Validation<T> {
    /// A valid result.
    #[inline]
    pub fn valid(value: T) -> Self {
        Validation::Valid(value)
    }

    /// An invalid result with one or more issues.
    #[inline]
    pub fn invalid(issues: impl Into<Issues>) -> Self {
        Validation::Invalid(issues.into())
    }

    /// Build from a `Result` whose error is already a non-empty issue list.
    #[inline]
    pub fn from_result(result: Result<T, Issues>) -> Self {
        match result {
            Ok(value) => Validation::Valid(value),
            Err(issues) => Validation::Invalid(issues),
        }
    }

    /// Normalize a loosely-shaped validator output.
    ///
    /// Some validators report a value and an issue list side by side. Issues
    /// take precedence: a value that arrives together with issues is
    /// discarded. Returns `None` when neither is present.
    ///
    /// ```
    /// use robust_fetch::schema::{Validation, ValidationIssue};
    ///
    /// let mixed = Validation::from_parts(Some(1), vec![ValidationIssue::new("bad")]);
    /// assert!(mixed.unwrap().is_invalid());
    ///
    /// let empty = Validation::<i32>::from_parts(None, Vec::new());
    /// assert!(empty.is_none());
    /// ```
    pub fn from_parts(value: Option<T>, issues: Vec<ValidationIssue>) -> Option<Self> {
        match (Issues::from_vec(issues), value) {
            (Some(issues), _) => Some(Validation::Invalid(issues)),
            (None, Some(value)) => Some(Validation::Valid(value)),
            (None, None) => None,
        }
    }

    /// Convert to a `Result`.
    #[inline]
    pub fn into_result(self) -> Result<T, Issues> {
        match self {
            Validation::Valid(value) => Ok(value),
            Validation::Invalid(issues) => Err(issues),
        }
    }

    /// Returns true for [`Validation::Valid`].
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    /// Returns true for [`Validation::Invalid`].
    #[inline]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Validation::Invalid(_))
    }

    /// The issues, if invalid.
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Validation::Valid(_) => None,
            Validation::Invalid(issues) => Some(issues),
        }
    }

    /// Transform the valid value.
    pub fn map<U, F>(self, f: F) -> Validation<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Validation::Valid(value) => Validation::Valid(f(value)),
            Validation::Invalid(issues) => Validation::Invalid(issues),
        }
    }

    /// Prefix every issue's path, for reusing a schema on a nested field.
    pub fn nested_in(self, segment: impl Into<super::PathSegment>) -> Self {
        match self {
            Validation::Valid(value) => Validation::Valid(value),
            Validation::Invalid(issues) => Validation::Invalid(issues.nested_in(segment)),
        }
    }

    /// Combine two validations, accumulating issues from both.
    pub fn and<U>(self, other: Validation<U>) -> Validation<(T, U)> {
        match (self, other) {
            (Validation::Valid(a), Validation::Valid(b)) => Validation::Valid((a, b)),
            (Validation::Invalid(a), Validation::Invalid(b)) => Validation::Invalid(a.combine(b)),
            (Validation::Invalid(issues), Validation::Valid(_))
            | (Validation::Valid(_), Validation::Invalid(issues)) => Validation::Invalid(issues),
        }
    }

    /// Chain a dependent check; stops at the first invalid step.
    pub fn and_then<U, F>(self, f: F) -> Validation<U>
    where
        F: FnOnce(T) -> Validation<U>,
    {
        match self {
            Validation::Valid(value) => f(value),
            Validation::Invalid(issues) => Validation::Invalid(issues),
        }
    }

    /// Combine many validations of the same type, accumulating every issue.
    ///
    /// ```
    /// use robust_fetch::schema::{Validation, ValidationIssue};
    ///
    /// let all = Validation::all(vec![
    ///     Validation::valid(1),
    ///     Validation::invalid(ValidationIssue::new("first").at([1usize])),
    ///     Validation::invalid(ValidationIssue::new("second").at([2usize])),
    /// ]);
    /// assert_eq!(all.issues().map(|issues| issues.len()), Some(2));
    /// ```
    pub fn all<I>(validations: I) -> Validation<Vec<T>>
    where
        I: IntoIterator<Item = Validation<T>>,
    {
        let mut values = Vec::new();
        let mut issues: Option<Issues> = None;

        for validation in validations {
            match validation {
                Validation::Valid(value) => values.push(value),
                Validation::Invalid(found) => {
                    issues = Some(match issues {
                        Some(existing) => existing.combine(found),
                        None => found,
                    });
                }
            }
        }

        match issues {
            Some(issues) => Validation::Invalid(issues),
            None => Validation::Valid(values),
        }
    }
}

impl<T> From<Validation<T>> for Result<T, Issues> {
    fn from(validation: Validation<T>) -> Self {
        validation.into_result()
    }
}
