//! Validation issues and the non-empty issue list.

use std::fmt;

/// One segment of the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single problem reported by a schema.
///
/// # Examples
///
/// ```
/// use robust_fetch::schema::{PathSegment, ValidationIssue};
///
/// let issue = ValidationIssue::new("must be a string").at(["users"]).push(0usize).push("email");
///
/// assert_eq!(issue.message(), "must be a string");
/// assert_eq!(issue.path()[1], PathSegment::Index(0));
/// assert_eq!(issue.to_string(), "users[0].email: must be a string");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    message: String,
    path: Vec<PathSegment>,
}

impl ValidationIssue {
    /// An issue at the document root.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    /// Replace the path.
    pub fn at<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Append one segment to the path.
    pub fn push(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Prefix the path with `segment`, for issues raised by a nested check.
    pub fn nested_in(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path segments from the root; empty for a root-level issue.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return f.write_str(&self.message);
        }
        for (i, segment) in self.path.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// A list of [`ValidationIssue`]s guaranteed to hold at least one entry.
///
/// An invalid result with zero issues cannot be built, so "invalid" always
/// means "here is what was wrong".
///
/// # Examples
///
/// ```
/// use robust_fetch::schema::{Issues, ValidationIssue};
///
/// let mut issues = Issues::single(ValidationIssue::new("missing id"));
/// issues.push(ValidationIssue::new("missing name"));
///
/// assert_eq!(issues.len(), 2);
/// assert_eq!(issues.first().message(), "missing id");
/// assert!(Issues::from_vec(Vec::new()).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issues {
    head: ValidationIssue,
    tail: Vec<ValidationIssue>,
}

impl Issues {
    /// A list holding one issue.
    pub fn single(issue: ValidationIssue) -> Self {
        Self {
            head: issue,
            tail: Vec::new(),
        }
    }

    /// Build from a `Vec`; `None` if it is empty.
    pub fn from_vec(mut issues: Vec<ValidationIssue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            let head = issues.remove(0);
            Some(Self { head, tail: issues })
        }
    }

    /// The first issue (always present).
    pub fn first(&self) -> &ValidationIssue {
        &self.head
    }

    /// Number of issues; never zero.
    pub fn len(&self) -> usize {
        1 + self.tail.len()
    }

    /// Always false; present for API symmetry with `Vec`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append an issue.
    pub fn push(&mut self, issue: ValidationIssue) {
        self.tail.push(issue);
    }

    /// Append all issues from `other`, keeping order.
    pub fn combine(mut self, other: Issues) -> Self {
        self.tail.push(other.head);
        self.tail.extend(other.tail);
        self
    }

    /// Iterate in order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        std::iter::once(&self.head).chain(self.tail.iter())
    }

    /// Convert into a plain `Vec`.
    pub fn into_vec(self) -> Vec<ValidationIssue> {
        let mut all = Vec::with_capacity(self.len());
        all.push(self.head);
        all.extend(self.tail);
        all
    }

    /// Prefix every issue's path with `segment`.
    pub fn nested_in(self, segment: impl Into<PathSegment>) -> Self {
        let segment = segment.into();
        Self {
            head: self.head.nested_in(segment.clone()),
            tail: self
                .tail
                .into_iter()
                .map(|issue| issue.nested_in(segment.clone()))
                .collect(),
        }
    }
}

impl From<ValidationIssue> for Issues {
    fn from(issue: ValidationIssue) -> Self {
        Issues::single(issue)
    }
}

impl IntoIterator for Issues {
    type Item = ValidationIssue;
    type IntoIter = std::vec::IntoIter<ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl PartialEq<Vec<ValidationIssue>> for Issues {
    fn eq(&self, other: &Vec<ValidationIssue>) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}
