//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Parse `/users/{id}/posts` style patterns into segments
//! - Match a request path against a compiled pattern
//! - Extract placeholder values in declaration order
//!
//! # Design Decisions
//! - Segment comparison only, no regex (O(segments) per match)
//! - Anchored: every path segment must be consumed
//! - No trailing-slash normalization (`/users` != `/users/`)
//! - Placeholder values are returned raw, not percent-decoded

use std::fmt;

use thiserror::Error;

/// Errors raised while compiling a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("pattern `{pattern}` has an empty placeholder name")]
    EmptyPlaceholder { pattern: String },

    #[error("pattern `{pattern}` has invalid placeholder name `{name}`")]
    InvalidPlaceholder { pattern: String, name: String },

    #[error("pattern `{pattern}` has a placeholder that is not a whole segment: `{segment}`")]
    PartialSegment { pattern: String, segment: String },

    #[error("pattern `{pattern}` declares placeholder `{name}` more than once")]
    DuplicatePlaceholder { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl Pattern {
    /// Compile a pattern string.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        };

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for part in rest.split('/') {
            let segment = Self::parse_segment(raw, part)?;
            if let Segment::Param(name) = &segment {
                if param_names.iter().any(|n| n == name) {
                    return Err(PatternError::DuplicatePlaceholder {
                        pattern: raw.to_string(),
                        name: name.clone(),
                    });
                }
                param_names.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            param_names,
        })
    }

    fn parse_segment(raw: &str, part: &str) -> Result<Segment, PatternError> {
        let has_braces = part.contains('{') || part.contains('}');
        if !has_braces {
            return Ok(Segment::Literal(part.to_string()));
        }

        let inner = part
            .strip_prefix('{')
            .and_then(|p| p.strip_suffix('}'))
            .filter(|name| !name.contains('{') && !name.contains('}'))
            .ok_or_else(|| PatternError::PartialSegment {
                pattern: raw.to_string(),
                segment: part.to_string(),
            })?;

        if inner.is_empty() {
            return Err(PatternError::EmptyPlaceholder {
                pattern: raw.to_string(),
            });
        }
        if !is_identifier(inner) {
            return Err(PatternError::InvalidPlaceholder {
                pattern: raw.to_string(),
                name: inner.to_string(),
            });
        }
        Ok(Segment::Param(inner.to_string()))
    }

    /// The pattern as it was registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in left-to-right order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a full request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = RouteParams::with_capacity(self.param_names.len());

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push(name.clone(), part.to_string());
                }
            }
        }

        // Leftover segments mean the path is longer than the pattern.
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ordered mapping of placeholder name to captured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    entries: Vec<(String, String)>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, name: String, value: String) {
        self.entries.push((name, value));
    }

    /// Value captured for `name`, if the pattern declared it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameter names in pattern order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
