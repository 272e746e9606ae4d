//! Channel filter model and matcher.
//!
//! # Responsibility
//! - Parse HTTP-style query pairs into a typed channel filter.
//! - Match channels against name, tag and property globs.
//!
//! # Invariants
//! - Globs are compiled into anchored patterns; only `*` and `?` are special.
//! - Alternatives inside one value (comma separated) are OR-ed; separate
//!   filters are AND-ed.
//! - Pagination (`from`, then `size`) applies after filtering, on name order.

use crate::model::entity::Channel;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const NAME_KEY: &str = "~name";
const TAG_KEY: &str = "~tag";
const SIZE_KEY: &str = "~size";
const FROM_KEY: &str = "~from";

pub type QueryResult<T> = Result<T, QueryError>;

/// Channel query parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// `~size` or `~from` is not a non-negative integer.
    InvalidNumber { key: &'static str, value: String },
    /// Reserved `~` key that this matcher does not know.
    UnknownKey(String),
    /// Glob could not be compiled.
    InvalidPattern(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` expects a non-negative integer, got `{value}`")
            }
            Self::UnknownKey(key) => write!(f, "unknown query key `{key}`"),
            Self::InvalidPattern(message) => write!(f, "invalid pattern: {message}"),
        }
    }
}

impl Error for QueryError {}

/// Comma-separated glob alternatives compiled into one anchored pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    pattern: Regex,
}

impl Glob {
    /// Compiles `source`; an empty source matches anything.
    pub fn parse(source: &str) -> QueryResult<Self> {
        let alternatives: Vec<String> = source
            .split(',')
            .map(str::trim)
            .filter(|alternative| !alternative.is_empty())
            .map(glob_to_regex)
            .collect();
        let body = if alternatives.is_empty() {
            ".*".to_string()
        } else {
            alternatives.join("|")
        };
        let pattern = Regex::new(&format!("^(?:{body})$"))
            .map_err(|err| QueryError::InvalidPattern(err.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Channel filter.
#[derive(Debug, Clone, Default)]
pub struct ChannelQuery {
    names: Vec<Glob>,
    tags: Vec<Glob>,
    properties: Vec<(String, Glob)>,
    size: Option<usize>,
    from: usize,
}

impl ChannelQuery {
    /// Query matching every channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from transport query pairs.
    ///
    /// `~name`, `~tag`, `~size` and `~from` are reserved; any other key
    /// filters on the property of that name.
    pub fn from_pairs<I, K, V>(pairs: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref());
            query = match key {
                NAME_KEY => query.with_name(value)?,
                TAG_KEY => query.with_tag(value)?,
                SIZE_KEY => query.with_size(parse_number(SIZE_KEY, value)?),
                FROM_KEY => query.with_from(parse_number(FROM_KEY, value)?),
                reserved if reserved.starts_with('~') => {
                    return Err(QueryError::UnknownKey(reserved.to_string()))
                }
                property => query.with_property(property, value)?,
            };
        }
        Ok(query)
    }

    pub fn with_name(mut self, pattern: &str) -> QueryResult<Self> {
        self.names.push(Glob::parse(pattern)?);
        Ok(self)
    }

    /// Requires a tag whose name matches `pattern`.
    pub fn with_tag(mut self, pattern: &str) -> QueryResult<Self> {
        self.tags.push(Glob::parse(pattern)?);
        Ok(self)
    }

    /// Requires property `name` with a value matching `pattern`.
    pub fn with_property(mut self, name: &str, pattern: &str) -> QueryResult<Self> {
        self.properties
            .push((name.to_string(), Glob::parse(pattern)?));
        Ok(self)
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        self.names.iter().all(|glob| glob.is_match(&channel.name))
            && self
                .tags
                .iter()
                .all(|glob| channel.tags.iter().any(|tag| glob.is_match(&tag.name)))
            && self.properties.iter().all(|(name, glob)| {
                channel
                    .property(name)
                    .map_or(false, |property| glob.is_match(&property.value))
            })
    }

    /// Filters `channels` and applies pagination.
    pub fn apply<I>(&self, channels: I) -> Vec<Channel>
    where
        I: IntoIterator<Item = Channel>,
    {
        let matched = channels
            .into_iter()
            .filter(|channel| self.matches(channel))
            .skip(self.from);
        match self.size {
            Some(size) => matched.take(size).collect(),
            None => matched.collect(),
        }
    }
}

fn parse_number(key: &'static str, value: &str) -> QueryResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}
