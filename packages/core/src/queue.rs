//! Queue selection for workers.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Queue name that stands for every known queue.
pub const WILDCARD: &str = "*";

/// Ordered set of queue names a worker polls.
///
/// Earlier names take precedence when several queues have work ready. A
/// single `*` entry means "all queues", resolved by the backend at
/// reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueSet(Vec<String>);

impl QueueSet {
    /// Build a queue set from explicit names, dropping blanks and duplicates.
    pub fn new<I, S>(names: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queues: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || queues.iter().any(|q| q == name) {
                continue;
            }
            queues.push(name.to_string());
        }

        if queues.is_empty() {
            return Err(CoreError::NoQueues);
        }
        Ok(Self(queues))
    }

    /// Parse a comma separated list such as `"high, low"`.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        Self::new(list.split(','))
    }

    /// The queue set matching every queue.
    pub fn all() -> Self {
        Self(vec![WILDCARD.to_string()])
    }

    /// Whether this set polls every known queue.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|q| q == WILDCARD)
    }

    /// The configured names in priority order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Expand against the queues a backend knows about.
    ///
    /// Wildcard sets resolve to every known queue sorted by name; explicit
    /// sets are returned as configured.
    pub fn resolve<I, S>(&self, known: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_wildcard() {
            let mut all: Vec<String> = known.into_iter().map(Into::into).collect();
            all.sort();
            all.dedup();
            all
        } else {
            self.0.clone()
        }
    }
}

impl Default for QueueSet {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Display for QueueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl std::str::FromStr for QueueSet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
