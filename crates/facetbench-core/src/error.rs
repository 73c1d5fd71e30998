use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Record source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Index storage failure while {context}: {source}")]
    StorageIo {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Strategies disagree on facet '{dimension}': {}", render_divergences(.divergences))]
    EquivalenceViolation {
        dimension: String,
        divergences: Vec<Divergence>,
    },
}

impl Error {
    pub fn storage<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::StorageIo { context: context.into(), source: Box::new(source) }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::storage("accessing the filesystem", e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// One rank at which the embedded-category and columnar-ordinal results differ.
/// `None` means that side returned fewer entries than the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub rank: usize,
    pub embedded: Option<(String, u64)>,
    pub columnar: Option<(String, u64)>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |entry: &Option<(String, u64)>| match entry {
            Some((label, count)) => format!("{label:?}={count}"),
            None => "<missing>".to_string(),
        };
        write!(
            f,
            "#{} embedded {} vs columnar {}",
            self.rank + 1,
            side(&self.embedded),
            side(&self.columnar)
        )
    }
}

fn render_divergences(divergences: &[Divergence]) -> String {
    divergences.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_violation_lists_each_mismatch() {
        let err = Error::EquivalenceViolation {
            dimension: "authors".into(),
            divergences: vec![
                Divergence { rank: 0, embedded: Some(("Alice".into(), 2)), columnar: Some(("Alice".into(), 3)) },
                Divergence { rank: 1, embedded: Some(("Bob".into(), 1)), columnar: None },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("'authors'"));
        assert!(msg.contains("#1 embedded \"Alice\"=2 vs columnar \"Alice\"=3"));
        assert!(msg.contains("#2 embedded \"Bob\"=1 vs columnar <missing>"));
    }
}
