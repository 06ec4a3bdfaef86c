use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Result that is a wrapper of `Result<T, icefloe::Error>`
pub type Result<T> = std::result::Result<T, Error>;

/// ErrorKind is all kinds of Error of icefloe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// icefloe don't know what happened here, and no actions other than
    /// just returning it back. For example, opendal returns an internal
    /// service error.
    Unexpected,
    /// Table metadata or configuration is invalid.
    ///
    /// This error is returned when we failed to parse a metadata file, a
    /// table property or a predicate that doesn't fit the table schema.
    DataInvalid,
    /// Requested feature is not supported.
    FeatureUnsupported,
    /// The table moved under us between reading the base and swapping the
    /// metadata pointer.
    ///
    /// This is the only retryable kind. The commit coordinator retries it
    /// internally and never surfaces it unless the caller talks to a
    /// catalog directly.
    CommitConflict,
    /// A commit can't be completed: retries are exhausted, or a concurrent
    /// change broke an invariant of the pending operation.
    CommitFailed,
    /// A precondition requested by the caller doesn't hold at commit time.
    ValidationFailed,
    /// A manifest list or manifest could not be read while planning.
    PlanningIoFailure,
    /// A manifest entry doesn't match the partition spec recorded for its
    /// manifest.
    MalformedManifest,
    /// Table is not known by the catalog.
    NoSuchTable,
    /// Table is already known by the catalog.
    TableAlreadyExists,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::DataInvalid => "DataInvalid",
            ErrorKind::FeatureUnsupported => "FeatureUnsupported",
            ErrorKind::CommitConflict => "CommitConflict",
            ErrorKind::CommitFailed => "CommitFailed",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::PlanningIoFailure => "PlanningIoFailure",
            ErrorKind::MalformedManifest => "MalformedManifest",
            ErrorKind::NoSuchTable => "NoSuchTable",
            ErrorKind::TableAlreadyExists => "TableAlreadyExists",
        }
    }
}

/// Error is the error struct returned by all icefloe functions.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "    {k}: {v}")?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source: {source:?}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),

            context: Vec::default(),
            source: None,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");

        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failed action may succeed if tried again against a
    /// refreshed table.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::CommitConflict
    }
}

impl From<serde_json::Error> for Error {
    fn from(v: serde_json::Error) -> Self {
        Self::new(ErrorKind::Unexpected, "handling json data failed").set_source(v)
    }
}

impl From<opendal::Error> for Error {
    fn from(v: opendal::Error) -> Self {
        Self::new(ErrorKind::Unexpected, "IO operation failed").set_source(v)
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(v: derive_builder::UninitializedFieldError) -> Self {
        Self::new(
            ErrorKind::DataInvalid,
            format!("required field `{}` is not set", v.field_name()),
        )
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use once_cell::sync::Lazy;

    use super::*;

    static TEST_ERROR: Lazy<Error> = Lazy::new(|| Error {
        kind: ErrorKind::CommitFailed,
        message: "retries exhausted".to_string(),
        context: vec![
            ("table", "db.events".to_string()),
            ("attempts", "5".to_string()),
        ],
        source: Some(anyhow!("metadata pointer moved")),
    });

    #[test]
    fn test_error_display() {
        let s = format!("{}", Lazy::force(&TEST_ERROR));
        assert_eq!(
            s,
            r#"CommitFailed, context: { table: db.events, attempts: 5 } => retries exhausted, source: metadata pointer moved"#
        )
    }

    #[test]
    fn test_error_debug() {
        let s = format!("{:?}", Lazy::force(&TEST_ERROR));
        assert_eq!(
            s,
            r#"CommitFailed => retries exhausted

Context:
    table: db.events
    attempts: 5

Source: metadata pointer moved
"#
        )
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(Error::new(ErrorKind::CommitConflict, "").is_retryable());
        assert!(!Error::new(ErrorKind::CommitFailed, "").is_retryable());
        assert!(!Error::new(ErrorKind::ValidationFailed, "").is_retryable());
    }
}
