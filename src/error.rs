use serde::de::StdError;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;

/// Library error: an [InnerError] plus a stack of human-readable context
/// lines collected on the way out.
#[derive(Debug)]
pub struct Error {
    context: Vec<String>,
    pub inner: InnerError,
}

impl<E> From<E> for Error
where
    E: Into<InnerError>,
{
    fn from(e: E) -> Self {
        Error {
            context: vec![],
            inner: e.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.inner)?;
        for ctx in &self.context {
            write!(f, "\n  {}", ctx)?;
        }
        Ok(())
    }
}

impl StdError for Error {}

pub trait ContextualError {
    fn with_context<S: Into<String>>(self, ctx: S) -> Error;
}
pub trait ContextualResult<T, E> {
    fn with_context<S: Into<String>>(self, ctx: S) -> Result<T, Error>;
}

impl<T> ContextualError for T
where
    T: Into<InnerError>,
{
    fn with_context<S: Into<String>>(self, ctx: S) -> Error {
        Error {
            context: vec![ctx.into()],
            inner: self.into(),
        }
    }
}

impl<T, E> ContextualResult<T, E> for Result<T, E>
where
    E: Into<InnerError>,
{
    fn with_context<S: Into<String>>(self, ctx: S) -> Result<T, Error> {
        self.map_err(|e| e.into().with_context(ctx))
    }
}

impl ContextualError for Error {
    fn with_context<S: Into<String>>(mut self, ctx: S) -> Error {
        self.context.push(ctx.into());
        self
    }
}

impl<T> ContextualResult<T, Error> for Result<T, Error> {
    fn with_context<S: Into<String>>(self, ctx: S) -> Result<T, Error> {
        self.map_err(|e| e.with_context(ctx))
    }
}

#[derive(Debug)]
pub enum InnerError {
    /// The PostgreSQL grammar rejected the input. Fail-fast, never skipped.
    SqlParse(pg_query::Error),
    Io(std::io::Error),
    NotValidUtf8,
    InvalidRiskLevel(String),
    InvalidFormat(String),
    InvalidOutputFormat(String),
    BadStatsFile(String),
    BadSnapshotFile(String),
    BadCommentInstruction(String),
    AstShape(String),
    InvalidNumber(ParseIntError),
    InvalidDuration(String),
    PluginIdCollision(String),
    PluginIdMissingPrefix(String),
    MissingUpMigration(String),
    PostgresError(postgres::Error),
    SerdeError(serde_json::Error),
    Template(handlebars::RenderError),
}

impl From<serde_json::Error> for InnerError {
    fn from(value: serde_json::Error) -> Self {
        InnerError::SerdeError(value)
    }
}

impl From<ParseIntError> for InnerError {
    fn from(value: ParseIntError) -> Self {
        InnerError::InvalidNumber(value)
    }
}

impl From<postgres::Error> for InnerError {
    fn from(value: postgres::Error) -> Self {
        InnerError::PostgresError(value)
    }
}

impl From<pg_query::Error> for InnerError {
    fn from(e: pg_query::Error) -> Self {
        InnerError::SqlParse(e)
    }
}

impl From<std::io::Error> for InnerError {
    fn from(e: std::io::Error) -> Self {
        InnerError::Io(e)
    }
}

impl From<handlebars::RenderError> for InnerError {
    fn from(e: handlebars::RenderError) -> Self {
        InnerError::Template(e)
    }
}
