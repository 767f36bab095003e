use thiserror::Error;

/// Errors from parsing, conversion, and rendering.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("SQL parse error: {0}")]
    Parse(String),

    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    #[error("unsupported SQL construct: {0}")]
    Unsupported(String),

    #[error("render error: {0}")]
    Render(String),
}

impl SqlError {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        SqlError::Unsupported(what.into())
    }
}
