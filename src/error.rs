use thiserror::Error;

/// Failure to turn a schema document into a [`crate::schema::Schema`].
///
/// Compiling a `Schema` never fails; unsupported shapes fall back to generic encoding.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },

    #[error("array schema at {path} has no `items`")]
    MissingItems { path: String },

    #[error("`{keyword}` at {path} must not be empty")]
    EmptyComposition { keyword: &'static str, path: String },
}
