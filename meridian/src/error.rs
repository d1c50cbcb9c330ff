//! Error types used by the crate.
//!
//! Every fallible operation returns an [`Error`]: an [`ErrorKind`] describing what went wrong at the
//! leaf, plus a list of context strings appended by every enclosing scope while the error travels
//! upwards. The leaf-most context comes first, so a failure deep inside a style reads like
//! `missing attribute 'color' in Stop in RasterColorizer in rule 'water' in map 'style.xml'`.

use std::fmt::{Display, Formatter};

use meridian_types::TypesError;
use thiserror::Error;

/// Kind of an [`Error`].
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Schema violation, unknown plugin type, missing attribute or element.
    #[error("{0}")]
    Config(String),
    /// A datasource failed to open or to run a query.
    #[error("datasource error: {0}")]
    Datasource(String),
    /// An image or a font referenced by the style could not be loaded.
    #[error("failed to load resource '{resource}': {reason}")]
    ResourceLoad {
        /// Path or name of the resource.
        resource: String,
        /// Why loading failed.
        reason: String,
    },
    /// Projection parameters were not accepted by the projection engine.
    #[error("{0}")]
    ProjectionInit(#[from] TypesError),
    /// The document requires a newer version of the library.
    #[error("document requires version {required} or newer, but this is version {current}")]
    Version {
        /// Version declared in the document.
        required: String,
        /// Version of the library.
        current: String,
    },
    /// Error reading/writing data to the FS.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// Font loading or shaping error.
    #[error("font error: {0}")]
    Font(String),
}

/// Error with accumulated context.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

impl Error {
    /// Creates a new error without context.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
        }
    }

    /// Shortcut for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    /// Shortcut for a datasource error.
    pub fn datasource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Datasource(message.into()))
    }

    /// Shortcut for a resource loading error.
    pub fn resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLoad {
            resource: resource.into(),
            reason: reason.into(),
        })
    }

    /// Kind of the error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Context strings, leaf-most first.
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Appends the context of an enclosing scope.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Turns a datasource error into a configuration error, keeping the message and the context.
    ///
    /// Datasource failures during layer setup are reported as configuration problems.
    pub fn into_config(self) -> Self {
        let kind = match self.kind {
            ErrorKind::Datasource(message) => ErrorKind::Config(message),
            kind => kind,
        };

        Self {
            kind,
            context: self.context,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        for context in &self.context {
            write!(f, " {context}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<TypesError> for Error {
    fn from(value: TypesError) -> Self {
        Self::new(value.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(value.into())
    }
}

impl From<image::ImageError> for Error {
    fn from(value: image::ImageError) -> Self {
        Self::new(value.into())
    }
}

/// Adds context to results.
pub trait ResultExt<T> {
    /// Appends a context string to the error, if any.
    fn context(self, context: impl Into<String>) -> Result<T, Error>;

    /// Appends a lazily built context string to the error, if any.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, Error> {
        self.map_err(|err| Into::<Error>::into(err).with_context(context))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T, Error> {
        self.map_err(|err| Into::<Error>::into(err).with_context(f()))
    }
}
