use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug)]
pub enum Error {
    /// A package id could not be mapped to a directory on any search root.
    PackageNotFound { package: String },
    /// A type name could not be found in the package it was looked up from.
    ModelNotFound { model: String, package: String },
    /// A qualified type name used an alias the package never imports.
    ImportNotFound { alias: String, package: String },
    /// A directive line did not match its grammar.
    MalformedDirective { directive: String, reason: String },
    /// A candidate function carries no directives at all.
    EmptyAnnotation,
    /// A resolution error raised while applying one directive.
    InDirective { directive: String, source: Box<Error> },
    /// A resolution error raised while parsing the comments of one function.
    InFunction {
        function: String,
        package: String,
        source: Box<Error>,
    },
    Io { path: PathBuf, source: std::io::Error },
    Parse { file: PathBuf, message: String },
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn malformed(directive: &str, reason: impl Into<String>) -> Self {
        Error::MalformedDirective {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors caused by a symbol or package that could not be resolved.
    pub fn is_resolution(&self) -> bool {
        match self {
            Error::PackageNotFound { .. }
            | Error::ModelNotFound { .. }
            | Error::ImportNotFound { .. } => true,
            Error::InDirective { source, .. } | Error::InFunction { source, .. } => {
                source.is_resolution()
            }
            _ => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedDirective { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::PackageNotFound { package } => {
                write!(f, "package '{}' not found on any search root", package)
            }
            Error::ModelNotFound { model, package } => {
                write!(f, "model '{}' not found from package '{}'", model, package)
            }
            Error::ImportNotFound { alias, package } => {
                write!(f, "package '{}' has no import named '{}'", package, alias)
            }
            Error::MalformedDirective { directive, reason } => {
                write!(f, "malformed directive '{}': {}", directive, reason)
            }
            Error::EmptyAnnotation => write!(f, "no directives found"),
            Error::InDirective { directive, source } => {
                write!(f, "directive '{}': {}", directive, source)
            }
            Error::InFunction {
                function,
                package,
                source,
            } => write!(f, "function {} in package '{}': {}", function, package, source),
            Error::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
            Error::Parse { file, message } => {
                write!(f, "parse error in {}: {}", file.display(), message)
            }
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::InDirective { source, .. } | Error::InFunction { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::InvalidArgument(format!("invalid regular expression: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_errors_are_detected_through_wrappers() {
        let err = Error::InFunction {
            function: "GetOrder".to_string(),
            package: "shop/api".to_string(),
            source: Box::new(Error::InDirective {
                directive: "@Success 200 {object} models.Missing".to_string(),
                source: Box::new(Error::ModelNotFound {
                    model: "models.Missing".to_string(),
                    package: "shop/api".to_string(),
                }),
            }),
        };

        assert!(err.is_resolution());
        assert!(!err.is_malformed());
        let message = err.to_string();
        assert!(message.contains("GetOrder"));
        assert!(message.contains("@Success 200"));
        assert!(message.contains("models.Missing"));
    }

    #[test]
    fn test_malformed_is_not_resolution() {
        let err = Error::malformed("@Param id", "expected at least four tokens");
        assert!(err.is_malformed());
        assert!(!err.is_resolution());
        assert_eq!(
            err.to_string(),
            "malformed directive '@Param id': expected at least four tokens"
        );
    }
}
