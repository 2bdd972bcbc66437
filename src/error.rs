#![warn(missing_docs)]
//! Geometry specific error structures
use std::{error::Error, fmt::Display};

/// Result type used throughout the geometry construction.
pub type GeomResult<T> = std::result::Result<T, GeomError>;

/// Errors that can be returned while building or exporting the geometry.
#[derive(Debug, PartialEq, Eq)]
pub enum GeomError {
    /// invalid user input or metadata that cannot be turned into a consistent geometry
    /// (sparse strings, duplicate fiber slots, malformed source specs, unknown names, ...)
    Configuration(String),
    /// the hardware metadata source is unavailable or its content could not be read
    Metadata(String),
    /// the requested configuration is valid but not supported (yet)
    NotImplemented(String),
    /// misuse of the volume registry, e.g. duplicate names or invalid solid parameters
    Registry(String),
    /// errors while writing or reading GDML files
    Gdml(String),
    /// errors console io
    Console(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for GeomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(m) => {
                write!(f, "Configuration:{m}")
            }
            Self::Metadata(m) => {
                write!(f, "Metadata:{m}")
            }
            Self::NotImplemented(m) => {
                write!(f, "NotImplemented:{m}")
            }
            Self::Registry(m) => {
                write!(f, "Registry:{m}")
            }
            Self::Gdml(m) => {
                write!(f, "Gdml:{m}")
            }
            Self::Console(m) => {
                write!(f, "Console:{m}")
            }
            Self::Other(m) => write!(f, "Geometry Error:Other:{m}"),
        }
    }
}
impl Error for GeomError {}

impl std::convert::From<String> for GeomError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn from() {
        let error = GeomError::from("test".to_string());
        assert_eq!(error, GeomError::Other("test".to_string()));
    }
    #[test]
    fn display() {
        assert_eq!(
            format!("{}", GeomError::Configuration("test".to_string())),
            "Configuration:test"
        );
        assert_eq!(
            format!("{}", GeomError::Metadata("test".to_string())),
            "Metadata:test"
        );
        assert_eq!(
            format!("{}", GeomError::NotImplemented("test".to_string())),
            "NotImplemented:test"
        );
        assert_eq!(
            format!("{}", GeomError::Registry("test".to_string())),
            "Registry:test"
        );
        assert_eq!(format!("{}", GeomError::Gdml("test".to_string())), "Gdml:test");
        assert_eq!(
            format!("{}", GeomError::Console("test".to_string())),
            "Console:test"
        );
        assert_eq!(
            format!("{}", GeomError::Other("test".to_string())),
            "Geometry Error:Other:test"
        );
    }
    #[test]
    fn debug() {
        assert_eq!(
            format!("{:?}", GeomError::Configuration("test".to_string())),
            "Configuration(\"test\")"
        );
        assert_eq!(
            format!("{:?}", GeomError::Other("test".to_string())),
            "Other(\"test\")"
        );
    }
}
