use thiserror::Error;

/// Top-level error type for the Tercih system.
///
/// Covers the failures that can happen outside a single dialogue turn:
/// loading configuration, reading catalog snapshots, and (de)serializing
/// them. The dialogue engine wraps these in its own `ChatError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TercihError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TercihError {
    fn from(err: toml::de::Error) -> Self {
        TercihError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TercihError {
    fn from(err: toml::ser::Error) -> Self {
        TercihError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TercihError {
    fn from(err: serde_json::Error) -> Self {
        TercihError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tercih operations.
pub type Result<T> = std::result::Result<T, TercihError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(TercihError, &str)> = vec![
            (
                TercihError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                TercihError::Catalog("empty snapshot".to_string()),
                "Catalog error: empty snapshot",
            ),
            (
                TercihError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_io_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err: TercihError = TercihError::from(io_err);
        match &err {
            TercihError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(err.is_err());
        let tercih_err: TercihError = err.unwrap_err().into();
        assert!(matches!(tercih_err, TercihError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(err.is_err());
        let tercih_err: TercihError = err.unwrap_err().into();
        assert!(matches!(tercih_err, TercihError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
