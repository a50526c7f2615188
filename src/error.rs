use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Timestamp regression: got {got}s after {last}s")]
    TimestampRegression { last: f64, got: f64 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_display() {
        let err = Error::TimestampRegression {
            last: 2.5,
            got: 1.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("2.5"));
        assert!(msg.contains("1"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Json(_) => {}
            _ => panic!("Expected Json error"),
        }
    }
}
