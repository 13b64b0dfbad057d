use reqwest::StatusCode;
use thiserror::Error;

/// Failure modes of the extraction engine.
///
/// Transport and status failures keep the URL that was being fetched;
/// structural failures describe the markup feature that went missing.
/// Nothing is retried internally, every failure propagates to the
/// caller as one of these kinds.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// An expected structural anchor (ranking table, AQI container,
    /// search payload shape) was not found in the response.
    #[error("{0}")]
    Parse(String),

    /// The resolver parsed the index fine but no record matches.
    #[error("no city in the provider index matches {query:?}")]
    NotFound { query: String },

    /// The caller passed input the engine refuses to work with.
    #[error("{0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_url_and_code() {
        let err = ScrapeError::Status {
            url: "https://www.iqair.com/world-air-quality-ranking".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        let text = err.to_string();
        assert!(text.contains("world-air-quality-ranking"));
        assert!(text.contains("503"));
    }

    #[test]
    fn not_found_error_quotes_the_query() {
        let err = ScrapeError::NotFound {
            query: "atlantis".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no city in the provider index matches \"atlantis\""
        );
    }

    #[test]
    fn parse_error_is_verbatim() {
        let err = ScrapeError::Parse("ranking page contains no qualifying table".to_string());
        assert_eq!(err.to_string(), "ranking page contains no qualifying table");
    }
}
