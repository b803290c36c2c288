/// Failure taxonomy for the backing store. Persistence failures surface to
/// the caller without retries inside the core; timeouts are reported
/// distinctly so callers can tell a slow store from a broken one.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("store call timed out")]
    Timeout,
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            other => StoreError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_renders_without_a_fabricated_duration() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Timeout));
        assert_eq!(err.to_string(), "store call timed out");
    }
}
