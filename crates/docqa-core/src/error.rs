use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("No page marker resolves for a chunk of '{document}'")]
    MissingPageMarker { document: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True when `err` carries a [`Error::NotReady`] anywhere in its chain.
    pub fn is_not_ready(err: &anyhow::Error) -> bool {
        err.chain()
            .any(|cause| matches!(cause.downcast_ref::<Error>(), Some(Error::NotReady(_))))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_survives_context() {
        let err = anyhow::Error::new(Error::NotReady("vector index".into())).context("searching");
        assert!(Error::is_not_ready(&err));
        let other = anyhow::Error::new(Error::Operation("boom".into()));
        assert!(!Error::is_not_ready(&other));
    }
}
