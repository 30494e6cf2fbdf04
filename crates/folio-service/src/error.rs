//! Service-layer error type.

use folio_core::FolioError;
use folio_portfolio::csv_format::CsvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Domain(#[from] FolioError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Taxonomy name, matching [`FolioError::kind`] for domain errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Migrate(_) => "repository_error",
            Self::Domain(e) => e.kind(),
            Self::Csv(_) => "validation_error",
            Self::Io(_) => "io_error",
        }
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&FolioError> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CsvError> for ServiceError {
    fn from(e: CsvError) -> Self {
        match e {
            CsvError::Csv(e) => Self::Csv(e),
            CsvError::Io(e) => Self::Io(e),
            other => Self::Domain(other.into()),
        }
    }
}

impl From<folio_core::CanonicalizationError> for ServiceError {
    fn from(e: folio_core::CanonicalizationError) -> Self {
        Self::Domain(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let e = ServiceError::from(FolioError::NotFound("x".into()));
        assert_eq!(e.kind(), "not_found_error");
        assert!(e.as_domain().is_some());
        let db = ServiceError::from(sqlx::Error::RowNotFound);
        assert_eq!(db.kind(), "repository_error");
        assert!(db.as_domain().is_none());
    }

    #[test]
    fn bad_csv_cells_are_validation_errors() {
        let e = ServiceError::from(CsvError::MissingColumn("ticker"));
        assert_eq!(e.kind(), "validation_error");
    }
}
