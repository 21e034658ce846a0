use thiserror::Error;

/// Block-local failures raised while turning a candidate block into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no day/month/year triple recognized in {input:?}")]
    InvalidDateFormat { input: String },

    #[error("{day:02}-{month:02}-{year:04} is not a calendar date")]
    ImpossibleDate { day: u32, month: u32, year: i32 },

    #[error("block has no subject heading")]
    MissingSubject,

    #[error("block body contains no date")]
    MissingDate,
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDateFormat { .. } => "invalid_date_format",
            Self::ImpossibleDate { .. } => "impossible_date",
            Self::MissingSubject => "missing_subject",
            Self::MissingDate => "missing_date",
        }
    }
}

/// Fatal store failures. Every rusqlite error surfaces as `Unavailable`.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {context}")]
    Unavailable {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

pub trait StorageContext<T> {
    fn storage_context<F>(self, context: F) -> Result<T, StorageError>
    where
        F: FnOnce() -> String;
}

impl<T> StorageContext<T> for Result<T, rusqlite::Error> {
    fn storage_context<F>(self, context: F) -> Result<T, StorageError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| StorageError::Unavailable {
            context: context(),
            source,
        })
    }
}
