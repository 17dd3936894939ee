use crate::pipeline::summary::SummaryError;
use thiserror::Error;

/// Main error type for the pipeline.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::XlsError),

    // Pipeline errors
    #[error("{0}")]
    SummaryError(#[from] SummaryError),
}

/// Recoverable failure categories reported to the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input could not be decoded into a table
    Parse,
    /// A summary request referenced missing or empty selections
    Validation,
    /// A selected sum column is not numeric
    Configuration,
}

impl SheetError {
    /// Classifies the error for display by the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetError::SummaryError(error) if error.is_configuration() => ErrorKind::Configuration,
            SheetError::SummaryError(_) => ErrorKind::Validation,
            _ => ErrorKind::Parse,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetError::WithContextError(format!("{}: {}", message, e)))
    }
}
