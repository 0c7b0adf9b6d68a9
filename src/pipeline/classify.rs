//! Result classification: stage outcome → [`ExtractionResult`].

use crate::error::StageError;
use crate::output::{ExtractionResult, Failure, Table};
use tracing::warn;

/// Wrap the outcome of the pipeline stages.
///
/// A table with zero rows is a success. A stage failure is passed through
/// with its kind, message and diagnostics untouched.
pub fn classify(outcome: Result<Table, StageError>) -> ExtractionResult {
    match outcome {
        Ok(table) => ExtractionResult::Success { table },
        Err(err) => {
            warn!("Extraction failed [{}/{}]: {}", err.kind(), err.category(), err.message());
            ExtractionResult::Failure(Failure::from(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::FailureKind;

    #[test]
    fn empty_table_is_success() {
        let r = classify(Ok(Table::default()));
        assert!(r.is_success());
        assert_eq!(r.table().map(Table::row_count), Some(0));
    }

    #[test]
    fn failure_detail_is_preserved_verbatim() {
        let err = StageError::Recognition {
            category: "LanguageDataMissing".into(),
            message: "Failed loading language 'kor'".into(),
            trace: "Error opening data file ...\nFailed loading language 'kor'\n".into(),
        };
        let r = classify(Err(err.clone()));
        let f = r.failure().expect("failure");
        assert_eq!(f.kind, FailureKind::RecognitionError);
        assert_eq!(f.message, err.message());
        assert_eq!(f.diagnostics.category, err.category());
        assert_eq!(f.diagnostics.trace, err.trace());
        assert!(r.table().is_none());
    }
}
