use derive_more::Display;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured engine error with a stable internal classification.
/// Every module-level error converts into this shape at the host boundary.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a corruption error for a specific origin.
    pub(crate) fn corruption(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, origin, message)
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///
/// Configuration: limits or definitions that can never produce a valid term.
/// Encoding: a single value that cannot be encoded within its budget.
/// Integrity: scan state or term shape disagrees with the index definition.
/// Unsupported: a strategy or predicate the composite index cannot serve.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorClass {
    #[display("configuration")]
    Configuration,
    #[display("encoding")]
    Encoding,
    #[display("integrity")]
    Integrity,
    #[display("unsupported")]
    Unsupported,
    #[display("corruption")]
    Corruption,
    #[display("internal")]
    Internal,
}


///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorOrigin {
    #[display("value")]
    Value,
    #[display("term")]
    Term,
    #[display("generate")]
    Generate,
    #[display("query")]
    Query,
    #[display("scan")]
    Scan,
    #[display("options")]
    Options,
    #[display("serialize")]
    Serialize,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = InternalError::new(ErrorClass::Integrity, ErrorOrigin::Scan, "term count mismatch");

        assert_eq!(
            err.display_with_class(),
            "scan:integrity: term count mismatch"
        );
        assert_eq!(err.to_string(), "term count mismatch");
    }

    #[test]
    fn corruption_keeps_requested_origin() {
        let err = InternalError::corruption(ErrorOrigin::Value, "short buffer");

        assert_eq!(err.class, ErrorClass::Corruption);
        assert_eq!(err.origin, ErrorOrigin::Value);
        assert!(!err.is_configuration());
        assert!(!err.is_unsupported());
    }
}
