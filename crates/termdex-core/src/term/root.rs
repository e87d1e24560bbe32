use crate::{
    term::{
        SerializedTerm, TermCreateMetadata, TermError, TermMetadata, serialize_term_with_metadata,
    },
    value::Value,
};

/// Value of the correlated-root-array sentinel.
pub const CORRELATED_ROOT_ARRAY_KIND: i32 = 1;

///
/// RootTerm
///
/// Terms not derived from a document value. All but the undefined-value
/// terms use the empty path, which no document path can produce.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RootTerm {
    /// Legacy root term (MinKey). Kept unmarked for compatibility.
    Root,
    /// Placeholder for a path with no value.
    ValueUndefined,
    /// Placeholder for a path missing in some array elements only.
    ValueMaybeUndefined,
    Exists,
    NonExists,
    /// Document has an array along an indexed path.
    MultiKey,
    /// Document has at least one truncated term.
    Truncated,
    /// Document terms were generated per correlated array element.
    CorrelatedRootArray,
}

impl RootTerm {
    pub fn serialize(self, create: &TermCreateMetadata) -> Result<SerializedTerm, TermError> {
        let (path, value, metadata) = match self {
            Self::Root => ("", Value::MinKey, TermMetadata::NoMetadata),
            Self::ValueUndefined => (
                create.path_prefix.as_str(),
                Value::Undefined,
                TermMetadata::UndefinedValue,
            ),
            Self::ValueMaybeUndefined => (
                create.path_prefix.as_str(),
                Value::Undefined,
                TermMetadata::PartialUndefinedValue,
            ),
            Self::Exists => ("", Value::Bool(true), TermMetadata::IsMetadata),
            Self::NonExists => ("", Value::Undefined, TermMetadata::IsMetadata),
            Self::MultiKey => ("", Value::Array(Vec::new()), TermMetadata::IsMetadata),
            Self::Truncated => ("", Value::MaxKey, TermMetadata::Truncated),
            Self::CorrelatedRootArray => (
                "",
                Value::Int32(CORRELATED_ROOT_ARRAY_KIND),
                TermMetadata::IsMetadata,
            ),
        };

        serialize_term_with_metadata(path, &value, create, metadata)
    }
}
