use crate::value::{Value, tag::ValueTag};

///
/// Canonical Value Rank
///
/// Cross-type sort bracket. Undefined and null share a bracket, as do all
/// numeric types and text/symbol.
///
/// IMPORTANT:
/// Rank order is part of the index sort contract and must remain fixed.
///
#[must_use]
pub const fn canonical_rank(value: &Value) -> u8 {
    tag_rank(value.tag())
}

/// Rank of a wire tag.
#[must_use]
pub const fn tag_rank(tag: ValueTag) -> u8 {
    match tag {
        ValueTag::MinKey => 0,
        ValueTag::Undefined | ValueTag::Null => 1,
        ValueTag::Int32 | ValueTag::Int64 | ValueTag::Double | ValueTag::Decimal128 => 2,
        ValueTag::Text | ValueTag::Symbol => 3,
        ValueTag::Document => 4,
        ValueTag::Array => 5,
        ValueTag::Binary => 6,
        ValueTag::ObjectId => 7,
        ValueTag::Bool => 8,
        ValueTag::DateTime => 9,
        ValueTag::Timestamp => 10,
        ValueTag::Regex => 11,
        ValueTag::DbPointer => 12,
        ValueTag::Code => 13,
        ValueTag::CodeWithScope => 14,
        ValueTag::MaxKey => 15,
    }
}
