use crate::term::TermError;

/// First byte of a composite blob. Never appears as a sub-term metadata byte.
pub const COMPOSITE_MARKER: u8 = 0x04;

const DESCENDING_BIT: u8 = 0x80;

///
/// TermMetadata
///
/// Leading byte of every single-path term.
///
/// IMPORTANT:
/// Values are persisted and several are not independent bits. Map through
/// `to_u8`/`from_u8`, never by masking.
///

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TermMetadata {
    NoMetadata = 0x00,
    Truncated = 0x01,
    IsMetadata = 0x02,
    UndefinedValue = 0x08,
    PartialUndefinedValue = 0x0C,
    Descending = 0x80,
    DescendingTruncated = 0x81,
    DescendingUndefinedValue = 0x88,
    DescendingPartialUndefinedValue = 0x8C,
}

impl TermMetadata {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(byte: u8) -> Result<Self, TermError> {
        let metadata = match byte {
            0x00 => Self::NoMetadata,
            0x01 => Self::Truncated,
            0x02 => Self::IsMetadata,
            0x08 => Self::UndefinedValue,
            0x0C => Self::PartialUndefinedValue,
            0x80 => Self::Descending,
            0x81 => Self::DescendingTruncated,
            0x88 => Self::DescendingUndefinedValue,
            0x8C => Self::DescendingPartialUndefinedValue,
            other => return Err(TermError::UnknownMetadata(other)),
        };

        Ok(metadata)
    }

    /// Descending counterpart. Sentinel metadata terms keep their byte.
    pub const fn to_descending(self) -> Result<Self, TermError> {
        match self {
            Self::NoMetadata => Ok(Self::Descending),
            Self::Truncated => Ok(Self::DescendingTruncated),
            Self::UndefinedValue => Ok(Self::DescendingUndefinedValue),
            Self::PartialUndefinedValue => Ok(Self::DescendingPartialUndefinedValue),
            Self::IsMetadata => Ok(Self::IsMetadata),
            other => Err(TermError::UnexpectedDescendingMetadata(other.to_u8())),
        }
    }

    #[must_use]
    pub const fn is_descending(self) -> bool {
        self.to_u8() >= DESCENDING_BIT
    }

    #[must_use]
    pub const fn is_metadata(self) -> bool {
        matches!(self, Self::IsMetadata)
    }

    #[must_use]
    pub const fn is_truncated(self) -> bool {
        matches!(self, Self::Truncated | Self::DescendingTruncated)
    }

    #[must_use]
    pub const fn is_value_undefined(self) -> bool {
        matches!(self, Self::UndefinedValue | Self::DescendingUndefinedValue)
    }

    #[must_use]
    pub const fn is_value_maybe_undefined(self) -> bool {
        matches!(
            self,
            Self::PartialUndefinedValue | Self::DescendingPartialUndefinedValue
        )
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_table_round_trips() {
        for byte in [0x00, 0x01, 0x02, 0x08, 0x0C, 0x80, 0x81, 0x88, 0x8C] {
            let metadata = TermMetadata::from_u8(byte).expect("known byte");
            assert_eq!(metadata.to_u8(), byte);
        }
    }

    #[test]
    fn composite_marker_is_not_term_metadata() {
        assert!(matches!(
            TermMetadata::from_u8(COMPOSITE_MARKER),
            Err(TermError::UnknownMetadata(COMPOSITE_MARKER))
        ));
    }

    #[test]
    fn descending_keeps_sentinels_and_rejects_descending_input() {
        assert_eq!(
            TermMetadata::Truncated.to_descending().expect("valid"),
            TermMetadata::DescendingTruncated
        );
        assert_eq!(
            TermMetadata::IsMetadata.to_descending().expect("valid"),
            TermMetadata::IsMetadata
        );
        assert!(TermMetadata::Descending.to_descending().is_err());
    }

    #[test]
    fn predicates_match_both_directions() {
        assert!(TermMetadata::DescendingTruncated.is_truncated());
        assert!(TermMetadata::DescendingUndefinedValue.is_value_undefined());
        assert!(TermMetadata::PartialUndefinedValue.is_value_maybe_undefined());
        assert!(!TermMetadata::IsMetadata.is_descending());
        assert!(TermMetadata::Descending.is_descending());
    }
}
