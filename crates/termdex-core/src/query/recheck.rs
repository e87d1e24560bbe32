use crate::{
    obs::sink::{self, MetricsEvent},
    query::QueryError,
    term::IndexTerm,
    value::{Value, values_equal},
};
use regex::{Regex, RegexBuilder};

///
/// RecheckKind
///
/// Per-term filter evaluated against index values during the scan, for
/// predicates whose bounds alone over-approximate the match.
///

#[derive(Clone, Debug)]
pub enum RecheckKind {
    Regex { regex: Regex, is_negation: bool },
    Exists { exists: bool },
    Mod { divisor: i64, remainder: i64 },
    NotEqual { value: Value },
    Bits { op: BitsOp, mask: BitMask },
}

impl RecheckKind {
    /// Compile a `$regex` operand, either a regex value or a pattern string.
    pub fn regex(operand: &Value, is_negation: bool) -> Result<Self, QueryError> {
        let (pattern, options) = match operand {
            Value::Regex { pattern, options } => (pattern.as_str(), options.as_str()),
            Value::Text(pattern) => (pattern.as_str(), ""),
            other => {
                return Err(QueryError::InvalidOperand(format!(
                    "$regex has to be a string: {other}"
                )));
            }
        };

        Ok(Self::Regex {
            regex: compile_regex(pattern, options)?,
            is_negation,
        })
    }

    /// Parse a `$mod` operand `[divisor, remainder]`.
    pub fn modulo(operand: &Value) -> Result<Self, QueryError> {
        let Value::Array(items) = operand else {
            return Err(QueryError::InvalidOperand(
                "malformed mod, needs to be an array".to_string(),
            ));
        };

        let [divisor, remainder] = items.as_slice() else {
            return Err(QueryError::InvalidOperand(if items.len() < 2 {
                "malformed mod, not enough elements".to_string()
            } else {
                "malformed mod, too many elements".to_string()
            }));
        };

        let integral = |value: &Value, what: &str| {
            value
                .is_number()
                .then(|| value.as_i64_lossy())
                .flatten()
                .ok_or_else(|| {
                    QueryError::InvalidOperand(format!(
                        "malformed mod, {what} not a number: {value}"
                    ))
                })
        };

        let divisor = integral(divisor, "divisor")?;
        let remainder = integral(remainder, "remainder")?;
        if divisor == 0 {
            return Err(QueryError::InvalidOperand(
                "divisor cannot be 0".to_string(),
            ));
        }

        Ok(Self::Mod { divisor, remainder })
    }

    pub fn bits(op: BitsOp, operand: &Value) -> Result<Self, QueryError> {
        Ok(Self::Bits {
            op,
            mask: BitMask::parse(operand)?,
        })
    }
}

///
/// BitsOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BitsOp {
    AllClear,
    AnyClear,
    AllSet,
    AnySet,
}

///
/// BitMask
///
/// Bit positions named by a `$bits*` operand.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BitMask {
    pub positions: Vec<u32>,
}

impl BitMask {
    /// Accepts a non-negative integral number, an array of positions, or
    /// binary data.
    pub fn parse(operand: &Value) -> Result<Self, QueryError> {
        let positions = match operand {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_i64_exact()
                        .filter(|_| item.is_number())
                        .and_then(|p| u32::try_from(p).ok())
                        .ok_or_else(|| {
                            QueryError::InvalidOperand(format!(
                                "bit positions must be non-negative integers: {item}"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Binary { bytes, .. } => bytes
                .iter()
                .enumerate()
                .flat_map(|(i, byte)| {
                    (0..8u32)
                        .filter(move |bit| byte & (1 << bit) != 0)
                        .map(move |bit| u32::try_from(i * 8).unwrap_or(u32::MAX).saturating_add(bit))
                })
                .collect(),
            other if other.is_number() => {
                let mask = other
                    .as_i64_exact()
                    .and_then(|m| u64::try_from(m).ok())
                    .ok_or_else(|| {
                        QueryError::InvalidOperand(format!(
                            "bitmask must be a non-negative integer: {other}"
                        ))
                    })?;
                (0..64u32).filter(|bit| mask & (1 << bit) != 0).collect()
            }
            other => {
                return Err(QueryError::InvalidOperand(format!(
                    "value takes an Array, a number, or a BinData but received: {other}"
                )));
            }
        };

        Ok(Self { positions })
    }

    fn matches(&self, op: BitsOp, value: &Value) -> bool {
        let bit: Box<dyn Fn(u32) -> bool + '_> = match value {
            Value::Binary { bytes, .. } => Box::new(move |pos: u32| {
                usize::try_from(pos / 8)
                    .ok()
                    .and_then(|i| bytes.get(i))
                    .is_some_and(|byte| byte & (1 << (pos % 8)) != 0)
            }),
            number if number.is_number() => match number.as_i64_exact() {
                Some(v) => Box::new(move |pos: u32| {
                    if pos >= 64 { v < 0 } else { (v >> pos) & 1 == 1 }
                }),
                None => return false,
            },
            _ => return false,
        };

        let mut positions = self.positions.iter().copied();
        match op {
            BitsOp::AllClear => positions.all(|p| !bit(p)),
            BitsOp::AnyClear => positions.any(|p| !bit(p)),
            BitsOp::AllSet => positions.all(|p| bit(p)),
            BitsOp::AnySet => positions.any(|p| bit(p)),
        }
    }
}

/// Whether the value stored in `term` survives `recheck`.
///
/// Truncated terms pass value-based rechecks; the host re-evaluates the
/// full document.
#[must_use]
pub fn is_valid_recheck_for_index_value(term: &IndexTerm, recheck: &RecheckKind) -> bool {
    sink::record(MetricsEvent::Recheck);

    match recheck {
        RecheckKind::Regex { regex, is_negation } => {
            if term.is_truncated() {
                return true;
            }
            let is_match = match &term.value {
                Value::Text(text) | Value::Symbol(text) => regex.is_match(text),
                _ => false,
            };

            is_match != *is_negation
        }
        RecheckKind::Exists { exists } => term.is_value_undefined() != *exists,
        RecheckKind::Mod { divisor, remainder } => match &term.value {
            value if value.is_number() && value.as_f64().is_some_and(f64::is_finite) => value
                .as_i64_lossy()
                .is_some_and(|v| v.wrapping_rem(*divisor) == *remainder),
            _ => false,
        },
        RecheckKind::NotEqual { value } => {
            if term.is_truncated() {
                true
            } else if value.is_null() {
                // another element of the same document decides
                !term.is_value_maybe_undefined()
            } else {
                !values_equal(&term.value, value)
            }
        }
        RecheckKind::Bits { op, mask } => term.is_truncated() || mask.matches(*op, &term.value),
    }
}

fn compile_regex(pattern: &str, options: &str) -> Result<Regex, QueryError> {
    let mut builder = RegexBuilder::new(pattern);
    for option in options.chars() {
        match option {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'u' => builder.unicode(true),
            other => {
                return Err(QueryError::InvalidOperand(format!(
                    "invalid flag in regex options: {other}"
                )));
            }
        };
    }

    builder
        .build()
        .map_err(|err| QueryError::InvalidOperand(format!("invalid regex: {err}")))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermMetadata;

    fn term(value: Value) -> IndexTerm {
        IndexTerm {
            metadata: TermMetadata::NoMetadata,
            path: "$".to_string(),
            value,
        }
    }

    fn truncated(value: Value) -> IndexTerm {
        IndexTerm {
            metadata: TermMetadata::Truncated,
            ..term(value)
        }
    }

    #[test]
    fn regex_matches_strings_only() {
        let operand = Value::Regex {
            pattern: "^ab".to_string(),
            options: "i".to_string(),
        };
        let recheck = RecheckKind::regex(&operand, false).expect("regex");

        assert!(is_valid_recheck_for_index_value(&term(Value::text("ABC")), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::text("xab")), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Int32(1)), &recheck));
        assert!(is_valid_recheck_for_index_value(&truncated(Value::text("zz")), &recheck));
    }

    #[test]
    fn negated_regex_inverts_the_match() {
        let recheck = RecheckKind::regex(&Value::text("b"), true).expect("regex");

        assert!(!is_valid_recheck_for_index_value(&term(Value::text("abc")), &recheck));
        assert!(is_valid_recheck_for_index_value(&term(Value::text("xyz")), &recheck));
    }

    #[test]
    fn bad_regex_options_are_rejected() {
        let operand = Value::Regex {
            pattern: "a".to_string(),
            options: "q".to_string(),
        };

        assert!(matches!(
            RecheckKind::regex(&operand, false),
            Err(QueryError::InvalidOperand(_))
        ));
    }

    #[test]
    fn exists_checks_the_undefined_marker() {
        let undefined = IndexTerm {
            metadata: TermMetadata::UndefinedValue,
            ..term(Value::Undefined)
        };

        let exists = RecheckKind::Exists { exists: true };
        let missing = RecheckKind::Exists { exists: false };
        assert!(is_valid_recheck_for_index_value(&term(Value::Null), &exists));
        assert!(!is_valid_recheck_for_index_value(&undefined, &exists));
        assert!(is_valid_recheck_for_index_value(&undefined, &missing));
    }

    #[test]
    fn mod_truncates_doubles_and_rejects_non_finite() {
        let recheck =
            RecheckKind::modulo(&Value::Array(vec![Value::Int32(4), Value::Int32(1)])).expect("mod");

        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(9)), &recheck));
        assert!(is_valid_recheck_for_index_value(&term(Value::Double(5.9)), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Int64(8)), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Double(f64::NAN)), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::text("9")), &recheck));
    }

    #[test]
    fn mod_operand_is_validated() {
        assert!(RecheckKind::modulo(&Value::Array(vec![Value::Int32(0), Value::Int32(1)])).is_err());
        assert!(RecheckKind::modulo(&Value::Array(vec![Value::Int32(3)])).is_err());
        assert!(RecheckKind::modulo(&Value::Int32(3)).is_err());
    }

    #[test]
    fn not_equal_defers_on_truncation_and_partial_undefined() {
        let recheck = RecheckKind::NotEqual {
            value: Value::Int32(3),
        };
        assert!(!is_valid_recheck_for_index_value(&term(Value::Double(3.0)), &recheck));
        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(4)), &recheck));
        assert!(is_valid_recheck_for_index_value(&truncated(Value::Int32(3)), &recheck));

        let null = RecheckKind::NotEqual { value: Value::Null };
        let partial = IndexTerm {
            metadata: TermMetadata::PartialUndefinedValue,
            ..term(Value::Undefined)
        };
        assert!(!is_valid_recheck_for_index_value(&partial, &null));
        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(1)), &null));
    }

    #[test]
    fn bits_over_numbers_and_binary() {
        let all_set = RecheckKind::bits(BitsOp::AllSet, &Value::Int32(0b101)).expect("mask");
        let any_clear =
            RecheckKind::bits(BitsOp::AnyClear, &Value::Array(vec![Value::Int32(1)])).expect("mask");

        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(0b111)), &all_set));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Int32(0b011)), &all_set));
        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(0b101)), &any_clear));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Double(5.5)), &all_set));

        let binary = Value::Binary {
            subtype: 0,
            bytes: vec![0b0000_0101],
        };
        assert!(is_valid_recheck_for_index_value(&term(binary), &all_set));
    }

    #[test]
    fn high_bits_follow_the_sign() {
        let recheck =
            RecheckKind::bits(BitsOp::AllSet, &Value::Array(vec![Value::Int32(100)])).expect("mask");

        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(-1)), &recheck));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Int32(1)), &recheck));
    }

    #[test]
    fn empty_mask_matches_all_and_no_any() {
        let all = RecheckKind::bits(BitsOp::AllClear, &Value::Array(Vec::new())).expect("mask");
        let any = RecheckKind::bits(BitsOp::AnySet, &Value::Int32(0)).expect("mask");

        assert!(is_valid_recheck_for_index_value(&term(Value::Int32(7)), &all));
        assert!(!is_valid_recheck_for_index_value(&term(Value::Int32(7)), &any));
    }
}
