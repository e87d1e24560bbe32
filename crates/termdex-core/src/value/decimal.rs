use std::{cmp::Ordering, fmt};

const EXPONENT_BIAS: i32 = 6176;
const MIN_EXPONENT: i32 = -6176;
const MAX_EXPONENT: i32 = 6111;
const MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999;
const MAX_DIGITS: usize = 34;

const SIGN_BIT: u128 = 1 << 127;
const INFINITY_BITS: u128 = 0x1E << 122;
const NAN_BITS: u128 = 0x1F << 122;
const COEFFICIENT_MASK: u128 = (1 << 113) - 1;

///
/// Decimal128
///
/// IEEE 754-2008 128-bit decimal in binary integer decimal (BID) encoding.
/// Holds the raw bits; the wire layout is the little-endian `u128`.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Decimal128 {
    bits: u128,
}

///
/// DecimalParts
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecimalParts {
    Finite {
        negative: bool,
        coefficient: u128,
        exponent: i32,
    },
    Infinity {
        negative: bool,
    },
    NaN,
}

impl Decimal128 {
    pub const NAN: Self = Self { bits: NAN_BITS };
    pub const INFINITY: Self = Self {
        bits: INFINITY_BITS,
    };
    pub const NEG_INFINITY: Self = Self {
        bits: INFINITY_BITS | SIGN_BIT,
    };
    pub const ZERO: Self = Self {
        bits: (EXPONENT_BIAS as u128) << 113,
    };

    #[must_use]
    pub const fn from_bits(bits: u128) -> Self {
        Self { bits }
    }

    #[must_use]
    pub const fn to_bits(self) -> u128 {
        self.bits
    }

    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self::from_bits(u128::from_le_bytes(bytes))
    }

    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.bits.to_le_bytes()
    }

    /// Build a finite decimal, rounding the coefficient to 34 digits and
    /// clamping the exponent into range.
    #[must_use]
    pub fn from_parts(negative: bool, coefficient: u128, exponent: i32) -> Self {
        let (mut coefficient, mut exponent) = (coefficient, exponent);

        while coefficient > MAX_COEFFICIENT {
            coefficient = div10_round(coefficient);
            exponent = exponent.saturating_add(1);
        }
        while exponent < MIN_EXPONENT && coefficient != 0 {
            coefficient = div10_round(coefficient);
            exponent += 1;
        }
        if exponent < MIN_EXPONENT {
            exponent = MIN_EXPONENT;
        }
        while exponent > MAX_EXPONENT && coefficient != 0 && coefficient * 10 <= MAX_COEFFICIENT {
            coefficient *= 10;
            exponent -= 1;
        }
        if exponent > MAX_EXPONENT {
            if coefficient != 0 {
                return if negative {
                    Self::NEG_INFINITY
                } else {
                    Self::INFINITY
                };
            }
            exponent = MAX_EXPONENT;
        }

        let biased = (exponent + EXPONENT_BIAS) as u128;
        let sign = if negative { SIGN_BIT } else { 0 };

        Self {
            bits: sign | (biased << 113) | coefficient,
        }
    }

    #[must_use]
    pub const fn parts(self) -> DecimalParts {
        let negative = self.bits & SIGN_BIT != 0;
        let combination = (self.bits >> 122) & 0x1F;

        if combination == 0x1F {
            return DecimalParts::NaN;
        }
        if combination == 0x1E {
            return DecimalParts::Infinity { negative };
        }

        if (self.bits >> 125) & 0x3 == 0x3 {
            // large-coefficient form always exceeds 34 digits: non-canonical zero
            let exponent = ((self.bits >> 111) & 0x3FFF) as i32 - EXPONENT_BIAS;
            return DecimalParts::Finite {
                negative,
                coefficient: 0,
                exponent,
            };
        }

        let exponent = ((self.bits >> 113) & 0x3FFF) as i32 - EXPONENT_BIAS;
        let mut coefficient = self.bits & COEFFICIENT_MASK;
        if coefficient > MAX_COEFFICIENT {
            coefficient = 0;
        }

        DecimalParts::Finite {
            negative,
            coefficient,
            exponent,
        }
    }

    #[must_use]
    pub const fn is_nan(self) -> bool {
        matches!(self.parts(), DecimalParts::NaN)
    }

    #[must_use]
    pub const fn is_infinite(self) -> bool {
        matches!(self.parts(), DecimalParts::Infinity { .. })
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        matches!(self.parts(), DecimalParts::Finite { coefficient: 0, .. })
    }

    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self::from_parts(value < 0, u128::from(value.unsigned_abs()), 0)
    }

    /// Convert from a double through its shortest round-trip text.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::NAN;
        }
        if value.is_infinite() {
            return if value < 0.0 {
                Self::NEG_INFINITY
            } else {
                Self::INFINITY
            };
        }
        if value == 0.0 {
            return Self::from_parts(value.is_sign_negative(), 0, 0);
        }

        Self::parse(&format!("{value:e}")).unwrap_or(Self::NAN)
    }

    /// Parse decimal text (`-12.5`, `1.25E-3`, `Infinity`, `NaN`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, body) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        match body.to_ascii_lowercase().as_str() {
            "inf" | "infinity" => {
                return Some(if negative {
                    Self::NEG_INFINITY
                } else {
                    Self::INFINITY
                });
            }
            "nan" => return Some(Self::NAN),
            _ => {}
        }

        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(at) => (&body[..at], body[at + 1..].parse::<i32>().ok()?),
            None => (body, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut digits = format!("{int_part}{frac_part}");
        let mut exponent = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;

        let trimmed = digits.trim_start_matches('0');
        digits = if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        };

        let mut round_up = false;
        if digits.len() > MAX_DIGITS {
            let dropped = digits.len() - MAX_DIGITS;
            round_up = digits.as_bytes()[MAX_DIGITS] >= b'5';
            digits.truncate(MAX_DIGITS);
            exponent = exponent.checked_add(i32::try_from(dropped).ok()?)?;
        }

        let mut coefficient = digits.parse::<u128>().ok()?;
        if round_up {
            coefficient += 1;
        }

        Some(Self::from_parts(negative, coefficient, exponent))
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        match self.parts() {
            DecimalParts::NaN => f64::NAN,
            DecimalParts::Infinity { negative: true } => f64::NEG_INFINITY,
            DecimalParts::Infinity { negative: false } => f64::INFINITY,
            DecimalParts::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                let sign = if negative { "-" } else { "" };
                format!("{sign}{coefficient}e{exponent}")
                    .parse::<f64>()
                    .unwrap_or(f64::NAN)
            }
        }
    }

    /// Whether converting to a double keeps the value finite and non-zero
    /// (special values always convert).
    #[must_use]
    pub fn is_in_double_range(self) -> bool {
        if self.is_nan() || self.is_infinite() || self.is_zero() {
            return true;
        }

        let as_double = self.to_f64();
        as_double.is_finite() && as_double != 0.0
    }

    /// Exact integral value, when the decimal is an integer that fits `i64`.
    #[must_use]
    pub fn to_i64_exact(self) -> Option<i64> {
        let DecimalParts::Finite {
            negative,
            coefficient,
            exponent,
        } = self.parts()
        else {
            return None;
        };

        let magnitude = if exponent >= 0 {
            let mut value = coefficient;
            for _ in 0..exponent {
                if value == 0 {
                    break;
                }
                value = value.checked_mul(10)?;
            }
            value
        } else if coefficient == 0 {
            0
        } else {
            let scale = 10u128.checked_pow(exponent.unsigned_abs())?;
            if coefficient % scale != 0 {
                return None;
            }
            coefficient / scale
        };

        if negative {
            let limit = u128::from(i64::MIN.unsigned_abs());
            if magnitude > limit {
                return None;
            }
            Some((magnitude as i128).wrapping_neg() as i64)
        } else {
            i64::try_from(magnitude).ok()
        }
    }

    /// Exact numeric comparison. NaN sorts below every other value and
    /// equal to itself.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.parts(), other.parts()) {
            (DecimalParts::NaN, DecimalParts::NaN) => Ordering::Equal,
            (DecimalParts::NaN, _) => Ordering::Less,
            (_, DecimalParts::NaN) => Ordering::Greater,
            (DecimalParts::Infinity { negative: a }, DecimalParts::Infinity { negative: b }) => {
                b.cmp(&a)
            }
            (DecimalParts::Infinity { negative }, _) => {
                if negative {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (_, DecimalParts::Infinity { negative }) => {
                if negative {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (
                DecimalParts::Finite {
                    negative: na,
                    coefficient: ca,
                    exponent: ea,
                },
                DecimalParts::Finite {
                    negative: nb,
                    coefficient: cb,
                    exponent: eb,
                },
            ) => compare_finite((na, ca, ea), (nb, cb, eb)),
        }
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts() {
            DecimalParts::NaN => f.write_str("NaN"),
            DecimalParts::Infinity { negative } => {
                f.write_str(if negative { "-Infinity" } else { "Infinity" })
            }
            DecimalParts::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                if negative {
                    f.write_str("-")?;
                }
                let digits = coefficient.to_string();
                let len = digits.len() as i32;
                let adjusted = exponent + len - 1;

                if exponent <= 0 && adjusted >= -6 {
                    let point = len + exponent;
                    if exponent == 0 {
                        f.write_str(&digits)
                    } else if point > 0 {
                        let (int, frac) = digits.split_at(point as usize);
                        write!(f, "{int}.{frac}")
                    } else {
                        let zeros = "0".repeat(point.unsigned_abs() as usize);
                        write!(f, "0.{zeros}{digits}")
                    }
                } else {
                    let (head, tail) = digits.split_at(1);
                    let sign = if adjusted < 0 { '-' } else { '+' };
                    if tail.is_empty() {
                        write!(f, "{head}E{sign}{}", adjusted.unsigned_abs())
                    } else {
                        write!(f, "{head}.{tail}E{sign}{}", adjusted.unsigned_abs())
                    }
                }
            }
        }
    }
}

fn compare_finite(a: (bool, u128, i32), b: (bool, u128, i32)) -> Ordering {
    let sign = |(negative, coefficient, _): (bool, u128, i32)| -> i8 {
        if coefficient == 0 {
            0
        } else if negative {
            -1
        } else {
            1
        }
    };

    let (sa, sb) = (sign(a), sign(b));
    if sa != sb || sa == 0 {
        return sa.cmp(&sb);
    }

    let magnitude = compare_magnitude((a.1, a.2), (b.1, b.2));
    if sa < 0 {
        magnitude.reverse()
    } else {
        magnitude
    }
}

// Both coefficients are non-zero.
fn compare_magnitude(a: (u128, i32), b: (u128, i32)) -> Ordering {
    let (da, db) = (a.0.to_string(), b.0.to_string());
    let adjusted_a = a.1 + da.len() as i32;
    let adjusted_b = b.1 + db.len() as i32;

    adjusted_a
        .cmp(&adjusted_b)
        .then_with(|| da.trim_end_matches('0').cmp(db.trim_end_matches('0')))
}

const fn div10_round(value: u128) -> u128 {
    let quotient = value / 10;
    if value % 10 >= 5 {
        quotient + 1
    } else {
        quotient
    }
}
