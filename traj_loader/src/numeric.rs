//! Lenient numeric token parsing.
//!
//! Leading whitespace is skipped and the longest numeric prefix is
//! converted. A token without a numeric prefix yields zero.
//! `clean` is false whenever anything but trailing whitespace was ignored, or
//! an integer had to be saturated.

/// A parsed value and whether the whole token was numeric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lenient<T> {
    /// Converted value (zero when no numeric prefix exists).
    pub value: T,
    /// Whole token consumed.
    pub clean: bool,
}

/// Parse an integer cell.
pub fn parse_int(token: &[u8]) -> Lenient<i32> {
    let start = skip_space(token, 0);
    let mut pos = start;
    let negative = match token.get(pos) {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let digits_start = pos;
    let mut magnitude: i64 = 0;
    let mut saturated = false;
    while let Some(d) = token.get(pos).filter(|b| b.is_ascii_digit()) {
        magnitude = magnitude * 10 + i64::from(d - b'0');
        if magnitude > i64::from(i32::MAX) + 1 {
            magnitude = i64::from(i32::MAX) + 1;
            saturated = true;
        }
        pos += 1;
    }
    if pos == digits_start {
        return Lenient {
            value: 0,
            clean: false,
        };
    }

    let signed = if negative { -magnitude } else { magnitude };
    let value = signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
    Lenient {
        value: value as i32,
        clean: !saturated && value == signed && only_space_after(token, pos),
    }
}

/// Parse a floating-point cell.
pub fn parse_float(token: &[u8]) -> Lenient<f64> {
    let start = skip_space(token, 0);
    let end = float_prefix_end(token, start);
    if end == start {
        return Lenient {
            value: 0.0,
            clean: false,
        };
    }

    let value = std::str::from_utf8(&token[start..end])
        .ok()
        .and_then(|s| s.parse::<f64>().ok());
    match value {
        Some(value) => Lenient {
            value,
            clean: only_space_after(token, end),
        },
        None => Lenient {
            value: 0.0,
            clean: false,
        },
    }
}

fn float_prefix_end(token: &[u8], start: usize) -> usize {
    let mut pos = start;
    if matches!(token.get(pos), Some(b'+' | b'-')) {
        pos += 1;
    }

    for word in [&b"infinity"[..], b"inf", b"nan"] {
        if token.len() >= pos + word.len() && token[pos..pos + word.len()].eq_ignore_ascii_case(word) {
            return pos + word.len();
        }
    }

    let int_digits = count_digits(token, pos);
    pos += int_digits;
    let mut frac_digits = 0;
    if token.get(pos) == Some(&b'.') {
        frac_digits = count_digits(token, pos + 1);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return start;
    }

    if matches!(token.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(token.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(token, exp);
        if exp_digits > 0 {
            pos = exp + exp_digits;
        }
    }
    pos
}

fn count_digits(token: &[u8], from: usize) -> usize {
    token
        .get(from..)
        .map(|rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
        .unwrap_or(0)
}

fn skip_space(token: &[u8], from: usize) -> usize {
    from + token[from..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace() || **b == 0x0b)
        .count()
}

fn only_space_after(token: &[u8], from: usize) -> bool {
    skip_space(token, from) == token.len()
}
