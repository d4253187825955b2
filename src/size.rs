//! Resilient parsing of human-readable size tokens into exact byte counts.
//!
//! The external tool renders sizes in several shapes depending on flags and
//! magnitude: plain integers, `12.3MB`-style binary suffixes, and scientific
//! notation for very large values. None of this is a format we control, so
//! the parser accepts all of them and callers default to zero when a token
//! matches nothing.

use crate::error::Error;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Parse one trimmed size token into a byte count.
///
/// Decision order: empty token is zero; an exact trailing `GB`/`MB`/`KB`
/// (case sensitive) scales a floating-point prefix by the matching power of
/// 1024, truncating toward zero; a token containing `e+`/`E+` is parsed as
/// scientific notation; anything else must be a plain base-10 integer.
pub fn parse_size(token: &str) -> Result<u64, Error> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(0);
    }

    if token.len() > 2 && token.is_char_boundary(token.len() - 2) {
        let (prefix, unit) = token.split_at(token.len() - 2);
        let scale = match unit {
            "GB" => Some(GIB),
            "MB" => Some(MIB),
            "KB" => Some(KIB),
            _ => None,
        };
        if let Some(scale) = scale {
            return match prefix.parse::<f64>() {
                Ok(value) => to_bytes(value * scale, token),
                Err(_) => Err(Error::UnparsableSize(token.to_string())),
            };
        }
    }

    if token.contains("e+") || token.contains("E+") {
        return match token.parse::<f64>() {
            Ok(value) => to_bytes(value, token),
            Err(_) => Err(Error::UnparsableSize(token.to_string())),
        };
    }

    token
        .parse::<u64>()
        .map_err(|_| Error::UnparsableSize(token.to_string()))
}

/// Byte counts are non-negative, so negative and non-finite values are
/// unparsable rather than wrapped.
fn to_bytes(value: f64, token: &str) -> Result<u64, Error> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::UnparsableSize(token.to_string()));
    }
    Ok(value as u64)
}
