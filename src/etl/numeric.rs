//! Short-form magnitude parsing for suffixed counts like `"7.7K"` or `"99M"`.

use crate::error::EtlError;

/// Expands a short-form number into its full floating-point value.
///
/// Null or empty input yields `None`. A non-numeric, non-empty input is an
/// error rather than a null: malformed strings are a data-quality bug that
/// must not be silently swallowed.
pub fn expand_short_form(raw: Option<&str>) -> Result<Option<f64>, EtlError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (digits, multiplier) = match trimmed.as_bytes().last() {
        Some(b'K') => (&trimmed[..trimmed.len() - 1], 1e3),
        Some(b'M') => (&trimmed[..trimmed.len() - 1], 1e6),
        Some(b'B') => (&trimmed[..trimmed.len() - 1], 1e9),
        Some(b'T') => (&trimmed[..trimmed.len() - 1], 1e12),
        _ => (trimmed, 1.0),
    };

    let value: f64 = digits
        .trim()
        .parse()
        .map_err(|_| EtlError::InvalidNumber(raw.to_string()))?;
    Ok(Some(value * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_magnitude_suffixes() {
        assert_eq!(expand_short_form(Some("1.2K")).unwrap(), Some(1_200.0));
        assert_eq!(expand_short_form(Some("99M")).unwrap(), Some(99_000_000.0));
        assert_eq!(
            expand_short_form(Some("3B")).unwrap(),
            Some(3_000_000_000.0)
        );
        assert_eq!(
            expand_short_form(Some("1T")).unwrap(),
            Some(1_000_000_000_000.0)
        );
    }

    #[test]
    fn test_plain_numbers_pass_through() {
        assert_eq!(expand_short_form(Some("74")).unwrap(), Some(74.0));
        assert_eq!(expand_short_form(Some(" 8.9 ")).unwrap(), Some(8.9));
    }

    #[test]
    fn test_null_and_empty_yield_none() {
        assert_eq!(expand_short_form(None).unwrap(), None);
        assert_eq!(expand_short_form(Some("")).unwrap(), None);
        assert_eq!(expand_short_form(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_garbage_is_loud() {
        assert!(expand_short_form(Some("n/a")).is_err());
        assert!(expand_short_form(Some("12 votes")).is_err());
    }
}
