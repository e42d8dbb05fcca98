use crate::error::RuleError;

pub const DEFAULT_WIDTH: usize = 3;

/// Numeric sequence of an identifier such as `EMP042`.
///
/// The identifier must be exactly `prefix` followed by one or more ASCII
/// digits; anything else is corrupt data.
pub fn parse_sequence(prefix: &str, identifier: &str) -> Result<u64, RuleError> {
    let malformed = || RuleError::MalformedIdentifier {
        prefix: prefix.to_string(),
        identifier: identifier.to_string(),
    };

    let digits = identifier.strip_prefix(prefix).ok_or_else(malformed)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    digits.parse::<u64>().map_err(|_| malformed())
}

/// Identifier issued after `last` for the given prefix.
///
/// The sequence is zero-padded to `width`. Once it no longer fits, the
/// identifier grows (`EMP999` is followed by `EMP1000`) instead of wrapping.
pub fn next_identifier(prefix: &str, last: Option<&str>, width: usize) -> Result<String, RuleError> {
    let next = match last {
        Some(last) => {
            let seq = parse_sequence(prefix, last)?;
            seq.checked_add(1).ok_or_else(|| RuleError::MalformedIdentifier {
                prefix: prefix.to_string(),
                identifier: last.to_string(),
            })?
        }
        None => 1,
    };

    Ok(format!("{prefix}{next:0width$}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_existing_identifier() {
        assert_eq!(next_identifier("EMP", Some("EMP003"), 3).unwrap(), "EMP004");
    }

    #[test]
    fn first_identifier_for_prefix() {
        assert_eq!(next_identifier("MGR", None, 3).unwrap(), "MGR001");
    }

    #[test]
    fn carries_into_next_digit() {
        assert_eq!(next_identifier("EMP", Some("EMP099"), 3).unwrap(), "EMP100");
    }

    #[test]
    fn widens_past_pad_width() {
        assert_eq!(next_identifier("EMP", Some("EMP999"), 3).unwrap(), "EMP1000");
        assert_eq!(next_identifier("EMP", Some("EMP1000"), 3).unwrap(), "EMP1001");
    }

    #[test]
    fn honours_configured_width() {
        assert_eq!(next_identifier("EMP", None, 5).unwrap(), "EMP00001");
        assert_eq!(next_identifier("EMP", Some("EMP00041"), 5).unwrap(), "EMP00042");
    }

    #[test]
    fn rejects_wrong_prefix() {
        let err = next_identifier("EMP", Some("MGR004"), 3).unwrap_err();
        assert_eq!(
            err,
            RuleError::MalformedIdentifier {
                prefix: "EMP".into(),
                identifier: "MGR004".into(),
            }
        );
    }

    #[test]
    fn rejects_non_numeric_suffix() {
        for bad in ["EMP", "EMPabc", "EMP01a", "EMP-01", "EMP 01", "EMP+1"] {
            assert!(
                matches!(
                    next_identifier("EMP", Some(bad), 3),
                    Err(RuleError::MalformedIdentifier { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_sequence_that_cannot_increment() {
        let last = format!("EMP{}", u64::MAX);
        assert!(next_identifier("EMP", Some(&last), 3).is_err());
        assert!(parse_sequence("EMP", "EMP99999999999999999999999").is_err());
    }

    #[test]
    fn parses_sequence() {
        assert_eq!(parse_sequence("MGR", "MGR007").unwrap(), 7);
        assert_eq!(parse_sequence("MGR", "MGR1200").unwrap(), 1200);
    }
}
