/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a positive integer setting (hours, seconds, batch sizes). Zero, negative and unparseable values yield `None`
/// so that callers can fall back to their default.
pub fn parse_positive_int(value: Option<String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("Yes".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn positive_ints() {
        assert_eq!(parse_positive_int(Some("48".into())), Some(48));
        assert_eq!(parse_positive_int(Some("0".into())), None);
        assert_eq!(parse_positive_int(Some("-3".into())), None);
        assert_eq!(parse_positive_int(Some("two".into())), None);
        assert_eq!(parse_positive_int(None), None);
    }
}
