//! Request parameter helpers

/// Interpret a loosely formatted boolean request parameter
///
/// Returns `None` when the value is neither truthy nor falsy, so callers can
/// distinguish "explicitly off" from "garbage".
///
/// # Examples
/// ```
/// use cfp_common::params::friendly_boolean;
///
/// assert_eq!(friendly_boolean("Yes"), Some(true));
/// assert_eq!(friendly_boolean("off"), Some(false));
/// assert_eq!(friendly_boolean("maybe"), None);
/// ```
pub fn friendly_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "y" | "true" | "t" | "on" => Some(true),
        "0" | "no" | "n" | "false" | "f" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Same as [`friendly_boolean`] for an optional parameter
pub fn friendly_boolean_opt(value: Option<&str>) -> Option<bool> {
    value.and_then(friendly_boolean)
}

/// Collapse whitespace runs to single spaces and trim both ends
pub fn simplify_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_boolean_truthy() {
        for v in ["1", "yes", "TRUE", " on ", "t"] {
            assert_eq!(friendly_boolean(v), Some(true), "{v:?}");
        }
    }

    #[test]
    fn test_friendly_boolean_falsy() {
        for v in ["0", "no", "False", "off", ""] {
            assert_eq!(friendly_boolean(v), Some(false), "{v:?}");
        }
    }

    #[test]
    fn test_friendly_boolean_unknown() {
        assert_eq!(friendly_boolean("2"), None);
        assert_eq!(friendly_boolean_opt(None), None);
        assert_eq!(friendly_boolean_opt(Some("1")), Some(true));
    }

    #[test]
    fn test_simplify_whitespace() {
        assert_eq!(simplify_whitespace("  A\t\tpaper \n title "), "A paper title");
        assert_eq!(simplify_whitespace(""), "");
    }
}
