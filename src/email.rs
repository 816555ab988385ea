use std::sync::OnceLock;

use fancy_regex::Regex;

const EMAIL_PATTERN: &str = concat!(
    r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))"#,
    r"@",
    r"((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}))$",
);

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
}

/// Returns whether `value` has the shape `local@domain`.
///
/// The domain is either a bracketed dotted-quad (`[192.168.0.1]`) or a
/// dotted host name whose last label is at least two letters. The local part
/// is a quoted string or dot-separated atoms free of `<>()[]\.,;:@"` and
/// whitespace. Matching is case-insensitive and purely syntactic.
pub fn is_valid_email(value: &str) -> bool {
    let lowered = value.to_lowercase();
    email_regex()
        .map(|regex| regex.is_match(&lowered).unwrap_or(false))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_compiles() {
        assert!(email_regex().is_some());
    }

    #[test]
    fn accepts_common_addresses() {
        for email in [
            "alice@example.com",
            "Alice.Smith@Mail.Example.ORG",
            "bob+forum@sub.domain.io",
            "x@[127.0.0.1]",
            "\"john doe\"@example.com",
        ] {
            assert!(is_valid_email(email), "{email} should be accepted");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "alice@",
            "alice@example",
            "alice@example.c",
            "alice@example.123",
            "al ice@example.com",
            "alice..smith@example.com",
            ".alice@example.com",
            "alice@exa mple.com",
            "alice@@example.com",
            " alice@example.com",
        ] {
            assert!(!is_valid_email(email), "{email:?} should be rejected");
        }
    }
}
