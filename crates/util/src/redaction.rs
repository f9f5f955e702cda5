use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+(?: [\w\-\.=:/+]+)?)",
        r"(?i)(bearer )([\w\-\.=:/+]+)",
        r#"(?i)("?access_token"?\s*[:=]\s*"?)([^\s",}]+)"#,
        r"(?i)([A-Z0-9_]*?(KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid redaction pattern"))
    .collect()
});

/// Redacts values that look like secrets in a string.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{}<redacted>", prefix)
            })
            .to_string();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_tokens() {
        let line = "request failed: Authorization: Bearer ya29.a0AfH6SM";
        let redacted = redact_sensitive(line);
        assert!(!redacted.contains("ya29"), "{redacted}");
        assert!(redacted.contains("Authorization: <redacted>"), "{redacted}");
    }

    #[test]
    fn redacts_json_access_tokens_and_env_assignments() {
        let redacted = redact_sensitive(r#"{"access_token": "ya29.secret", "expires_in": 3599} GOOGLE_OAUTH_ACCESS_TOKEN=ya29.x"#);
        assert!(!redacted.contains("ya29"), "{redacted}");
        assert!(redacted.contains("expires_in"), "{redacted}");
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let line = "HTTP 403: Required 'compute.instances.list' permission for 'projects/demo'";
        assert_eq!(redact_sensitive(line), line);
    }
}
