//! Upload-size and content screening.
//!
//! The content screen is a coarse denylist that keeps obvious SQL statements
//! and inline scripts out of the model prompt. It is not a security boundary:
//! nothing downstream executes the text.

use crate::error::{to_mb, MailsortError};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// SQL statement shapes. Bare keywords like "select" or "update" appear in
/// ordinary mail, so a match needs the surrounding clause. Gaps are bounded
/// to a column list or a table name: cleaned text is a single line, and an
/// open-ended gap would span the whole message.
static SQL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(select\s+(\*|[\w.]+(\s*,\s*[\w.]+)*)\s+from\b|insert\s+into\b|update\s+[\w.]+\s+set\b|delete\s+from\b|drop\s+(table|database)\b|union\s+(all\s+)?select\b|alter\s+table\b|create\s+(table|database)\b|exec(ute)?\s*\()",
    )
    .expect("valid regex")
});

/// Inline script and event-handler markup.
static SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<script|javascript:|\bon(error|click|load)\s*=)").expect("valid regex")
});

/// Reject uploads above `max_bytes`.
pub fn check_upload_size(size: u64, max_bytes: u64) -> Result<(), MailsortError> {
    if size > max_bytes {
        return Err(MailsortError::FileTooLarge {
            size_mb: to_mb(size),
            max_mb: to_mb(max_bytes),
        });
    }
    Ok(())
}

/// Reject text that is too long or looks like an injection attempt.
pub fn screen_content(text: &str, max_chars: usize) -> Result<(), MailsortError> {
    if text.chars().count() > max_chars {
        return Err(MailsortError::ContentTooLong { max_chars });
    }
    if SQL_PATTERN.is_match(text) {
        warn!("Content rejected: SQL statement pattern");
        return Err(MailsortError::SuspiciousContent);
    }
    if SCRIPT_PATTERN.is_match(text) {
        warn!("Content rejected: script pattern");
        return Err(MailsortError::SuspiciousContent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1_000_000;

    #[test]
    fn ordinary_mail_passes() {
        for text in [
            "Hello, please check my order status.",
            "Olá, gostaria de saber o status da minha solicitação. Obrigado!",
            "Please select a date for the meeting and update me when you can.",
            "We will create a new account for you.",
            "Please select the invoices from March and send them to me.",
            "Could you update me on the order? Also, please set a meeting.",
        ] {
            assert!(screen_content(text, MAX).is_ok(), "rejected: {text}");
        }
    }

    #[test]
    fn sql_statements_rejected() {
        for text in [
            "SELECT * FROM users",
            "select name, email from customers",
            "UPDATE users SET admin = 1",
            "1; DROP TABLE accounts",
            "' UNION SELECT password",
            "insert into logs values (1)",
            "EXEC('xp_cmdshell')",
        ] {
            let err = screen_content(text, MAX).unwrap_err();
            assert!(matches!(err, MailsortError::SuspiciousContent), "accepted: {text}");
        }
    }

    #[test]
    fn scripts_rejected() {
        for text in [
            "<script>alert(1)</script>",
            "click javascript:void(0)",
            "<img src=x onerror=alert(1)>",
            "<a ONCLICK = 'x'>",
        ] {
            assert!(screen_content(text, MAX).is_err(), "accepted: {text}");
        }
    }

    #[test]
    fn length_limit_counts_characters() {
        assert!(screen_content(&"a".repeat(MAX), MAX).is_ok());
        let err = screen_content(&"a".repeat(MAX + 1), MAX).unwrap_err();
        assert!(matches!(err, MailsortError::ContentTooLong { .. }));

        // Multi-byte characters count once each.
        assert!(screen_content(&"é".repeat(10), 10).is_ok());
    }

    #[test]
    fn upload_size_boundary() {
        let max = 5 * 1024 * 1024;
        assert!(check_upload_size(max, max).is_ok());
        let err = check_upload_size(max + 1, max).unwrap_err();
        assert!(err.to_string().contains("5MB"), "got: {err}");
    }
}
