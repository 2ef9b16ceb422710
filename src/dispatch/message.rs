//! Outbound message composition
//!
//! Builds the RFC 5322 message for one test case. The subject and sender come
//! from the case; the destination mailbox from the mail configuration. The
//! `X-Test-Id` header carries the case id for manual tracing on the receiving
//! side.

use chrono::Utc;
use uuid::Uuid;

use crate::cases::TestCase;
use crate::config::MailConfig;

/// Composed outbound message, ready for a mail transport.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub test_id: String,
    pub body: String,
}

impl MailMessage {
    /// Build the message for one test case.
    pub fn compose(case: &TestCase, mail: &MailConfig) -> Self {
        Self {
            message_id: format!("<{}@streamcheck>", Uuid::new_v4()),
            from: case.from_address.trim().to_string(),
            to: mail.to_address.clone(),
            cc: mail.cc.clone(),
            bcc: mail.bcc.clone(),
            subject: case.subject.trim().to_string(),
            test_id: case.test_id.trim().to_string(),
            body: case.body.clone(),
        }
    }

    /// Every envelope recipient: To, Cc and Bcc.
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients = vec![self.to.clone()];
        recipients.extend(self.cc.iter().cloned());
        recipients.extend(self.bcc.iter().cloned());
        recipients
    }

    /// Render headers and body as CRLF-separated wire text. Bcc recipients
    /// stay off the headers; they only appear in the envelope.
    pub fn to_wire(&self) -> String {
        let mut lines = vec![
            format!("Message-ID: {}", self.message_id),
            format!("Date: {}", Utc::now().to_rfc2822()),
            format!("From: {}", self.from),
            format!("To: {}", self.to),
        ];
        if !self.cc.is_empty() {
            lines.push(format!("Cc: {}", self.cc.join(", ")));
        }
        lines.push(format!("Subject: {}", self.subject));
        lines.push(format!("X-Test-Id: {}", self.test_id));
        lines.push("MIME-Version: 1.0".to_string());
        lines.push("Content-Type: text/plain; charset=utf-8".to_string());
        lines.push(String::new());

        let mut wire = lines.join("\r\n");
        wire.push_str("\r\n");
        for body_line in self.body.split('\n') {
            wire.push_str(body_line.trim_end_matches('\r'));
            wire.push_str("\r\n");
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn case() -> TestCase {
        TestCase {
            test_id: "tc-1".to_string(),
            tags: vec![],
            enabled: true,
            notes: String::new(),
            from_address: " a@example.org ".to_string(),
            subject: "Subject A".to_string(),
            body: "line one\nline two".to_string(),
            expected_values: BTreeMap::new(),
        }
    }

    fn mail() -> MailConfig {
        MailConfig {
            to_address: "inbox@example.org".to_string(),
            cc: vec!["cc@example.org".to_string()],
            bcc: vec!["bcc@example.org".to_string()],
        }
    }

    #[test]
    fn composes_headers_from_case_and_mail_config() {
        let message = MailMessage::compose(&case(), &mail());
        assert_eq!(message.from, "a@example.org");
        assert_eq!(message.to, "inbox@example.org");
        assert_eq!(message.test_id, "tc-1");
        assert_eq!(
            message.recipients(),
            ["inbox@example.org", "cc@example.org", "bcc@example.org"]
        );
    }

    #[test]
    fn wire_text_uses_crlf_and_hides_bcc() {
        let wire = MailMessage::compose(&case(), &mail()).to_wire();
        assert!(wire.contains("X-Test-Id: tc-1\r\n"));
        assert!(wire.contains("Cc: cc@example.org\r\n"));
        assert!(!wire.contains("bcc@example.org"));
        assert!(wire.ends_with("line two\r\n"));
    }

    #[test]
    fn message_ids_are_unique() {
        let first = MailMessage::compose(&case(), &mail());
        let second = MailMessage::compose(&case(), &mail());
        assert_ne!(first.message_id, second.message_id);
    }
}
