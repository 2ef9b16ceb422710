//! Minimal SMTP client transport
//!
//! Speaks just enough SMTP for dispatching test messages: EHLO, optional
//! AUTH PLAIN, MAIL FROM / RCPT TO / DATA / QUIT, over a plain TCP
//! connection. No TLS; deployments needing transport security front this
//! with a local relay.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use async_trait::async_trait;

use crate::config::SmtpConfig;

use super::{DispatchError, MailMessage, MailTransport};

/// SMTP transport over `tokio::net::TcpStream`.
pub struct SmtpTransport {
    settings: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(settings: SmtpConfig) -> Self {
        Self { settings }
    }

    async fn conversation(&self, message: &MailMessage) -> Result<(), DispatchError> {
        let address = format!("{}:{}", self.settings.host, self.settings.port);
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| DispatchError::Connect {
                address: address.clone(),
                detail: e.to_string(),
            })?;
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        expect_reply(&mut reader, "connect", 220).await?;
        send_command(&mut write_half, "EHLO streamcheck").await?;
        expect_reply(&mut reader, "EHLO", 250).await?;

        if let (Some(username), Some(password)) =
            (&self.settings.username, &self.settings.password)
        {
            let credentials = BASE64.encode(format!("\0{username}\0{password}"));
            send_command(&mut write_half, &format!("AUTH PLAIN {credentials}")).await?;
            expect_reply(&mut reader, "AUTH PLAIN", 235).await?;
        }

        send_command(&mut write_half, &format!("MAIL FROM:<{}>", message.from)).await?;
        expect_reply(&mut reader, "MAIL FROM", 250).await?;
        for recipient in message.recipients() {
            send_command(&mut write_half, &format!("RCPT TO:<{recipient}>")).await?;
            expect_reply(&mut reader, "RCPT TO", 250).await?;
        }

        send_command(&mut write_half, "DATA").await?;
        expect_reply(&mut reader, "DATA", 354).await?;
        write_half
            .write_all(dot_stuff(&message.to_wire()).as_bytes())
            .await?;
        write_half.write_all(b".\r\n").await?;
        write_half.flush().await?;
        expect_reply(&mut reader, "message body", 250).await?;

        // Best effort; the message is already accepted.
        let _ = send_command(&mut write_half, "QUIT").await;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), DispatchError> {
        let timeout = Duration::from_secs(self.settings.timeout_seconds);
        tokio::time::timeout(timeout, self.conversation(message))
            .await
            .map_err(|_| DispatchError::Timeout(self.settings.timeout_seconds))?
    }
}

async fn send_command(
    write_half: &mut WriteHalf<TcpStream>,
    command: &str,
) -> Result<(), DispatchError> {
    write_half.write_all(command.as_bytes()).await?;
    write_half.write_all(b"\r\n").await?;
    write_half.flush().await?;
    Ok(())
}

/// Read one (possibly multiline) SMTP reply and require the expected code.
async fn expect_reply(
    reader: &mut BufReader<ReadHalf<TcpStream>>,
    command: &str,
    expected_code: u16,
) -> Result<(), DispatchError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(DispatchError::Smtp {
                command: command.to_string(),
                reply: "connection closed".to_string(),
            });
        }
        let trimmed = line.trim_end();
        if trimmed.len() < 4 {
            return Err(DispatchError::Smtp {
                command: command.to_string(),
                reply: trimmed.to_string(),
            });
        }
        // "250-..." continues a multiline reply, "250 ..." ends it.
        if trimmed.as_bytes()[3] == b'-' {
            continue;
        }
        let code: u16 = trimmed[..3].parse().map_err(|_| DispatchError::Smtp {
            command: command.to_string(),
            reply: trimmed.to_string(),
        })?;
        if code != expected_code {
            return Err(DispatchError::Smtp {
                command: command.to_string(),
                reply: trimmed.to_string(),
            });
        }
        return Ok(());
    }
}

/// RFC 5321 transparency: a leading dot on any line is doubled.
fn dot_stuff(wire: &str) -> String {
    let mut stuffed = String::with_capacity(wire.len());
    for (index, line) in wire.split("\r\n").enumerate() {
        if index > 0 {
            stuffed.push_str("\r\n");
        }
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
    }
    stuffed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_stuffing_doubles_leading_dots() {
        assert_eq!(dot_stuff("a\r\n.b\r\n..c\r\n"), "a\r\n..b\r\n...c\r\n");
        assert_eq!(dot_stuff("no dots"), "no dots");
    }
}
