// src/mailer.rs
//
// =============================================================================
// DRBOT: MAIL RELAY
// =============================================================================
//
// Thin seam in front of the organisation's SMTP relay. The trait exists so
// runs can be tested without a network; `SmtpMailer` is the production
// implementation (plain relay on port 25, no auth, matching a typical
// internal batch host).

use anyhow::{Context, Result};
use lettre::{Message, SmtpTransport, Transport};

pub trait Mailer {
    /// Deliver one plain-text message. Recipients are individual addresses,
    /// already split from any comma-separated input.
    fn send(&self, sender: &str, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailer {
    relay: String,
}

impl SmtpMailer {
    pub fn new(relay: impl Into<String>) -> Self {
        Self {
            relay: relay.into(),
        }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, sender: &str, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let mut builder = Message::builder()
            .from(sender.parse().context("Invalid sender address")?)
            .subject(subject);
        for addr in recipients {
            let addr = addr.trim();
            builder = builder.to(addr
                .parse()
                .with_context(|| format!("Invalid recipient address '{}'", addr))?);
        }
        let message = builder.body(body.to_string())?;

        // Unencrypted internal relay, the smtplib.SMTP(host) equivalent.
        let transport = SmtpTransport::builder_dangerous(self.relay.as_str()).build();
        transport
            .send(&message)
            .with_context(|| format!("Relay {} rejected the message", self.relay))?;
        Ok(())
    }
}
