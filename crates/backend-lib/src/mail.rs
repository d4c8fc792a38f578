// ============================
// crates/backend-lib/src/mail.rs
// ============================
//! Outbound e-mail capability.
//!
//! Delivery itself lives outside this crate; the server ships with a mailer
//! that renders the message and writes it to the log.
use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

/// Markdown body of the password reset e-mail
pub const RESET_EMAIL_TEMPLATE: &str = "\
Hi {{name}},

Someone (hopefully you) asked to reset the password for your account.

Follow this link within 24 hours to choose a new password:

{{origin}}/password/reset/{{token}}

If you didn't ask for this, you can ignore this e-mail.
";

/// Markdown body of the registration e-mail
pub const REGISTER_EMAIL_TEMPLATE: &str = "\
Hi {{name}},

Thanks for registering. To choose your password, request a password reset at:

{{origin}}/password/reset-request

Then follow the link in the e-mail that arrives.
";

/// Trait for outbound mail backends
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Render `template` with `context` and send it to `to`
    async fn send_templated(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &HashMap<&'static str, String>,
    ) -> anyhow::Result<()>;
}

/// Substitute `{{key}}` placeholders; unknown placeholders are left as they are
pub fn render_template(template: &str, context: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            },
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            },
        }
    }
    out.push_str(rest);
    out
}

/// Mailer that logs instead of delivering
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_templated(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &HashMap<&'static str, String>,
    ) -> anyhow::Result<()> {
        let body = render_template(template, context);
        info!(to, subject, bytes = body.len(), "mail not sent (log mailer)");
        tracing::debug!(to, subject, %body, "mail body");
        Ok(())
    }
}
