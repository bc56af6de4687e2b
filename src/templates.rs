//! HTML and plain-text bodies for transactional emails.

use std::time::Duration;

use crate::email_sender::EmailMessage;

const BRAND: &str = "LifeX";

/// Confirmation email for a freshly registered account.
pub fn confirmation_email_render(
    to: &str,
    username: &str,
    link: &str,
    expires_in: Duration,
) -> EmailMessage {
    let validity = validity_describe(expires_in);
    let name = html_escape(username);
    let href = html_escape(link);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: -apple-system, Segoe UI, Roboto, sans-serif; background: #f6f7fb; padding: 24px;">
    <table role="presentation" width="100%" style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; padding: 32px;">
      <tr><td>
        <h1 style="margin: 0 0 16px; font-size: 22px; color: #111827;">Welcome to {BRAND}, {name}!</h1>
        <p style="color: #374151; line-height: 1.5;">Confirm your email address to start discovering local businesses around you.</p>
        <p style="text-align: center; margin: 32px 0;">
          <a href="{href}" style="background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: 600;">Confirm email</a>
        </p>
        <p style="color: #6b7280; font-size: 13px;">Or paste this link into your browser:<br><a href="{href}">{href}</a></p>
        <p style="color: #6b7280; font-size: 13px;">This link expires in {validity}. If you did not create a {BRAND} account, you can ignore this email.</p>
      </td></tr>
    </table>
  </body>
</html>"#
    );

    let text = format!(
        "Welcome to {BRAND}, {username}!\n\n\
         Confirm your email address by opening this link:\n\n{link}\n\n\
         This link expires in {validity}. If you did not create a {BRAND} account, you can ignore this email."
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Confirm your {BRAND} account"),
        html,
        text,
    }
}

/// Password reset email.
pub fn password_reset_email_render(
    to: &str,
    username: &str,
    link: &str,
    expires_in: Duration,
) -> EmailMessage {
    let validity = validity_describe(expires_in);
    let name = html_escape(username);
    let href = html_escape(link);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: -apple-system, Segoe UI, Roboto, sans-serif; background: #f6f7fb; padding: 24px;">
    <table role="presentation" width="100%" style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; padding: 32px;">
      <tr><td>
        <h1 style="margin: 0 0 16px; font-size: 22px; color: #111827;">Reset your password</h1>
        <p style="color: #374151; line-height: 1.5;">Hi {name}, we received a request to reset your {BRAND} password.</p>
        <p style="text-align: center; margin: 32px 0;">
          <a href="{href}" style="background: #2563eb; color: #ffffff; padding: 12px 24px; border-radius: 8px; text-decoration: none; font-weight: 600;">Choose a new password</a>
        </p>
        <p style="color: #6b7280; font-size: 13px;">This link expires in {validity}. If you didn't request this, you can safely ignore this email.</p>
      </td></tr>
    </table>
  </body>
</html>"#
    );

    let text = format!(
        "Hi {username},\n\n\
         You requested a password reset. Open this link to set a new password:\n\n{link}\n\n\
         This link expires in {validity}. If you didn't request this, you can safely ignore this email."
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Reset your {BRAND} password"),
        html,
        text,
    }
}

fn validity_describe(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (value, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
