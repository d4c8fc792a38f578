// ============================
// crates/backend-lib/src/pages.rs
// ============================
//! Minimal server-rendered pages for browser clients.

/// Escape text for use in HTML content and attribute values
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sign-in form posting back to `action`.
///
/// `signed_in_as` adds an "already signed in" notice; `flash` shows the
/// outcome of a failed attempt.
pub fn sign_in_page(action: &str, signed_in_as: Option<&str>, flash: Option<&str>) -> String {
    let notice = signed_in_as
        .map(|name| {
            format!(
                r#"<form class="notice" method="post" action="/sign-out">You are signed in as {}. <button type="submit">Sign out</button></form>"#,
                html_escape(name)
            )
        })
        .unwrap_or_default();
    let error = flash
        .map(|msg| format!(r#"<p class="error">{}</p>"#, html_escape(msg)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Sign in</title>
</head><body>
<h1>Sign in</h1>
{notice}
{error}
<form method="post" action="{action}">
  <label>E-mail <input type="email" name="username" required autocomplete="username"></label>
  <label>Password <input type="password" name="password" required autocomplete="current-password"></label>
  <button type="submit">Sign in</button>
</form>
<p><a href="/password/reset-request">Forgotten your password?</a></p>
</body></html>
"#,
        action = html_escape(action),
    )
}

/// Form asking for the address to send a reset link to
pub fn reset_request_page() -> String {
    r#"<!doctype html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Reset password</title>
</head><body>
<h1>Reset password</h1>
<form method="post" action="/password/reset-request">
  <label>E-mail <input type="email" name="username" required autocomplete="username"></label>
  <button type="submit">Send reset link</button>
</form>
</body></html>
"#
    .to_string()
}

/// Form choosing a new password, posting back to `action`
pub fn reset_page(action: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Choose a new password</title>
</head><body>
<h1>Choose a new password</h1>
<form method="post" action="{action}">
  <label>New password <input type="password" name="password" required autocomplete="new-password"></label>
  <label>Confirm <input type="password" name="passwordConfirm" required autocomplete="new-password"></label>
  <button type="submit">Set password</button>
</form>
</body></html>
"#,
        action = html_escape(action),
    )
}

/// Plain message page
pub fn message_page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html>\n<title>{title}</title>\n<h1>{title}</h1>\n<p>{message}</p>\n",
        title = html_escape(title),
        message = html_escape(message),
    )
}
