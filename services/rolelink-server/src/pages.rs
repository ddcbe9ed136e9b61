//! HTML pages served to browsers during the linking flow.

use axum::http::StatusCode;
use rolelink_core::ExternalIdentity;
use rolelink_oauth2::LinkError;

const LANDING_TEMPLATE: &str = include_str!("../static/index.html");

const PAGE_STYLE: &str = r#"
        body {
            font-family: Arial, sans-serif;
            max-width: 600px;
            margin: 50px auto;
            padding: 20px;
            text-align: center;
        }
        h1 { color: #5865f2; }
        .success {
            color: #2e7d32;
            background: #e8f5e9;
            padding: 20px;
            border-radius: 10px;
            margin: 20px 0;
        }
        .error { color: #d32f2f; background: #ffebee; padding: 15px; border-radius: 5px; }
        .info { background: #e3f2fd; padding: 15px; border-radius: 5px; margin: 20px 0; }
        .user-info { margin: 10px 0; font-size: 18px; }
"#;

pub fn escape_html(unsafe_str: &str) -> String {
    unsafe_str
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// The landing page with `authorization_url` as its call to action.
pub fn landing_page(authorization_url: &str) -> String {
    LANDING_TEMPLATE.replace("{{OAUTH_URL}}", &escape_html(authorization_url))
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{PAGE_STYLE}</style>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

pub fn success_page(identity: &ExternalIdentity) -> String {
    page(
        "Linked Role Connected",
        &format!(
            r#"    <h1>Successfully Connected!</h1>
    <div class="success">
        <p><strong>Your Discord account has been linked!</strong></p>
        <div class="user-info"><p>{}</p></div>
    </div>
    <div class="info">
        <p>Your linked role metadata has been updated.</p>
        <p>You can now close this window and return to Discord.</p>
    </div>"#,
            escape_html(&identity.display_tag())
        ),
    )
}

/// Status and page for a failed callback. Only client-caused failures say
/// what went wrong; everything else gets a generic page.
pub fn error_page(error: &LinkError) -> (StatusCode, String) {
    let (title, heading, detail) = match error {
        LinkError::ProviderOAuth(reason) => (
            "OAuth Error",
            "OAuth Error",
            format!(
                "<p>Authorization failed: {}</p><p>Please try again.</p>",
                escape_html(reason)
            ),
        ),
        LinkError::MissingCode => (
            "Missing Code",
            "Missing Authorization Code",
            "<p>No authorization code was provided.</p>".to_string(),
        ),
        LinkError::InvalidState => (
            "Link Expired",
            "Link Expired or Invalid",
            "<p>This authorization link has expired or was already used.</p><p>Please start again from Discord.</p>"
                .to_string(),
        ),
        _ => (
            "Server Error",
            "Server Error",
            "<p>An error occurred while processing your request.</p><p>Please try again later.</p>"
                .to_string(),
        ),
    };

    let status = if error.kind().is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = format!(
        r#"    <h1>{heading}</h1>
    <div class="error">{detail}</div>"#
    );
    (status, page(title, &body))
}
