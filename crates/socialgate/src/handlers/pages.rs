//! HTML page handlers.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use socialgate_auth::OptionalUser;
use socialgate_core::identity::{Provider, User};

use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct LoginPageQuery {
    pub return_to: Option<String>,
    pub error: Option<String>,
}

/// Handler for GET /
///
/// - Unauthenticated: renders a landing page with a sign-in link
/// - Authenticated: redirects to the dashboard
pub async fn index(OptionalUser(user): OptionalUser) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    Html(page(
        "Socialgate",
        r#"<h1 class="title">Socialgate</h1>
            <p class="subtitle">Sign in with your favorite provider to get started.</p>
            <a href="/login" class="button">Sign in</a>"#,
    ))
    .into_response()
}

/// Handler for GET /login
///
/// - Unauthenticated: renders login page with one button per enabled provider
/// - Authenticated: redirects to the dashboard
pub async fn login_page(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let return_to_param = query
        .return_to
        .as_ref()
        .map(|r| format!("?return_to={}", urlencoding::encode(r)))
        .unwrap_or_default();

    let mut buttons = String::new();
    for provider in state.auth.config.enabled_providers() {
        buttons.push_str(&format!(
            r#"<a href="/auth/{provider}{return_to_param}" class="button button-{provider}">Continue with {}</a>"#,
            provider_label(provider)
        ));
    }
    if buttons.is_empty() {
        buttons = r#"<p class="notice">No authentication providers configured.</p>"#.to_string();
    }

    let error_notice = if query.error.is_some() {
        r#"<p class="notice notice-error">Sign-in failed. Please try again.</p>"#
    } else {
        ""
    };

    Html(page(
        "Login - Socialgate",
        &format!(
            r#"<h1 class="title">Welcome back</h1>
            <p class="subtitle">Sign in to continue</p>
            {error_notice}
            <div class="buttons">{buttons}</div>"#
        ),
    ))
    .into_response()
}

/// Handler for GET /dashboard
///
/// Unauthenticated visitors are sent to the login page instead of getting a
/// bare 401.
pub async fn dashboard(OptionalUser(user): OptionalUser) -> Response {
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };

    Html(page("Dashboard - Socialgate", &dashboard_body(&user))).into_response()
}

fn dashboard_body(user: &User) -> String {
    let name = user.name.as_deref().unwrap_or("there");
    let avatar = user
        .profile_picture
        .as_ref()
        .map(|url| format!(r#"<img class="avatar" src="{url}" alt="">"#))
        .unwrap_or_default();

    format!(
        r#"{avatar}
            <h1 class="title">Hello, {name}</h1>
            <p class="subtitle">Signed in as {email} via {provider}</p>
            <form method="post" action="/auth/logout">
                <button type="submit" class="button">Log out</button>
            </form>"#,
        email = user.email,
        provider = provider_label(user.provider),
    )
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "Google",
        Provider::Discord => "Discord",
        Provider::Facebook => "Facebook",
    }
}

/// Wraps page content in the shared document shell.
fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
            font-family: system-ui, sans-serif;
            background: #f5f5f5;
        }}
        .card {{
            background: #fff;
            border-radius: 12px;
            padding: 2.5rem;
            box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1);
            max-width: 400px;
            width: 100%;
            text-align: center;
        }}
        .title {{ margin: 0 0 0.5rem 0; font-size: 1.75rem; color: #333; }}
        .subtitle {{ margin: 0 0 2rem 0; color: #666; font-size: 0.95rem; }}
        .buttons {{ display: flex; flex-direction: column; gap: 1rem; }}
        .button {{
            display: inline-block;
            padding: 0.875rem 1.5rem;
            border: 1px solid #ddd;
            border-radius: 8px;
            background: #fff;
            color: #333;
            font-size: 1rem;
            font-weight: 500;
            text-decoration: none;
            cursor: pointer;
        }}
        .button:hover {{ background: #f8f8f8; }}
        .button-discord {{ background: #5865f2; border-color: #5865f2; color: #fff; }}
        .button-facebook {{ background: #1877f2; border-color: #1877f2; color: #fff; }}
        .notice {{ color: #666; font-style: italic; }}
        .notice-error {{ color: #b00020; }}
        .avatar {{ width: 64px; height: 64px; border-radius: 50%; margin-bottom: 1rem; }}
    </style>
</head>
<body>
    <div class="card">
        {body}
    </div>
</body>
</html>"#
    )
}
