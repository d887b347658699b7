//! CLI command implementations.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use lexlink_auth::{ApiClient, AuthError, OtpChannel, Role, SessionManager};
use serde_json::Value;
use std::io::{self, Write};

const MAX_VERIFY_ATTEMPTS: usize = 3;

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn roles_line(roles: &std::collections::BTreeSet<Role>) -> String {
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sign in with a one-time code.
pub async fn login(
    session: &SessionManager,
    email: Option<String>,
    phone: Option<String>,
    role: Role,
    format: &OutputFormat,
) -> Result<()> {
    if session.is_authenticated() {
        if let Some(user) = session.snapshot().user {
            let who = user.email.clone().unwrap_or(user.subject_id);
            output::print_success(&format!("Already signed in as {who}"), format);
            return Ok(());
        }
    }

    let (identifier, channel) = match (email, phone) {
        (Some(email), None) => (email, OtpChannel::Email),
        (None, Some(phone)) => (phone, OtpChannel::Phone),
        _ => {
            let email = prompt("Email")?;
            if email.is_empty() {
                output::print_error("An email address is required", format);
                return Ok(());
            }
            (email, OtpChannel::Email)
        }
    };

    if let Err(error) = session.request_otp(&identifier, channel, role).await {
        output::print_error(&format!("Could not send a code: {error}"), format);
        return Ok(());
    }
    println!("A one-time code was sent to {identifier}.");

    for attempt in 1..=MAX_VERIFY_ATTEMPTS {
        let code = prompt("Code")?;
        if code.is_empty() {
            continue;
        }

        match session.verify_otp(&identifier, channel, &code, role).await {
            Ok(snapshot) => {
                match snapshot.user {
                    Some(user) => {
                        let who = user.email.clone().unwrap_or(user.subject_id.clone());
                        output::print_success(
                            &format!("Signed in as {who} ({})", roles_line(&user.roles)),
                            format,
                        );
                    }
                    None => output::print_success("Signed in", format),
                }
                return Ok(());
            }
            Err(error @ AuthError::OtpVerify(_)) if attempt < MAX_VERIFY_ATTEMPTS => {
                output::print_error(&error.to_string(), format);
            }
            Err(error) => {
                output::print_error(&format!("Sign-in failed: {error}"), format);
                return Ok(());
            }
        }
    }

    output::print_error("Too many failed attempts", format);
    Ok(())
}

/// Show the local session state.
pub fn status(session: &SessionManager, format: &OutputFormat) -> Result<()> {
    let snapshot = session.snapshot();

    match format {
        OutputFormat::Text => match &snapshot.user {
            Some(user) => {
                println!("Session: authenticated");
                output::print_row("Subject", &user.subject_id);
                if let Some(email) = &user.email {
                    output::print_row("Email", email);
                }
                output::print_row("Roles", &roles_line(&user.roles));
                if let Some(expires) = user.expires_at() {
                    output::print_row("Expires", &expires.to_rfc3339());
                }
            }
            None => println!("Session: anonymous"),
        },
        OutputFormat::Json => {
            let body = serde_json::json!({
                "authenticated": snapshot.is_authenticated(),
                "subject_id": snapshot.user.as_ref().map(|u| u.subject_id.clone()),
                "email": snapshot.user.as_ref().and_then(|u| u.email.clone()),
                "roles": snapshot
                    .user
                    .as_ref()
                    .map(|u| u.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>()),
            });
            println!("{body}");
        }
    }

    Ok(())
}

/// Fetch the signed-in user's profile through the authorized client.
pub async fn me(session: &SessionManager, format: &OutputFormat) -> Result<()> {
    if !session.is_authenticated() {
        output::print_error("Not signed in", format);
        return Ok(());
    }

    let api = ApiClient::new(session.clone());
    let response = api.get("/auth/me").await?;
    if !response.status().is_success() {
        output::print_error(
            &format!("Profile fetch failed: HTTP {}", response.status()),
            format,
        );
        return Ok(());
    }

    let body: Value = response.json().await?;
    let profile = body.get("data").cloned().unwrap_or(Value::Null);
    match format {
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(&profile)?),
        OutputFormat::Json => println!("{profile}"),
    }

    Ok(())
}

/// Sign out and clear stored tokens.
pub fn logout(session: &SessionManager, format: &OutputFormat) -> Result<()> {
    session.logout();
    output::print_success("Signed out", format);
    Ok(())
}
