//! Identity-provider boundary: disposable email blocking.
//!
//! Sign-up and sign-in belong to the external identity provider. This module owns the
//! block-list of throwaway email domains and applies it twice: as a pre-submission
//! check that answers with a localized message, and as the provider's before-create
//! hook that rejects with `invalid-argument`. Both read the same list, so either one
//! alone is enough to stop a blocked address.

use serde::Serialize;
use tracing::{info, instrument};

pub const BLOCKED_DOMAINS: &[&str] = &[
    "mailinator.com",
    "temp-mail.org",
    "yopmail.com",
    "10minutemail.com",
    "guerrillamail.com",
    "throwawaymail.com",
    "getnada.com",
    "maildrop.cc",
    "inboxalias.com",
    "tempmail.com",
    "dispostable.com",
    "mohmal.com",
    "trashmail.com",
    "emailondeck.com",
    "tempinbox.com",
    "mail.tm",
];

/// Error code the provider returns when the before-create hook rejects an address.
pub const PROVIDER_BLOCKED_CODE: &str = "auth/invalid-argument";
/// Code the before-create hook raises.
pub const HOOK_REJECT_CODE: &str = "invalid-argument";

pub const DISPOSABLE_PRECHECK_MESSAGE: &str =
    "Kripya ek temporary email ka upyog na karein. Dusra email chunein.";
pub const DISPOSABLE_PROVIDER_MESSAGE: &str =
    "Kripya ek temporary email ka upyog na karein. Email se sign up karein.";
pub const DISPOSABLE_HOOK_MESSAGE: &str =
    "Temporary emails are not allowed. Please use a permanent email address.";

/// Domain part of an address, lowercased. `None` when there is no `@` or nothing after it.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

pub fn is_disposable(email: &str) -> bool {
    email_domain(email).is_some_and(|d| BLOCKED_DOMAINS.contains(&d.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignupRejection {
    #[error("{}", DISPOSABLE_PRECHECK_MESSAGE)]
    DisposableEmail,
}

/// Pre-submission check run before handing the address to the identity provider.
#[instrument(level = "info", skip(email))]
pub fn check_signup_email(email: &str) -> Result<(), SignupRejection> {
    if is_disposable(email) {
        info!(target: "auth", domain = ?email_domain(email), "Rejected disposable email before sign-up");
        return Err(SignupRejection::DisposableEmail);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HookError {
    pub code: &'static str,
    pub message: &'static str,
}

/// Server-side enforcement, invoked by the identity provider before an account exists.
#[instrument(level = "info", skip(email))]
pub fn before_user_created(email: Option<&str>) -> Result<(), HookError> {
    match email {
        Some(e) if is_disposable(e) => {
            info!(target: "auth", domain = ?email_domain(e), "Blocked account creation for disposable email");
            Err(HookError { code: HOOK_REJECT_CODE, message: DISPOSABLE_HOOK_MESSAGE })
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthFailure {
    /// The provider's hook refused a disposable address.
    BlockedDisposableEmail { message: String },
    Provider { message: String },
}

impl AuthFailure {
    pub fn message(&self) -> &str {
        match self {
            AuthFailure::BlockedDisposableEmail { message } | AuthFailure::Provider { message } => message,
        }
    }
}

/// Map an error reported by the identity provider to what the user should see.
pub fn interpret_provider_error(code: &str, message: &str) -> AuthFailure {
    if code == PROVIDER_BLOCKED_CODE {
        AuthFailure::BlockedDisposableEmail { message: DISPOSABLE_PROVIDER_MESSAGE.to_string() }
    } else {
        AuthFailure::Provider { message: message.to_string() }
    }
}
