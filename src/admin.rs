//! Maintenance tasks run with the platform's service-role key.

use crate::backend::{AuthUser, BackendResult, UserAdmin};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// The user existed and their e-mail is now confirmed.
    Confirmed(AuthUser),
    /// No user had that e-mail; one was created already confirmed.
    Created(AuthUser),
    /// No user had that e-mail and no password was given to create one.
    NotFound,
}

/// Confirm the e-mail of the user registered as `email`, or create that user
/// confirmed when `password` is given and nobody has the address yet.
pub async fn confirm_user(
    admin: &dyn UserAdmin,
    email: &str,
    password: Option<&str>,
) -> BackendResult<ConfirmOutcome> {
    let users = admin.list_users().await?;
    let existing = users
        .iter()
        .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)));

    if let Some(user) = existing {
        if user.email_confirmed_at.is_some() {
            tracing::info!("{} is already confirmed", email);
            return Ok(ConfirmOutcome::Confirmed(user.clone()));
        }
        let user = admin.confirm_email(&user.id).await?;
        tracing::info!("Confirmed {}", email);
        return Ok(ConfirmOutcome::Confirmed(user));
    }

    match password {
        Some(password) => {
            let user = admin.create_confirmed_user(email, password).await?;
            tracing::info!("Created confirmed user {}", email);
            Ok(ConfirmOutcome::Created(user))
        }
        None => Ok(ConfirmOutcome::NotFound),
    }
}
