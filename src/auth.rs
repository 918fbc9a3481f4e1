//! Authentication collaborator and OAuth2 bootstrap for the Gmail API

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, TriageError};

/// Gmail API scopes needed to read counts and threads and to compose replies
pub const REQUIRED_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

impl Session {
    pub fn new(user_id: &str, email: &str) -> Self {
        Self {
            user: SessionUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        }
    }

    /// The user's email, treating an empty string as absent
    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref().filter(|e| !e.is_empty())
    }

    /// The user's id, treating an empty string as absent
    pub fn user_id(&self) -> Option<&str> {
        Some(self.user.id.as_str()).filter(|id| !id.is_empty())
    }
}

/// Resolves the current session, `None` when nobody is signed in
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth(&self) -> Result<Option<Session>>;
}

/// Auth provider returning a fixed session
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    session: Option<Session>,
}

impl StaticAuth {
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn auth(&self) -> Result<Option<Session>> {
        Ok(self.session.clone())
    }
}

/// Auth provider backed by an OAuth2-authorized Gmail hub
///
/// The session user id is the account's email address, which is what the
/// tracker store keys records by when no separate user table exists.
pub struct GmailAuthProvider {
    hub: Arc<GmailHub>,
}

impl GmailAuthProvider {
    pub fn new(hub: Arc<GmailHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl AuthProvider for GmailAuthProvider {
    async fn auth(&self) -> Result<Option<Session>> {
        let result = self
            .hub
            .users()
            .get_profile("me")
            .add_scope(REQUIRED_SCOPES[0])
            .doit()
            .await;

        match result {
            Ok((_, profile)) => Ok(profile
                .email_address
                .filter(|e| !e.is_empty())
                .map(|email| Session::new(&email, &email))),
            Err(e) => {
                let err = TriageError::from(e);
                if matches!(err, TriageError::Forbidden(_) | TriageError::AuthError(_)) {
                    debug!("Gmail profile lookup rejected, treating as signed out: {}", err);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Uses the installed-app flow with tokens persisted to `token_cache_path`,
/// so later runs refresh silently.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to read credentials: {}", e)))?;

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Token must be cached with the full scope set before concurrent calls start
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| TriageError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}
