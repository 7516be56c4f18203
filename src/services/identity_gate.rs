//! Identity gate.
//!
//! Sign-in is delegated to a third-party identity provider. The gate only
//! decides which flow to use and whether the resulting account may keep its
//! session: anyone whose email is not on the allow-list is signed straight
//! back out.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{LazyLock, PoisonError, RwLock},
};
use thiserror::Error;
use tracing::{info, warn};

/// Popup failures after which the redirect flow is tried instead.
const REDIRECT_FALLBACK_CODES: [&str; 4] = [
    "auth/popup-blocked",
    "auth/popup-closed-by-user",
    "auth/cancelled-popup-request",
    "auth/operation-not-supported-in-this-environment",
];

static MOBILE_USER_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Android|iPhone|iPad|iPod|Mobile").expect("user agent pattern is valid")
});

/// Emails permitted to keep a session. Built once at startup, read-only after.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    emails: HashSet<String>,
}

impl AllowList {
    /// Build from a comma-separated list. Entries are trimmed and lowercased;
    /// blank entries are dropped.
    pub fn from_csv(csv: &str) -> Self {
        Self {
            emails: csv.split(',').filter_map(normalize_email).collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        normalize_email(email).is_some_and(|email| self.emails.contains(&email))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    (!email.is_empty()).then(|| email.to_lowercase())
}

/// Public settings of the identity provider's client app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub app_id: String,
}

/// How the provider's sign-in UI is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInFlow {
    /// In-page popup window.
    Popup,
    /// Full-page redirect to the provider and back.
    Redirect,
}

impl SignInFlow {
    /// Mobile browsers go straight to the redirect flow.
    pub fn for_user_agent(user_agent: &str) -> Self {
        if MOBILE_USER_AGENT.is_match(user_agent) {
            SignInFlow::Redirect
        } else {
            SignInFlow::Popup
        }
    }
}

/// An account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Error reported by the identity provider, e.g. `auth/popup-blocked`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether a failed popup should be retried through the redirect flow.
    pub fn falls_back_to_redirect(&self) -> bool {
        REDIRECT_FALLBACK_CODES.contains(&self.code.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Your email is not on the list of allowed accounts.")]
    NotAllowed,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result of starting a sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The popup completed and the account passed the allow-list.
    SignedIn(Account),
    /// The browser is being sent to the provider; the account arrives later
    /// through [`IdentityGate::on_auth_state_changed`].
    Redirecting,
}

/// The third-party identity provider behind the gate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_popup(&self) -> Result<Account, ProviderError>;

    async fn sign_in_with_redirect(&self) -> Result<(), ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Wraps an [`IdentityProvider`] and enforces the allow-list on every
/// session it hands out.
pub struct IdentityGate<P> {
    provider: P,
    allow_list: AllowList,
    current: RwLock<Option<Account>>,
}

impl<P: IdentityProvider> IdentityGate<P> {
    pub fn new(provider: P, allow_list: AllowList) -> Self {
        Self {
            provider,
            allow_list,
            current: RwLock::new(None),
        }
    }

    /// The signed-in, allow-listed account, if any.
    pub fn current_user(&self) -> Option<Account> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a sign-in from a browser with the given user agent.
    ///
    /// Popup failures with a known "popup unusable" code fall back to the
    /// redirect flow; every other failure is returned as is. Nothing is
    /// retried.
    pub async fn sign_in(&self, user_agent: &str) -> Result<SignInOutcome, GateError> {
        if SignInFlow::for_user_agent(user_agent) == SignInFlow::Redirect {
            self.provider.sign_in_with_redirect().await?;
            return Ok(SignInOutcome::Redirecting);
        }

        match self.provider.sign_in_with_popup().await {
            Ok(account) => self.admit(account).await.map(SignInOutcome::SignedIn),
            Err(err) if err.falls_back_to_redirect() => {
                info!("popup sign-in unavailable ({}), using redirect", err.code);
                self.provider.sign_in_with_redirect().await?;
                Ok(SignInOutcome::Redirecting)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Apply a session change reported by the provider (including the end of
    /// a redirect sign-in). Accounts that fail the allow-list are signed out.
    pub async fn on_auth_state_changed(
        &self,
        account: Option<Account>,
    ) -> Result<Option<Account>, GateError> {
        match account {
            Some(account) => self.admit(account).await.map(Some),
            None => {
                self.set_current(None);
                Ok(None)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), GateError> {
        self.provider.sign_out().await?;
        self.set_current(None);
        Ok(())
    }

    async fn admit(&self, account: Account) -> Result<Account, GateError> {
        let allowed = account
            .email
            .as_deref()
            .is_some_and(|email| self.allow_list.contains(email));

        if !allowed {
            warn!("rejecting account {} not on the allow-list", account.uid);
            self.set_current(None);
            self.provider.sign_out().await?;
            return Err(GateError::NotAllowed);
        }

        self.set_current(Some(account.clone()));
        Ok(account)
    }

    fn set_current(&self, account: Option<Account>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = account;
    }
}
