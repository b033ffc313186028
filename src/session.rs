use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::client::LoginToken;
use crate::client::MessagingClient;
use crate::client::SignInOutcome;
use crate::error::Result;
use crate::error::StickerError;
use crate::util::normalize_phone;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignInState {
  #[default]
  Null,
  CodeSent,
  PasswordRequired,
  SignedIn,
}

/// Authentication state of one user account, wrapped around its client.
pub struct Session<C> {
  client: Arc<C>,
  state: watch::Sender<SignInState>,
  login: Mutex<Option<LoginToken>>,
}

impl<C: MessagingClient> Session<C> {
  pub fn new(client: Arc<C>) -> Self {
    let (state, _) = watch::channel(SignInState::Null);
    Self {
      client,
      state,
      login: Mutex::new(None),
    }
  }

  pub fn client(&self) -> &Arc<C> {
    &self.client
  }

  pub fn state(&self) -> SignInState {
    *self.state.borrow()
  }

  /// Observe state transitions, e.g. to switch from a login page to the pack list.
  pub fn subscribe(&self) -> watch::Receiver<SignInState> {
    self.state.subscribe()
  }

  pub fn require_signed_in(&self) -> Result<()> {
    match self.state() {
      SignInState::SignedIn => Ok(()),
      _ => Err(StickerError::AuthRequired),
    }
  }

  #[instrument(skip(self))]
  pub async fn resume(&self) -> Result<SignInState> {
    if self.client.is_authorized().await? {
      info!("resumed authorized session");
      self.set_state(SignInState::SignedIn);
    }
    Ok(self.state())
  }

  #[instrument(skip(self, phone))]
  pub async fn send_code(&self, phone: &str) -> Result<()> {
    self.expect_state("request a login code", &[SignInState::Null, SignInState::CodeSent])?;
    let phone = normalize_phone(phone).map_err(|err| {
      warn!(error = %err, "rejected phone number");
      StickerError::InvalidPhone(err.to_string())
    })?;
    let token = self.client.request_login_code(&phone).await?;
    *self.login() = Some(token);
    self.set_state(SignInState::CodeSent);
    Ok(())
  }

  #[instrument(skip(self, code))]
  pub async fn sign_in(&self, code: &str) -> Result<SignInState> {
    self.expect_state("sign in", &[SignInState::CodeSent])?;
    let token = self
      .login()
      .clone()
      .ok_or(StickerError::InvalidAuthStep {
        action: "sign in",
        state: SignInState::CodeSent,
      })?;
    match self.client.sign_in(&token, code.trim()).await? {
      SignInOutcome::SignedIn => {
        self.login().take();
        self.set_state(SignInState::SignedIn);
      },
      SignInOutcome::PasswordRequired { hint } => {
        info!(hint = hint.as_deref().unwrap_or("-"), "two-step verification required");
        self.set_state(SignInState::PasswordRequired);
      },
    }
    Ok(self.state())
  }

  #[instrument(skip(self, password))]
  pub async fn check_password(&self, password: &str) -> Result<()> {
    self.expect_state("check the password", &[SignInState::PasswordRequired])?;
    self.client.check_password(password).await?;
    self.login().take();
    self.set_state(SignInState::SignedIn);
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn sign_out(&self) -> Result<()> {
    if self.state() == SignInState::SignedIn {
      self.client.sign_out().await?;
    }
    self.login().take();
    self.set_state(SignInState::Null);
    Ok(())
  }

  fn expect_state(&self, action: &'static str, allowed: &[SignInState]) -> Result<()> {
    let state = self.state();
    if allowed.contains(&state) {
      Ok(())
    } else {
      Err(StickerError::InvalidAuthStep { action, state })
    }
  }

  fn login(&self) -> MutexGuard<'_, Option<LoginToken>> {
    self.login.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn set_state(&self, next: SignInState) {
    let previous = self.state.send_replace(next);
    if previous != next {
      info!(from = ?previous, to = ?next, "sign-in state changed");
    }
  }
}
