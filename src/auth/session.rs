//! Login lifecycle
//!
//! `AuthSession` is the only owner of the credentials and of the current
//! [`Session`]. Everything else asks it for a valid session through
//! [`AuthSession::ensure_valid`].

use crate::api::AccountApi;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::model::{Credentials, Session};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AuthSession {
    api: Arc<dyn AccountApi>,
    credentials: Credentials,
    /// Held across the login round-trip so concurrent callers share one login
    current: Mutex<Option<Arc<Session>>>,
    logger: StructuredLogger,
}

impl AuthSession {
    pub fn new(api: Arc<dyn AccountApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            current: Mutex::new(None),
            logger: get_logger("auth"),
        }
    }

    /// Exchange the stored credentials for a fresh session
    pub async fn login(&self) -> Result<Arc<Session>> {
        let mut current = self.current.lock().await;
        self.login_locked(&mut current).await
    }

    /// Cached session while valid, otherwise a fresh login
    pub async fn ensure_valid(&self) -> Result<Arc<Session>> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref()
            && session.is_valid_at(Utc::now())
        {
            return Ok(Arc::clone(session));
        }
        if current.is_some() {
            self.logger.debug("Session expired; logging in again");
        }
        self.login_locked(&mut current).await
    }

    /// Forget the current session; the next `ensure_valid` logs in
    pub async fn invalidate(&self) {
        let mut current = self.current.lock().await;
        if current.take().is_some() {
            self.logger.info("Session invalidated");
        }
    }

    /// Forget `rejected` unless a newer session already replaced it
    pub async fn invalidate_session(&self, rejected: &Arc<Session>) {
        let mut current = self.current.lock().await;
        if current
            .as_ref()
            .is_some_and(|held| Arc::ptr_eq(held, rejected))
        {
            *current = None;
            self.logger
                .info("Session rejected upstream; next call will log in again");
        }
    }

    /// Whether a session is currently cached
    pub async fn has_session(&self) -> bool {
        self.current.lock().await.is_some()
    }

    async fn login_locked(&self, current: &mut Option<Arc<Session>>) -> Result<Arc<Session>> {
        match self.api.login(&self.credentials).await {
            Ok(session) => {
                let session = Arc::new(session);
                *current = Some(Arc::clone(&session));
                self.logger.info("Login succeeded");
                Ok(session)
            }
            Err(e) => {
                *current = None;
                self.logger
                    .error(&format!("Login failed ({}): {}", e.kind(), e));
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("username", &self.credentials.username)
            .finish_non_exhaustive()
    }
}
