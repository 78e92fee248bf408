use std::sync::Arc;
use std::time::Instant;

use crate::auth::TokenIssuer;
use crate::store::Store;

/// Shared handler context. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    admin_emails: Vec<String>,
    started_at: Instant,
}

impl AppState {
    /// `admin_emails` are compared case-insensitively against registering users.
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, admin_emails: Vec<String>) -> Self {
        let admin_emails = admin_emails
            .into_iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        Self {
            inner: Arc::new(AppStateInner {
                store,
                tokens,
                admin_emails,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.inner.admin_emails.iter().any(|admin| admin == email)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64()
    }
}
