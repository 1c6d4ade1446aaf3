//! Access/refresh credential pair with durable persistence.

use async_trait::async_trait;
use storedesk_shared::{api, CredentialPair, RefreshRequest};
use url::Url;

use crate::api_client::ApiClient;
use crate::storage::{Storage, StorageError};

const SESSION_KEY: &str = "session";

/// Source of the credential the push channel is opened with.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access credential, if any.
    fn access_token(&self) -> Option<String>;

    /// Exchange the refresh credential for a new pair.
    ///
    /// Returns `None` on any failure and leaves the stored pair untouched.
    async fn refresh(&self) -> Option<CredentialPair>;
}

/// Credentials kept in [`Storage`] and refreshed against the backend.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    storage: Storage,
    api: ApiClient,
}

impl StoredCredentials {
    pub fn new(storage: Storage, api_url: &Url) -> Self {
        Self {
            storage,
            api: ApiClient::new().with_base_url(api_url.as_str()),
        }
    }

    /// The stored pair.
    pub fn pair(&self) -> Option<CredentialPair> {
        self.storage.load(SESSION_KEY)
    }

    /// Persist a pair obtained elsewhere (login, seeding from the environment).
    pub fn store(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        self.storage.save(SESSION_KEY, pair)
    }

    /// Forget the stored pair (logout).
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(SESSION_KEY)
    }
}

#[async_trait]
impl CredentialProvider for StoredCredentials {
    fn access_token(&self) -> Option<String> {
        self.pair()
            .map(|pair| pair.access_token)
            .filter(|token| !token.is_empty())
    }

    async fn refresh(&self) -> Option<CredentialPair> {
        let Some(current) = self.pair().filter(|pair| !pair.refresh_token.is_empty()) else {
            tracing::debug!("No refresh credential stored, cannot refresh");
            return None;
        };

        let request = RefreshRequest {
            refresh_token: current.refresh_token,
        };
        let pair: CredentialPair = match self.api.post_json(api::REFRESH_PATH, &request).await {
            Ok(pair) => pair,
            Err(e) if e.is_auth_rejection() => {
                tracing::warn!("Credential refresh rejected: {}", e);
                return None;
            }
            Err(e) => {
                tracing::warn!("Credential refresh failed: {}", e);
                return None;
            }
        };

        if let Err(e) = self.store(&pair) {
            tracing::warn!("Refreshed credentials could not be persisted: {}", e);
            return None;
        }

        tracing::info!("Credentials refreshed");
        Some(pair)
    }
}
