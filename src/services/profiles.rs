use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{HousingRecord, LifestyleRecord, PreferenceRecord, ProfileBundle, UserRecord};

/// Errors that can occur when talking to the profile directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("directory returned error: {0}")]
    ApiError(String),

    #[error("unauthorized: invalid API key")]
    Unauthorized,

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

/// Read-only view onto the user/profile service.
///
/// The engine uses it for ban/pause checks and to assemble the
/// lifestyle/housing/preference bundles the scorer consumes.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Fetch the user record, `None` if the user does not exist.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Fetch the scoring bundle. Missing sub-records come back as `None`
    /// and are simply never scored.
    async fn get_bundle(&self, user_id: &str) -> Result<ProfileBundle, DirectoryError>;
}

/// HTTP client for the profile directory service.
///
/// Handles all communication with the user/profile backend:
/// - fetching user records for ban/pause checks
/// - fetching lifestyle/housing/preference records for scoring
pub struct ProfileClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl ProfileClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// GET a JSON resource; `Ok(None)` on 404.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, DirectoryError> {
        let url = self.url(path);
        tracing::debug!("Fetching from directory: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DirectoryError::Unauthorized),
            status if status.is_success() => {
                let value = response
                    .json::<T>()
                    .await
                    .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
                Ok(Some(value))
            }
            status => Err(DirectoryError::ApiError(format!(
                "directory request to {} failed: {}",
                url, status
            ))),
        }
    }
}

#[async_trait]
impl ProfileDirectory for ProfileClient {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let encoded = urlencoding::encode(user_id);
        self.get_json(&format!("/users/{}", encoded)).await
    }

    async fn get_bundle(&self, user_id: &str) -> Result<ProfileBundle, DirectoryError> {
        let encoded = urlencoding::encode(user_id);

        let lifestyle: Option<LifestyleRecord> =
            self.get_json(&format!("/users/{}/lifestyle", encoded)).await?;
        let housing: Option<HousingRecord> =
            self.get_json(&format!("/users/{}/housing", encoded)).await?;
        let preferences: Option<PreferenceRecord> = self
            .get_json(&format!("/users/{}/preferences", encoded))
            .await?;

        Ok(ProfileBundle {
            user_id: user_id.to_string(),
            lifestyle,
            housing,
            preferences,
        })
    }
}

/// In-memory directory for tests and local development.
///
/// Seeded up front; unknown users resolve to `None` and unknown bundles
/// to an empty bundle, mirroring a directory with nothing disclosed.
#[derive(Default)]
pub struct StaticDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    bundles: RwLock<HashMap<String, ProfileBundle>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.user_id.clone(), user);
    }

    pub async fn insert_bundle(&self, bundle: ProfileBundle) {
        self.bundles
            .write()
            .await
            .insert(bundle.user_id.clone(), bundle);
    }
}

#[async_trait]
impl ProfileDirectory for StaticDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn get_bundle(&self, user_id: &str) -> Result<ProfileBundle, DirectoryError> {
        Ok(self
            .bundles
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ProfileBundle {
                user_id: user_id.to_string(),
                ..ProfileBundle::default()
            }))
    }
}
