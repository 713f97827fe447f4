//! User profile lookup.
//!
//! Checkout needs the shipping address from the user's profile; everything
//! else on the profile belongs to the account surface and is out of scope
//! here. The [`ProfileDirectory`] trait exists so tests can supply canned
//! profiles.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use pomelo_core::UserId;

use crate::config::ApiConfig;
use crate::gateway::GatewayError;
use crate::types::UserProfile;

/// Source of user profiles.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Fetch the profile for a user.
    async fn profile_by_id(&self, user_id: UserId) -> Result<UserProfile, GatewayError>;
}

/// Profile fields as the backend returns them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDto {
    first_name: String,
    last_name: String,
    email: String,
    address_line1: String,
    address_line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
}

impl From<ProfileDto> for UserProfile {
    fn from(dto: ProfileDto) -> Self {
        Self {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email,
            address_line1: dto.address_line1,
            address_line2: dto.address_line2,
            city: dto.city,
            state: dto.state,
            postal_code: dto.postal_code,
        }
    }
}

/// `reqwest`-backed implementation of [`ProfileDirectory`].
#[derive(Clone)]
pub struct HttpProfileDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpProfileDirectory {
    /// Create a new profile directory client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the API token is
    /// not a valid header value.
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| GatewayError::Parse(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert("Authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(DirectoryInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn profile_by_id(&self, user_id: UserId) -> Result<UserProfile, GatewayError> {
        let url = self
            .inner
            .base_url
            .join(&format!("api/user/{user_id}"))
            .map_err(|e| GatewayError::Parse(format!("invalid endpoint: {e}")))?;

        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!("user {user_id}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let dto: ProfileDto = response.json().await?;
        Ok(dto.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_dto_parses_camel_case() {
        let dto: ProfileDto = serde_json::from_value(json!({
            "firstName": "Ada",
            "lastName": "Byron",
            "email": "ada@example.com",
            "addressLine1": "12 Main St",
            "addressLine2": "Apt 4",
            "city": "London",
            "state": null,
            "postalCode": "N1 9GU"
        }))
        .unwrap();

        let profile = UserProfile::from(dto);
        assert_eq!(profile.shipping_address(), "12 Main St Apt 4");
        assert_eq!(profile.city.as_deref(), Some("London"));
    }
}
