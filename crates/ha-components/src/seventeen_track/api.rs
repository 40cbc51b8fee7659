//! Client seam
//!
//! The integration talks to 17track through [`SeventeenTrackApi`] and
//! obtains logged-in clients from a [`ClientFactory`], so the HTTP client can
//! be swapped out in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use ha_core::consts::CONF_TOKEN;
use seventeentrack::{Client, Endpoints, Package, Profile, SeventeenTrackError, Summary};
use tracing::debug;

use super::errors::ClientError;

/// Operations the integration needs from a logged-in 17track account
#[async_trait]
pub trait SeventeenTrackApi: Send + Sync {
    fn account_id(&self) -> &str;

    async fn packages(&self, show_archived: bool, tz: Tz) -> Result<Vec<Package>, SeventeenTrackError>;

    async fn summary(&self, show_archived: bool) -> Result<Summary, SeventeenTrackError>;

    async fn add_package_with_carrier(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<(), SeventeenTrackError>;
}

/// Produces logged-in clients
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn login(&self, token: &str) -> Result<Arc<dyn SeventeenTrackApi>, ClientError>;
}

/// Log in with the token stored in config entry (or flow) data
pub async fn get_client(
    factory: &dyn ClientFactory,
    data: &HashMap<String, serde_json::Value>,
) -> Result<Arc<dyn SeventeenTrackApi>, ClientError> {
    let token = data
        .get(CONF_TOKEN)
        .and_then(|v| v.as_str())
        .ok_or(ClientError::MissingToken)?;
    factory.login(token).await
}

/// [`ClientFactory`] backed by the HTTP client library
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpClientFactory {
    /// Use one HTTP session for every account
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, Endpoints::default())
    }

    pub fn with_endpoints(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn login(&self, token: &str) -> Result<Arc<dyn SeventeenTrackApi>, ClientError> {
        let mut client = Client::with_endpoints(
            self.http.clone(),
            self.endpoints.user_api.clone(),
            self.endpoints.buyer_api.clone(),
        );
        if !client.profile.login(token).await? {
            return Err(ClientError::Authentication);
        }
        let account_id = client
            .profile
            .account_id()
            .map(str::to_string)
            .ok_or(ClientError::Authentication)?;
        debug!(%account_id, "17Track login succeeded");
        Ok(Arc::new(HttpAccount {
            profile: client.profile,
            account_id,
        }))
    }
}

struct HttpAccount {
    profile: Profile,
    account_id: String,
}

#[async_trait]
impl SeventeenTrackApi for HttpAccount {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn packages(&self, show_archived: bool, tz: Tz) -> Result<Vec<Package>, SeventeenTrackError> {
        self.profile.packages(show_archived, tz).await
    }

    async fn summary(&self, show_archived: bool) -> Result<Summary, SeventeenTrackError> {
        self.profile.summary(show_archived).await
    }

    async fn add_package_with_carrier(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<(), SeventeenTrackError> {
        self.profile
            .add_package_with_carrier(tracking_number, carrier, friendly_name)
            .await
    }
}
