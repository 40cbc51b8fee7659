//! HTTP plumbing for the user and buyer APIs
//!
//! Both APIs take a JSON envelope `{version, method, param, sourcetype}` via
//! POST and answer `{Code, Json}`; `Code == 0` means success. The account
//! token travels as the `Last-Event-ID` cookie.

use chrono_tz::Tz;
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SeventeenTrackError};
use crate::package::{
    empty_summary, package_status, string_or_number, Package, Summary, TrackInfo,
};

pub const DEFAULT_USER_API: &str = "https://user.17track.net/userapi/call";
pub const DEFAULT_BUYER_API: &str = "https://buyer.17track.net/orderapi/call";

const PAGE_SIZE: usize = 40;
/// Upper bound on list pages requested for one listing
const MAX_PAGES: u32 = 100;

/// Where the two APIs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub user_api: String,
    pub buyer_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            user_api: DEFAULT_USER_API.to_string(),
            buyer_api: DEFAULT_BUYER_API.to_string(),
        }
    }
}

/// Entry point of the library
#[derive(Debug, Clone)]
pub struct Client {
    pub profile: Profile,
}

impl Client {
    /// Create a client talking to 17track.net
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, DEFAULT_USER_API, DEFAULT_BUYER_API)
    }

    /// Create a client talking to other API endpoints
    #[must_use]
    pub fn with_endpoints(
        http: reqwest::Client,
        user_api: impl Into<String>,
        buyer_api: impl Into<String>,
    ) -> Self {
        Self {
            profile: Profile {
                http,
                endpoints: Endpoints {
                    user_api: user_api.into(),
                    buyer_api: buyer_api.into(),
                },
                token: None,
                account_id: None,
            },
        }
    }
}

/// A 17track account
#[derive(Debug, Clone)]
pub struct Profile {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
    account_id: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: &'static str,
    method: &'a str,
    param: Value,
    sourcetype: u8,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(rename = "Code")]
    code: i64,
    #[serde(rename = "Json", default)]
    json: Value,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(deserialize_with = "string_or_number")]
    uid: String,
}

#[derive(Deserialize)]
struct IndexData {
    #[serde(default)]
    eitem: Vec<StatusCount>,
}

#[derive(Deserialize)]
struct StatusCount {
    e: i64,
    ec: u32,
}

impl Profile {
    /// Account id of the logged-in account
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Log in with an account token.
    ///
    /// Returns `false` when the API rejects the token. Transport failures
    /// are errors.
    #[instrument(skip_all)]
    pub async fn login(&mut self, token: &str) -> Result<bool> {
        let reply = self
            .call(&self.endpoints.user_api, token, "GetUserInfo", json!({}))
            .await?;

        if reply.code != 0 {
            debug!("Login rejected with code {}", reply.code);
            return Ok(false);
        }

        let info: UserInfo = serde_json::from_value(reply.json)?;
        debug!(account_id = %info.uid, "Logged in");
        self.token = Some(token.to_string());
        self.account_id = Some(info.uid);
        Ok(true)
    }

    /// All packages of the account; timestamps are converted to `tz`
    #[instrument(skip(self))]
    pub async fn packages(&self, show_archived: bool, tz: Tz) -> Result<Vec<Package>> {
        Ok(self
            .track_infos(show_archived)
            .await?
            .into_iter()
            .map(|info| info.into_package(tz))
            .collect())
    }

    /// Package count per status; every known status is present
    #[instrument(skip(self))]
    pub async fn summary(&self, show_archived: bool) -> Result<Summary> {
        let data: IndexData = self
            .buyer_call("GetIndexData", json!({ "IsArchived": show_archived }))
            .await?;

        let mut summary = empty_summary();
        for item in data.eitem {
            match summary.get_mut(package_status(item.e)) {
                Some(count) => *count = item.ec,
                None => debug!("Ignoring count for unknown status code {}", item.e),
            }
        }
        Ok(summary)
    }

    /// Start tracking a package
    #[instrument(skip(self))]
    pub async fn add_package(&self, tracking_number: &str) -> Result<()> {
        let _: Value = self
            .buyer_call("AddTrackNo", json!({ "TrackNos": [tracking_number] }))
            .await?;
        Ok(())
    }

    /// Start tracking a package, then set its carrier and friendly name.
    ///
    /// Fails with [`SeventeenTrackError::InvalidTrackingNumber`] if the new
    /// package cannot be found afterwards to apply carrier or name.
    #[instrument(skip(self))]
    pub async fn add_package_with_carrier(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<()> {
        self.add_package(tracking_number).await?;
        if carrier.is_none() && friendly_name.is_none() {
            return Ok(());
        }

        let infos = self.track_infos(false).await?;
        let info = infos
            .iter()
            .find(|info| info.tracking_number() == tracking_number)
            .ok_or_else(|| SeventeenTrackError::InvalidTrackingNumber(tracking_number.to_string()))?;

        if let Some(carrier) = carrier {
            let _: Value = self
                .buyer_call(
                    "SetTrackCarrier",
                    json!({ "TrackInfoId": info.id(), "Carrier": carrier }),
                )
                .await?;
        }
        if let Some(name) = friendly_name {
            let _: Value = self
                .buyer_call(
                    "SetTrackRemark",
                    json!({ "TrackInfoId": info.id(), "Remark": name }),
                )
                .await?;
        }
        Ok(())
    }

    /// Every row of the package list, fetched page by page until a short page
    async fn track_infos(&self, show_archived: bool) -> Result<Vec<TrackInfo>> {
        let mut infos = Vec::new();
        for page in 1..=MAX_PAGES {
            let rows: Vec<TrackInfo> = self
                .buyer_call(
                    "GetTrackInfoList",
                    json!({
                        "IsArchived": show_archived,
                        "Item": "",
                        "Page": page,
                        "PerPage": PAGE_SIZE,
                        "PackageState": "",
                        "Sequence": "0",
                    }),
                )
                .await?;
            let last = rows.len() < PAGE_SIZE;
            infos.extend(rows);
            if last {
                return Ok(infos);
            }
        }
        warn!("Package list still not exhausted after {} pages", MAX_PAGES);
        Ok(infos)
    }

    async fn buyer_call<T: DeserializeOwned>(&self, method: &str, param: Value) -> Result<T> {
        let token = self.token.as_deref().ok_or(SeventeenTrackError::NotLoggedIn)?;
        let reply = self
            .call(&self.endpoints.buyer_api, token, method, param)
            .await?;

        if reply.code != 0 {
            return Err(SeventeenTrackError::Request(format!(
                "{} returned code {}{}",
                method,
                reply.code,
                reply.message.map(|m| format!(": {m}")).unwrap_or_default()
            )));
        }
        Ok(serde_json::from_value(reply.json)?)
    }

    async fn call(&self, url: &str, token: &str, method: &str, param: Value) -> Result<Reply> {
        debug!(method, "Calling 17track API");
        let body = self
            .http
            .post(url)
            .header(COOKIE, format!("Last-Event-ID={token}"))
            .json(&Envelope {
                version: "1.0",
                method,
                param,
                sourcetype: 0,
            })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}
