//! In-memory 17Track accounts for integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::TimeZone;
use chrono_tz::Tz;
use ha_config::CoreConfig;
use ha_config_entries::ConfigEntry;
use ha_core::consts::{CONF_NAME, CONF_TOKEN};
use ha_helpers::HomeAssistant;
use serde_json::Value;
use seventeentrack::{Package, SeventeenTrackError, Summary, PACKAGE_STATUSES};

use super::api::{ClientFactory, SeventeenTrackApi};
use super::errors::ClientError;
use super::{SeventeenTrack, DOMAIN};

/// How the next `add_package_with_carrier` call ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Conflict,
    UnknownNumber,
}

/// One submitted package: tracking number, carrier, friendly name
pub type Submission = (String, Option<String>, Option<String>);

pub struct MockAccount {
    account_id: String,
    pub packages: Mutex<Vec<Package>>,
    pub archived_packages: Mutex<Vec<Package>>,
    pub summary: Mutex<Summary>,
    pub archived_summary: Mutex<Summary>,
    pub failing: AtomicBool,
    pub add_outcome: Mutex<AddOutcome>,
    pub submissions: Mutex<Vec<Submission>>,
    pub package_fetches: AtomicUsize,
}

impl MockAccount {
    /// Account with one package in transit and one delivered
    pub fn new(account_id: &str) -> Self {
        let mut summary = summary_of(&[]);
        summary.insert("In Transit".to_string(), 1);
        summary.insert("Delivered".to_string(), 1);
        Self {
            account_id: account_id.to_string(),
            packages: Mutex::new(vec![
                package("456", "In Transit"),
                package("789", "Delivered"),
            ]),
            archived_packages: Mutex::new(vec![package("410", "Expired")]),
            summary: Mutex::new(summary),
            archived_summary: Mutex::new(summary_of(&[("Expired", 1)])),
            failing: AtomicBool::new(false),
            add_outcome: Mutex::new(AddOutcome::Added),
            submissions: Mutex::new(Vec::new()),
            package_fetches: AtomicUsize::new(0),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.package_fetches.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), SeventeenTrackError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SeventeenTrackError::Request("GetTrackInfoList returned code -1".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SeventeenTrackApi for MockAccount {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn packages(&self, show_archived: bool, _tz: Tz) -> Result<Vec<Package>, SeventeenTrackError> {
        self.check()?;
        self.package_fetches.fetch_add(1, Ordering::SeqCst);
        let packages = if show_archived {
            &self.archived_packages
        } else {
            &self.packages
        };
        Ok(packages.lock().unwrap().clone())
    }

    async fn summary(&self, show_archived: bool) -> Result<Summary, SeventeenTrackError> {
        self.check()?;
        let summary = if show_archived {
            &self.archived_summary
        } else {
            &self.summary
        };
        Ok(summary.lock().unwrap().clone())
    }

    async fn add_package_with_carrier(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<(), SeventeenTrackError> {
        self.submissions.lock().unwrap().push((
            tracking_number.to_string(),
            carrier.map(str::to_string),
            friendly_name.map(str::to_string),
        ));
        match *self.add_outcome.lock().unwrap() {
            AddOutcome::Added => Ok(()),
            AddOutcome::Conflict => Err(SeventeenTrackError::Request(
                "AddTrackNo returned code -5".to_string(),
            )),
            AddOutcome::UnknownNumber => Err(SeventeenTrackError::InvalidTrackingNumber(
                tracking_number.to_string(),
            )),
        }
    }
}

/// Logs tokens in to their registered accounts
#[derive(Default)]
pub struct MockFactory {
    accounts: Mutex<HashMap<String, Arc<MockAccount>>>,
    pub unreachable: AtomicBool,
    pub logins: AtomicUsize,
}

impl MockFactory {
    pub fn add_account(&self, token: &str, account_id: &str) -> Arc<MockAccount> {
        let account = Arc::new(MockAccount::new(account_id));
        self.accounts
            .lock()
            .unwrap()
            .insert(token.to_string(), Arc::clone(&account));
        account
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn login(&self, token: &str) -> Result<Arc<dyn SeventeenTrackApi>, ClientError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ClientError::Api(SeventeenTrackError::Request(
                "GetUserInfo returned code -1".to_string(),
            )));
        }
        let account = self
            .accounts
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(ClientError::Authentication)?;
        Ok(account as Arc<dyn SeventeenTrackApi>)
    }
}

pub fn package(tracking_number: &str, status: &str) -> Package {
    Package {
        id: format!("id-{tracking_number}"),
        tracking_number: tracking_number.to_string(),
        friendly_name: Some(format!("friendly name {tracking_number}")),
        status: status.to_string(),
        info_text: Some("info text".to_string()),
        location: "location".to_string(),
        timestamp: Some(
            chrono::FixedOffset::east_opt(7200)
                .unwrap()
                .with_ymd_and_hms(2020, 8, 10, 12, 32, 0)
                .unwrap(),
        ),
        origin_country: "China".to_string(),
        destination_country: "Brazil".to_string(),
        package_type: "Registered Parcel".to_string(),
        tracking_info_language: "Unknown".to_string(),
        carrier: 0,
    }
}

/// Summary with every status, counts taken from `counts` or zero
pub fn summary_of(counts: &[(&str, u32)]) -> Summary {
    PACKAGE_STATUSES
        .iter()
        .map(|(_, label)| {
            let count = counts
                .iter()
                .find(|(status, _)| status == label)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            (label.to_string(), count)
        })
        .collect()
}

pub struct TestEnv {
    pub hass: HomeAssistant,
    pub factory: Arc<MockFactory>,
    pub integration: Arc<SeventeenTrack>,
}

impl TestEnv {
    pub fn new() -> Self {
        let hass = HomeAssistant::new(CoreConfig {
            time_zone: "Europe/Berlin".to_string(),
            ..CoreConfig::default()
        })
        .unwrap();
        let factory = Arc::new(MockFactory::default());
        let integration = SeventeenTrack::register(&hass, Arc::clone(&factory) as Arc<dyn ClientFactory>);
        Self {
            hass,
            factory,
            integration,
        }
    }

    /// Add (without setting up) an entry for `token`
    pub fn add_entry(&self, name: &str, token: &str, options: HashMap<String, Value>) -> ConfigEntry {
        let data = HashMap::from([
            (CONF_NAME.to_string(), Value::from(name)),
            (CONF_TOKEN.to_string(), Value::from(token)),
        ]);
        let entry = ConfigEntry::new(DOMAIN, name)
            .with_data(data)
            .with_options(options);
        self.hass.config_entries.add(entry).unwrap()
    }
}
