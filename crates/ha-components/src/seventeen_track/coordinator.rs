//! Polling of one 17Track account

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use ha_config_entries::ConfigEntry;
use ha_core::consts::CONF_SCAN_INTERVAL;
use ha_core::UpdateFailed;
use ha_helpers::{DataUpdate, DataUpdateCoordinator};
use seventeentrack::{Package, SeventeenTrackError, Summary};
use tracing::debug;

use super::api::SeventeenTrackApi;
use super::consts::{CONF_SHOW_ARCHIVED, DEFAULT_SCAN_INTERVAL, DEFAULT_SHOW_ARCHIVED, DOMAIN};

pub type SeventeenTrackCoordinator = DataUpdateCoordinator<SeventeenTrackUpdater>;

/// Result of one refresh
#[derive(Debug, Clone, PartialEq)]
pub struct SeventeenTrackData {
    pub packages: Vec<Package>,
    pub summary: Summary,
}

/// Options of an entry, with defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOptions {
    /// Minutes between refreshes
    pub scan_interval: u64,
    pub show_archived: bool,
}

impl EntryOptions {
    pub fn from_entry(entry: &ConfigEntry) -> Self {
        Self {
            scan_interval: entry.option_or(CONF_SCAN_INTERVAL, DEFAULT_SCAN_INTERVAL).max(1),
            show_archived: entry.option_or(CONF_SHOW_ARCHIVED, DEFAULT_SHOW_ARCHIVED),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval * 60)
    }
}

/// Fetches packages and summary, merging in archived ones when enabled
pub struct SeventeenTrackUpdater {
    client: Arc<dyn SeventeenTrackApi>,
    show_archived: AtomicBool,
    time_zone: Tz,
}

impl SeventeenTrackUpdater {
    pub fn new(client: Arc<dyn SeventeenTrackApi>, show_archived: bool, time_zone: Tz) -> Self {
        Self {
            client,
            show_archived: AtomicBool::new(show_archived),
            time_zone,
        }
    }

    pub fn client(&self) -> &Arc<dyn SeventeenTrackApi> {
        &self.client
    }

    pub fn account_id(&self) -> &str {
        self.client.account_id()
    }

    pub fn show_archived(&self) -> bool {
        self.show_archived.load(Ordering::SeqCst)
    }

    /// Takes effect on the next refresh
    pub fn set_show_archived(&self, show_archived: bool) {
        self.show_archived.store(show_archived, Ordering::SeqCst);
    }

    async fn fetch(&self) -> Result<SeventeenTrackData, SeventeenTrackError> {
        let mut packages = self.client.packages(false, self.time_zone).await?;
        let mut summary = self.client.summary(false).await?;

        if self.show_archived() {
            packages.extend(self.client.packages(true, self.time_zone).await?);
            for (status, count) in self.client.summary(true).await? {
                *summary.entry(status).or_insert(0) += count;
            }
        }

        Ok(SeventeenTrackData { packages, summary })
    }
}

#[async_trait]
impl DataUpdate for SeventeenTrackUpdater {
    type Data = SeventeenTrackData;

    async fn update(&self) -> Result<SeventeenTrackData, UpdateFailed> {
        let data = self
            .fetch()
            .await
            .map_err(|err| UpdateFailed::new(format!("Error communicating with API: {err}")))?;

        debug!("New package data received: {:?}", data.packages);
        debug!("New summary data received: {:?}", data.summary);
        Ok(data)
    }
}

/// Build the coordinator for an entry
pub fn new_coordinator(
    entry: &ConfigEntry,
    client: Arc<dyn SeventeenTrackApi>,
    time_zone: Tz,
) -> Arc<SeventeenTrackCoordinator> {
    let options = EntryOptions::from_entry(entry);
    Arc::new(DataUpdateCoordinator::new(
        DOMAIN,
        SeventeenTrackUpdater::new(client, options.show_archived, time_zone),
        options.update_interval(),
    ))
}
