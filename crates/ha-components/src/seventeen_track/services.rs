//! The `seventeen_track.add_package` service

use std::sync::Arc;

use dashmap::DashMap;
use ha_core::ServiceCall;
use ha_registries::DeviceRegistry;
use ha_service_registry::{ServiceDescription, ServiceError, ServiceRegistry, ServiceResult};
use serde::Deserialize;
use serde_json::{json, Value};
use seventeentrack::SeventeenTrackError;
use tracing::{debug, error};

use super::consts::{DOMAIN, SERVICE_ADD_PACKAGE};
use super::coordinator::SeventeenTrackCoordinator;

/// Loaded coordinators by config entry id
pub type Coordinators = Arc<DashMap<String, Arc<SeventeenTrackCoordinator>>>;

/// Payload of `add_package`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddPackageRequest {
    pub device_id: String,
    pub tracking_number: String,
    #[serde(default)]
    pub carrier_name: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

pub fn add_package_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "device_id": { "type": "string" },
            "tracking_number": { "type": "string" },
            "carrier_name": { "type": "string" },
            "friendly_name": { "type": "string" }
        },
        "required": ["device_id", "tracking_number"],
        "additionalProperties": false
    })
}

/// Register `add_package` unless a loaded entry already did
pub fn register(
    services: &ServiceRegistry,
    devices: Arc<DeviceRegistry>,
    coordinators: Coordinators,
) -> Result<(), ServiceError> {
    if services.has_service(DOMAIN, SERVICE_ADD_PACKAGE) {
        return Ok(());
    }

    let description = ServiceDescription::new(DOMAIN, SERVICE_ADD_PACKAGE)
        .with_name("Add package", "Start tracking a package on a 17Track account")
        .with_schema(add_package_schema());

    services.register(description, move |call| {
        let devices = Arc::clone(&devices);
        let coordinators = Arc::clone(&coordinators);
        async move { add_package(&devices, &coordinators, call).await }
    })
}

async fn add_package(
    devices: &DeviceRegistry,
    coordinators: &DashMap<String, Arc<SeventeenTrackCoordinator>>,
    call: ServiceCall,
) -> ServiceResult {
    let request: AddPackageRequest = call
        .parse_data()
        .map_err(|e| ServiceError::InvalidData(e.to_string()))?;

    let Some(device) = devices.get(&request.device_id) else {
        error!("17Track device not found");
        return Ok(None);
    };

    let coordinator = device
        .config_entries
        .iter()
        .find_map(|entry_id| coordinators.get(entry_id).map(|c| Arc::clone(c.value())));
    let Some(coordinator) = coordinator else {
        error!(
            "No loaded 17Track account for device {}",
            request.device_id
        );
        return Ok(None);
    };

    debug!(tracking_number = %request.tracking_number, "Adding package");
    let submitted = coordinator
        .updater()
        .client()
        .add_package_with_carrier(
            &request.tracking_number,
            request.carrier_name.as_deref(),
            request.friendly_name.as_deref(),
        )
        .await;

    match submitted {
        Ok(()) => {}
        Err(SeventeenTrackError::Request(err)) => {
            error!("Package exists or could not be added: {}", err);
            return Err(ServiceError::CallFailed(
                "Package already exists or could not be added".to_string(),
            ));
        }
        Err(SeventeenTrackError::InvalidTrackingNumber(err)) => {
            error!("Could not set friendly_name: {}", err);
            return Err(ServiceError::CallFailed(
                "Could not set friendly_name".to_string(),
            ));
        }
        Err(err) => {
            error!("Could not add package: {}", err);
            return Err(ServiceError::CallFailed(err.to_string()));
        }
    }

    coordinator.request_refresh().await;
    Ok(None)
}
