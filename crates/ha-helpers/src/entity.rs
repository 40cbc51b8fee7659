//! Coordinator-backed entities
//!
//! Entities render their state from the coordinator's latest data. The
//! [`EntityPlatform`] assigns entity ids, links entities to their device and
//! re-renders every entity whenever the coordinator publishes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ha_core::consts::{ATTR_ATTRIBUTION, ATTR_FRIENDLY_NAME, ATTR_ICON, ATTR_UNIT_OF_MEASUREMENT};
use ha_core::{Context, EntityId, STATE_UNAVAILABLE};
use ha_registries::{DeviceInfo, DeviceRegistry};
use ha_state_store::StateStore;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::update_coordinator::CoordinatorState;

/// An entity whose state derives from coordinator data `D`
pub trait CoordinatorEntity<D>: Send + Sync {
    /// Stable id, unique within the platform
    fn unique_id(&self) -> String;

    /// Display name; the entity id is derived from it
    fn name(&self) -> String;

    /// State value for the given data
    fn native_value(&self, data: &D) -> String;

    /// Extra attributes for the given data
    fn extra_state_attributes(&self, _data: &D) -> HashMap<String, Value> {
        HashMap::new()
    }

    fn icon(&self) -> Option<&str> {
        None
    }

    fn unit_of_measurement(&self) -> Option<&str> {
        None
    }

    fn attribution(&self) -> Option<&str> {
        None
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }
}

/// Publishes entities of one domain (e.g. `sensor`) to the state store
pub struct EntityPlatform {
    domain: String,
    states: Arc<StateStore>,
    devices: Arc<DeviceRegistry>,
}

impl EntityPlatform {
    pub fn new(
        domain: impl Into<String>,
        states: Arc<StateStore>,
        devices: Arc<DeviceRegistry>,
    ) -> Self {
        Self {
            domain: domain.into(),
            states,
            devices,
        }
    }

    /// Add entities for a config entry and keep them in sync with `updates`.
    ///
    /// States are written once right away, then again on every change the
    /// coordinator publishes. Entities whose name yields no valid entity id
    /// are skipped with a warning.
    pub fn add_entities<D>(
        &self,
        config_entry_id: &str,
        updates: watch::Receiver<CoordinatorState<D>>,
        entities: Vec<Arc<dyn CoordinatorEntity<D>>>,
    ) -> PlatformHandle
    where
        D: Send + Sync + 'static,
    {
        let mut taken = HashSet::new();
        let mut registered = Vec::with_capacity(entities.len());

        for entity in entities {
            let base = match EntityId::from_name(self.domain.as_str(), &entity.name()) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping entity '{}': {}", entity.name(), e);
                    continue;
                }
            };
            let entity_id = self.free_entity_id(base, &taken);
            taken.insert(entity_id.to_string());

            if let Some(info) = entity.device_info() {
                self.devices.get_or_create(config_entry_id, &info);
            }
            debug!(entity_id = %entity_id, unique_id = %entity.unique_id(), "Adding entity");
            registered.push((entity_id, entity));
        }

        let registered = Arc::new(registered);
        let mut updates = updates;
        let initial = updates.borrow_and_update().clone();
        write_states(&self.states, &registered, &initial);

        let states = Arc::clone(&self.states);
        let entities = Arc::clone(&registered);
        let task = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                write_states(&states, &entities, &state);
            }
        });

        PlatformHandle {
            entity_ids: registered.iter().map(|(id, _)| id.clone()).collect(),
            states: Arc::clone(&self.states),
            task,
        }
    }

    fn free_entity_id(&self, base: EntityId, taken: &HashSet<String>) -> EntityId {
        let in_use = |id: &EntityId| {
            let key = id.to_string();
            taken.contains(&key) || self.states.get(&key).is_some()
        };
        if !in_use(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = base.with_suffix(n);
            if !in_use(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn write_states<D>(
    states: &StateStore,
    entities: &[(EntityId, Arc<dyn CoordinatorEntity<D>>)],
    snapshot: &CoordinatorState<D>,
) {
    let context = Context::new();
    for (entity_id, entity) in entities {
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), Value::from(entity.name()));
        if let Some(icon) = entity.icon() {
            attributes.insert(ATTR_ICON.to_string(), Value::from(icon));
        }
        if let Some(unit) = entity.unit_of_measurement() {
            attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), Value::from(unit));
        }
        if let Some(attribution) = entity.attribution() {
            attributes.insert(ATTR_ATTRIBUTION.to_string(), Value::from(attribution));
        }

        let value = match (&snapshot.data, snapshot.last_update_success) {
            (Some(data), true) => {
                attributes.extend(entity.extra_state_attributes(data));
                entity.native_value(data)
            }
            _ => STATE_UNAVAILABLE.to_string(),
        };
        states.set(entity_id.clone(), value, attributes, context.clone());
    }
}

/// Entities added by one [`EntityPlatform::add_entities`] call
pub struct PlatformHandle {
    entity_ids: Vec<EntityId>,
    states: Arc<StateStore>,
    task: JoinHandle<()>,
}

impl PlatformHandle {
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    /// Stop following the coordinator and remove all states
    pub fn remove(self) {
        self.task.abort();
        for entity_id in &self.entity_ids {
            self.states.remove(entity_id);
        }
    }
}
