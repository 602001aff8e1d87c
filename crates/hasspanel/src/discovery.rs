//! Entity discovery.
//!
//! Fetch the full state list and keep the entities the panel can show.
//! Upstream order is preserved. The plain `discover_*` functions degrade to
//! an empty list on any failure; the `try_` variants expose the error.

use tracing::debug;

use crate::client::HassApi;
use crate::client::SendError;
use crate::entity::EntityRecord;
use crate::entity::EntityState;

/// Sensor states that carry no reading
const UNUSABLE_STATES: [&str; 2] = ["unknown", "unavailable"];

fn is_toggleable(state: &EntityState) -> bool {
    state.entity_id.starts_with("switch.") || state.entity_id.starts_with("light.")
}

fn is_usable_sensor(state: &EntityState) -> bool {
    state.entity_id.starts_with("sensor.")
        && !state.state.is_empty()
        && !UNUSABLE_STATES.contains(&state.state.as_str())
        && state.attributes.unit_of_measurement.is_some()
}

/// Switches and lights, projected to `{entity_id, name}`
pub fn toggleable(states: &[EntityState]) -> Vec<EntityRecord> {
    states
        .iter()
        .filter(|s| is_toggleable(s))
        .map(|s| EntityRecord {
            entity_id: s.entity_id.clone(),
            name: s.name().to_string(),
            unit: None,
        })
        .collect()
}

/// Sensors with a current reading and a unit, projected to
/// `{entity_id, name, unit}`
pub fn sensors(states: &[EntityState]) -> Vec<EntityRecord> {
    states
        .iter()
        .filter(|s| is_usable_sensor(s))
        .map(|s| EntityRecord {
            entity_id: s.entity_id.clone(),
            name: s.name().to_string(),
            unit: s.attributes.unit_of_measurement.clone(),
        })
        .collect()
}

pub async fn try_discover_toggleable(
    api: &dyn HassApi,
    base_url: &str,
) -> Result<Vec<EntityRecord>, SendError> {
    let states = api.states(base_url).await?;
    let found = toggleable(&states);
    debug!(
        "Discovered {} togglable entities out of {}",
        found.len(),
        states.len()
    );
    Ok(found)
}

pub async fn try_discover_sensors(
    api: &dyn HassApi,
    base_url: &str,
) -> Result<Vec<EntityRecord>, SendError> {
    let states = api.states(base_url).await?;
    let found = sensors(&states);
    debug!("Discovered {} sensors out of {}", found.len(), states.len());
    Ok(found)
}

/// Discover switches and lights, or nothing if the server can't be reached
pub async fn discover_toggleable(api: &dyn HassApi, base_url: &str) -> Vec<EntityRecord> {
    try_discover_toggleable(api, base_url)
        .await
        .unwrap_or_default()
}

/// Discover usable sensors, or nothing if the server can't be reached
pub async fn discover_sensors(api: &dyn HassApi, base_url: &str) -> Vec<EntityRecord> {
    try_discover_sensors(api, base_url).await.unwrap_or_default()
}
