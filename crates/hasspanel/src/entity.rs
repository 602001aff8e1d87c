//! Entity data model.
//!
//! `EntityState` mirrors the objects returned by the Home Assistant
//! `/api/states` endpoint. `EntityRecord` is the trimmed-down record the panel
//! displays.

use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;
use strum::EnumString;

/// Deserialize a state value that can be a string, boolean, or number.
///
/// Home Assistant always reports `state` as a string, but some custom
/// integrations and proxies emit bare scalars. `null` becomes an empty state.
fn deserialize_state<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StateScalar;

    impl<'de> de::Visitor<'de> for StateScalar {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string, boolean, number, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(String::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(String::new())
        }

        fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StateScalar)
}

/// Entity domains the panel knows how to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Switch,
    Light,
    Sensor,
}

impl Domain {
    /// Domain of an entity id such as `switch.lamp`, if it is one we handle.
    pub fn of(entity_id: &str) -> Option<Self> {
        let (domain, _) = entity_id.split_once('.')?;
        domain.parse().ok()
    }

    /// Whether entities of this domain accept the `toggle` service.
    pub fn is_toggleable(self) -> bool {
        matches!(self, Domain::Switch | Domain::Light)
    }
}

/// Attributes of an entity state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attributes {
    /// Human-readable name set by the user or the integration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Unit of measurement for numeric sensors (e.g. "°C")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    /// Every other attribute, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One element of the `/api/states` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntityState {
    pub entity_id: String,

    #[serde(default, deserialize_with = "deserialize_state")]
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityState {
    /// Label to show for this entity, falling back to the id.
    pub fn name(&self) -> &str {
        self.attributes
            .friendly_name
            .as_deref()
            .unwrap_or(&self.entity_id)
    }

    pub fn domain(&self) -> Option<Domain> {
        Domain::of(&self.entity_id)
    }
}

/// A UI-ready entity record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntityRecord {
    pub entity_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}
