//! Text labels for panel rows and CLI listings.

use std::fmt::Write;

use crate::entity::EntityRecord;

/// Label for a togglable entity
pub fn toggle_label(record: &EntityRecord) -> String {
    record.name.clone()
}

/// Label for a sensor reading, e.g. `Temperature: 21.5 °C`
pub fn sensor_label(record: &EntityRecord, state: &str) -> String {
    match &record.unit {
        Some(unit) => format!("{}: {} {}", record.name, state, unit),
        None => format!("{}: {}", record.name, state),
    }
}

/// One line per record: the entity id padded to a common width, then `label`
pub fn render_list<F>(records: &[EntityRecord], label: F) -> String
where
    F: Fn(&EntityRecord) -> String,
{
    let width = records
        .iter()
        .map(|r| r.entity_id.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for record in records {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{:<width$}  {}", record.entity_id, label(record));
    }
    out
}
