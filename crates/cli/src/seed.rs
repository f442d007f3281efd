//! Event seeding from JSON-lines files

use std::path::Path;

use contracts::Event;

use crate::error::{CliError, Result};

/// Read one event per non-blank line
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let content = std::fs::read_to_string(path)?;
    parse_events(path, &content)
}

fn parse_events(path: &Path, content: &str) -> Result<Vec<Event>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let event: Event = serde_json::from_str(line)
                .map_err(|e| CliError::events_file(path, index + 1, e.to_string()))?;
            event
                .validate()
                .map_err(|e| CliError::events_file(path, index + 1, e.to_string()))?;
            Ok(event)
        })
        .collect()
}
