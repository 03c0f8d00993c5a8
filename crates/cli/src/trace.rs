use anyhow::{Context, Result};
use log::debug;
use plume_locator::{StepEvent, StepRecorder};
use std::fs;
use std::path::Path;

/// Collects trace events and writes them out as one JSON array
#[derive(Debug, Default)]
pub struct JsonTrace {
    events: Vec<StepEvent>,
}

impl JsonTrace {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.events).context("Failed to serialize trace")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl StepRecorder for JsonTrace {
    fn record(&mut self, event: StepEvent) {
        debug!("trace: {:?} {}", event.kind, event.description);
        self.events.push(event);
    }
}
