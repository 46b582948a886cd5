use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::error::AttributeError;
use super::types::{Attribute, AttributeMeta, AttributeSnapshot, AttributeValue, TelemetryEvent};

pub const DEFAULT_HISTORY_SIZE: usize = 100;
const SINK_CAPACITY: usize = 256;

/// Registry of named attributes, kept in declaration order.
pub struct AttributeStore {
    attributes: Vec<Attribute>,
    index: HashMap<String, usize>,
    history_size: usize,
    sink: broadcast::Sender<TelemetryEvent>,
}

impl AttributeStore {
    pub fn new(history_size: usize) -> Self {
        let (sink, _) = broadcast::channel(SINK_CAPACITY);
        Self {
            attributes: Vec::new(),
            index: HashMap::new(),
            history_size,
            sink,
        }
    }

    pub fn declare(
        &mut self,
        key: &str,
        meta: AttributeMeta,
        initial: impl Into<AttributeValue>,
    ) -> Result<(), AttributeError> {
        if self.index.contains_key(key) {
            return Err(AttributeError::DuplicateKey(key.to_string()));
        }
        let attribute = Attribute::new(key, meta, initial.into(), self.history_size, Utc::now());
        self.index.insert(key.to_string(), self.attributes.len());
        self.attributes.push(attribute);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Attribute, AttributeError> {
        self.index
            .get(key)
            .map(|&i| &self.attributes[i])
            .ok_or_else(|| AttributeError::UnknownKey(key.to_string()))
    }

    /// Stores a new value, appends it to the history and publishes a
    /// telemetry event.
    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), AttributeError> {
        let i = *self
            .index
            .get(key)
            .ok_or_else(|| AttributeError::UnknownKey(key.to_string()))?;
        let value = value.into();
        let now = Utc::now();
        self.attributes[i].record(value.clone(), now);
        // No receivers is fine.
        let _ = self.sink.send(TelemetryEvent {
            key: key.to_string(),
            value,
            timestamp: now,
        });
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sink.subscribe()
    }

    pub fn snapshot(&self) -> Vec<AttributeSnapshot> {
        self.attributes.iter().map(|a| a.snapshot(false)).collect()
    }
}
