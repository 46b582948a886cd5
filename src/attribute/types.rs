use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum AttributeValue {
    Float(f64),
    Text(String),
}

#[cfg(test)]
impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

/// Who may see or change an attribute.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Deserialize,
    Serialize,
    utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessLevel {
    Operator,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteType {
    Read,
    Write,
}

/// Static description of an attribute, fixed at declaration time.
#[derive(Debug, Clone)]
pub struct AttributeMeta {
    pub label: String,
    pub unit: String,
    pub description: String,
    pub group: String,
    pub display_level: AccessLevel,
    pub writable: WriteType,
    pub write_level: AccessLevel,
    pub polling_period: Option<Duration>,
    pub need_load: bool,
}

impl AttributeMeta {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            unit: String::new(),
            description: String::new(),
            group: String::new(),
            display_level: AccessLevel::Operator,
            writable: WriteType::Read,
            write_level: AccessLevel::Admin,
            polling_period: None,
            need_load: false,
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn writable(mut self, level: AccessLevel) -> Self {
        self.writable = WriteType::Write;
        self.write_level = level;
        self
    }

    pub fn polling_period(mut self, period: Duration) -> Self {
        self.polling_period = Some(period);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    key: String,
    meta: AttributeMeta,
    value: AttributeValue,
    update_at: DateTime<Utc>,
    history: VecDeque<(AttributeValue, DateTime<Utc>)>,
    capacity: usize,
}

impl Attribute {
    pub(super) fn new(
        key: &str,
        meta: AttributeMeta,
        initial: AttributeValue,
        capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let capacity = capacity.max(1);
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back((initial.clone(), now));
        Self {
            key: key.to_string(),
            meta,
            value: initial,
            update_at: now,
            history,
            capacity,
        }
    }

    pub(super) fn record(&mut self, value: AttributeValue, at: DateTime<Utc>) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((value.clone(), at));
        self.value = value;
        self.update_at = at;
    }

    pub fn snapshot(&self, with_history: bool) -> AttributeSnapshot {
        AttributeSnapshot {
            key: self.key.clone(),
            label: self.meta.label.clone(),
            value: self.value.clone(),
            unit: self.meta.unit.clone(),
            description: self.meta.description.clone(),
            group: self.meta.group.clone(),
            display_level: self.meta.display_level,
            writable: self.meta.writable,
            write_level: self.meta.write_level,
            polling_period_ms: self.meta.polling_period.map(|p| p.as_millis() as u64),
            need_load: self.meta.need_load,
            update_at: self.update_at,
            history: with_history.then(|| {
                self.history
                    .iter()
                    .map(|(value, timestamp)| HistoryEntry {
                        value: value.clone(),
                        timestamp: *timestamp,
                    })
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HistoryEntry {
    pub value: AttributeValue,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttributeSnapshot {
    pub key: String,
    pub label: String,
    pub value: AttributeValue,
    pub unit: String,
    pub description: String,
    pub group: String,
    pub display_level: AccessLevel,
    pub writable: WriteType,
    pub write_level: AccessLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_period_ms: Option<u64>,
    pub need_load: bool,
    pub update_at: DateTime<Utc>,
    /// Oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub key: String,
    pub value: AttributeValue,
    pub timestamp: DateTime<Utc>,
}
