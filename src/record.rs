//! Data model shared by the batch and stream orchestrators.
//!
//! A `Record` is one row of the replayed telemetry sequence: a `time` value
//! plus a map of channel name to sample value. NaNs are assumed already
//! dropped by the upstream record-sequence provider (spec.md §6.5); this
//! crate never sees them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The reserved channel key carrying the row's timestamp. Excluded from
/// detection (spec.md §4.9) but passed through unchanged in output frames.
pub const TIME_CHANNEL: &str = "time";

/// One row of the input telemetry sequence.
///
/// `channels` never contains [`TIME_CHANNEL`]; `time` is carried separately
/// so detector fan-out can iterate `channels` directly without filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub time: f64,
    #[serde(flatten)]
    pub channels: BTreeMap<String, f64>,
}

impl Record {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: f64) -> Self {
        self.channels.insert(name.into(), value);
        self
    }
}

/// A single `(value, anomalous)` cell, wire-encoded as the two-element JSON
/// array `[value, decision]` specified in spec.md §6.3/§6.4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub value: f64,
    pub anomalous: bool,
}

impl Serialize for Decision {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.value)?;
        tup.serialize_element(&self.anomalous)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (value, anomalous) = <(f64, bool)>::deserialize(deserializer)?;
        Ok(Decision { value, anomalous })
    }
}

/// One output row: every input channel mapped to `[value, decision]`, plus
/// `time` passed through unchanged (spec.md §6.3/§6.4):
/// `{"data": {"<channel>": [value, decision], ..., "time": t}}` for the
/// stream frame, or as one element of `data: [...]` for the batch response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputRecord {
    pub time: f64,
    #[serde(flatten)]
    pub channels: BTreeMap<String, Decision>,
}

impl OutputRecord {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_decision(mut self, channel: impl Into<String>, decision: Decision) -> Self {
        self.channels.insert(channel.into(), decision);
        self
    }
}
