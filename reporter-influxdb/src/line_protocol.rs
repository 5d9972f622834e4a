//! InfluxDB line protocol encoding.
//!
//! ```text
//! measurement,tag1=v1,tag2=v2 field1=1.5,field2=3i 1700000000
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// One line of the write payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Option<i64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    /// Adds a tag. Empty values are not representable and are ignored.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.insert(key.into(), value);
        }
        self
    }

    pub fn tags<'a>(mut self, tags: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in tags {
            self = self.tag(key.clone(), value.clone());
        }
        self
    }

    /// Adds a float field. NaN and infinities are dropped.
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        if value.is_finite() {
            self.fields.push((key.into(), FieldValue::Float(value)));
        }
        self
    }

    pub fn int_field(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.push((key.into(), FieldValue::Integer(value)));
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn get_field(&self, key: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Appends this point as one line, without the trailing newline.
    pub fn write_to(&self, out: &mut String) {
        escape_into(out, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            out.push(if i == 0 { ' ' } else { ',' });
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            let _ = match value {
                FieldValue::Float(v) => write!(out, "{}", v),
                FieldValue::Integer(v) => write!(out, "{}i", v),
            };
        }

        if let Some(ts) = self.timestamp {
            let _ = write!(out, " {}", ts);
        }
    }
}

fn escape_into(out: &mut String, value: &str, special: &[char]) {
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Encodes `points` as a newline separated payload. Points without fields
/// are skipped, since the write API rejects them.
pub fn encode(points: &[Point]) -> String {
    let mut out = String::new();
    for point in points.iter().filter(|p| p.has_fields()) {
        point.write_to(&mut out);
        out.push('\n');
    }
    out
}
