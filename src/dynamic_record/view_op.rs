use super::record::DynamicRecord;
use super::repeated::RepeatedField;
use crate::schema::BaseType;
use crate::variant::Variant;
use std::collections::BTreeMap;
use std::fmt::Write as _;

// Diagnostic views. None of these are a stable format.

impl DynamicRecord {
    /// Scalar and string values of this record and its children, keyed by
    /// field names joined with `separator`. Repeated fields are skipped.
    pub fn flatten(&self, separator: &str) -> BTreeMap<String, Variant> {
        let mut out = BTreeMap::new();
        self.flatten_into(String::new(), separator, &mut out);
        out
    }

    fn flatten_into(&self, prefix: String, separator: &str, out: &mut BTreeMap<String, Variant>) {
        for field in self.schema().fields() {
            if let Some(value) = self.values.get(&field.offset) {
                out.insert(format!("{prefix}{}", field.name), value.clone());
            } else if let Some(child) = self.children.get(&field.offset) {
                child.flatten_into(format!("{prefix}{}{separator}", field.name), separator, out);
            }
        }
    }

    /// Brace-nested text, e.g. `name: 'Ana', address {city: 'Lyon'}, pets: ['Rex']`.
    pub fn to_debug_text(&self) -> String {
        let mut out = String::new();
        self.write_debug_text(&mut out);
        out
    }

    fn write_debug_text(&self, out: &mut String) {
        let mut first = true;
        for field in self.schema().fields() {
            let offset = field.offset;
            let sep = if first { "" } else { ", " };
            if let Some(value) = self.values.get(&offset) {
                let _ = write!(out, "{sep}{}: ", field.name);
                write_value(out, value);
            } else if let Some(child) = self.children.get(&offset) {
                let _ = write!(out, "{sep}{} {{", field.name);
                child.write_debug_text(out);
                out.push('}');
            } else if let Some(repeated) = self.repeated.get(&offset) {
                let _ = write!(out, "{sep}{}: ", field.name);
                write_repeated(out, repeated);
            } else {
                continue;
            }
            first = false;
        }
    }

    /// The tree as a JSON object keyed by field name.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for field in self.schema().fields() {
            let offset = field.offset;
            let value = match field.base_type {
                BaseType::Object => self.children.get(&offset).map(DynamicRecord::to_json_value),
                BaseType::Vector => self.repeated.get(&offset).map(|r| {
                    if r.element_type() == BaseType::Object {
                        r.records().iter().map(DynamicRecord::to_json_value).collect::<serde_json::Value>()
                    } else {
                        r.values().iter().cloned().map(serde_json::Value::from).collect::<serde_json::Value>()
                    }
                }),
                _ => self.values.get(&offset).cloned().map(serde_json::Value::from),
            };
            if let Some(value) = value {
                map.insert(field.name.to_string(), value);
            }
        }
        serde_json::Value::Object(map)
    }
}

fn write_value(out: &mut String, value: &Variant) {
    let _ = match value {
        Variant::String(s) => write!(out, "'{s}'"),
        other => write!(out, "{other}"),
    };
}

fn write_repeated(out: &mut String, repeated: &RepeatedField) {
    out.push('[');
    if repeated.element_type() == BaseType::Object {
        for (i, record) in repeated.records().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push('{');
            record.write_debug_text(out);
            out.push('}');
        }
    } else {
        for (i, value) in repeated.values().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_value(out, value);
        }
    }
    out.push(']');
}

impl std::fmt::Display for DynamicRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_debug_text())
    }
}
