// Copyright 2025-Present tinybird-rs contributors
// SPDX-License-Identifier: Apache-2.0

//! Row model shared by every ingestion path.

use serde_json::Value;

/// An ordered row of column values. The appender treats records as opaque;
/// only the sinks look inside to encode them.
pub type Record = Vec<Value>;

/// A batch of records in enqueue order.
pub type Records = Vec<Record>;

/// Encodes records as CSV into `out`, one row per line.
///
/// Fields are quoted only when they contain the delimiter, a quote or a line
/// break; quotes are escaped by doubling. Null renders as an empty field,
/// scalars via their JSON display form, and nested arrays/objects as compact
/// JSON (which the quoting rules then wrap).
pub fn write_csv(out: &mut String, records: &[Record], delimiter: char) {
    for record in records {
        for (i, value) in record.iter().enumerate() {
            if i > 0 {
                out.push(delimiter);
            }
            push_field(out, value, delimiter);
        }
        out.push('\n');
    }
}

/// Encodes records as a CSV string. See [`write_csv`].
pub fn to_csv(records: &[Record], delimiter: char) -> String {
    let mut out = String::new();
    write_csv(&mut out, records, delimiter);
    out
}

fn push_field(out: &mut String, value: &Value, delimiter: char) {
    let rendered = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let needs_quoting = rendered.contains(delimiter)
        || rendered.contains('"')
        || rendered.contains('\n')
        || rendered.contains('\r');

    if needs_quoting {
        out.push('"');
        for ch in rendered.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    } else {
        out.push_str(&rendered);
    }
}
