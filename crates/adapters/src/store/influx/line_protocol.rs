//! Line protocol encoding.

use call_telemetry_domain::{FieldValue, TelemetryPoint};
use call_telemetry_shared::{ErrorCode, ErrorEnvelope, Result};
use std::fmt::Write as _;

/// Encode points as newline-separated line protocol.
///
/// Points without an explicit timestamp are written without one so the
/// store assigns ingest time.
pub fn encode_points(points: &[TelemetryPoint]) -> Result<String> {
    let mut out = String::new();
    for point in points {
        if !out.is_empty() {
            out.push('\n');
        }
        encode_point(point, &mut out)?;
    }
    Ok(out)
}

fn encode_point(point: &TelemetryPoint, out: &mut String) -> Result<()> {
    if point.fields.is_empty() {
        return Err(invalid_point(point, "point has no fields"));
    }

    escape_into(point, out, "measurement", &point.measurement, &[',', ' '])?;
    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        out.push(',');
        escape_into(point, out, "tag key", key, &[',', '=', ' '])?;
        out.push('=');
        escape_into(point, out, "tag value", value, &[',', '=', ' '])?;
    }

    for (index, (key, value)) in point.fields.iter().enumerate() {
        out.push(if index == 0 { ' ' } else { ',' });
        escape_into(point, out, "field key", key, &[',', '=', ' '])?;
        out.push('=');
        encode_field_value(point, value, out)?;
    }

    let timestamp = point.timestamp_nanos().map_err(ErrorEnvelope::from)?;
    if let Some(nanos) = timestamp {
        let _ = write!(out, " {nanos}");
    }
    Ok(())
}

fn encode_field_value(point: &TelemetryPoint, value: &FieldValue, out: &mut String) -> Result<()> {
    match value {
        FieldValue::Boolean(value) => out.push_str(if *value { "true" } else { "false" }),
        FieldValue::Integer(value) => {
            let _ = write!(out, "{value}i");
        },
        FieldValue::Float(value) => {
            if !value.is_finite() {
                return Err(invalid_point(point, "float field is not finite"));
            }
            let _ = write!(out, "{value}");
        },
        FieldValue::String(value) => {
            out.push('"');
            for ch in value.chars() {
                if matches!(ch, '"' | '\\') {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push('"');
        },
    }
    Ok(())
}

/// Line breaks have no escape outside quoted strings and are refused.
fn escape_into(
    point: &TelemetryPoint,
    out: &mut String,
    part: &'static str,
    text: &str,
    special: &[char],
) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(invalid_point(point, "line break in line protocol identifier")
            .with_metadata("part", part));
    }
    for ch in text.chars() {
        if ch == '\\' || special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    Ok(())
}

fn invalid_point(point: &TelemetryPoint, message: &str) -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::invalid_input(), message)
        .with_metadata("measurement", point.measurement.to_string())
}
