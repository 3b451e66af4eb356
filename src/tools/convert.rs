use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use super::handler::Args;
use crate::types::FunctionParameter;

/// Convert the remote side's `{name, value, type}` triples into native arguments.
///
/// - `number`: parsed as a float and narrowed to an integer when it has no
///   fractional part. Unparseable or non-finite values drop the entry.
/// - `boolean`: `true/yes/1` and `false/no/0` (case-insensitive). Anything
///   else is passed through as the original string.
/// - `string` and unknown types: passed through unchanged.
///
/// Duplicate names: last write wins.
pub fn convert_parameters(params: &[FunctionParameter]) -> Args {
    let mut out = Map::new();

    for p in params {
        let value = match p.param_type.as_str() {
            "number" => match parse_number(&p.value) {
                Some(n) => Value::Number(n),
                None => {
                    warn!(param = %p.name, value = %p.value, "could not convert to number, dropping");
                    continue;
                }
            },
            "boolean" => match parse_bool(&p.value) {
                Some(b) => Value::Bool(b),
                None => {
                    warn!(param = %p.name, value = %p.value, "not a recognised boolean, passing as string");
                    Value::String(p.value.clone())
                }
            },
            _ => Value::String(p.value.clone()),
        };
        out.insert(p.name.clone(), value);
    }

    debug!(args = ?out, "parameters converted");
    Args::new(out)
}

fn parse_number(raw: &str) -> Option<Number> {
    let f: f64 = raw.trim().parse().ok()?;
    if !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
