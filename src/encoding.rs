//! Canonical JSON encoding used before hashing.
//!
//! Two nodes must derive byte-identical input for the block digest, so the
//! encoding is fixed here instead of being left to serializer defaults:
//!
//! - object keys are emitted in lexicographic (byte) order at every depth
//! - item separator is `", "`, key separator is `": "`
//! - strings are ASCII-only: anything outside `0x20..=0x7E` is written as a
//!   lowercase `\uXXXX` escape (UTF-16 code units), with the short forms
//!   `\" \\ \n \r \t \b \f`
//! - integers are written as integers; floats use the shortest round-trip
//!   digits, in positional form when the decimal exponent is in `-4..16` and
//!   as `d.ddde±XX` otherwise (`1e-05`, `1e+16`), always with a fraction or
//!   exponent so they never read back as integers
//!
//! This matches the byte layout of a sorted-key `json.dumps` with default
//! separators, which lets the ledger interoperate with nodes written against
//! that format.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Encode any serializable value into its canonical JSON text.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(canonical_string(&value))
}

/// Encode an already-built JSON value into its canonical text.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_unstable();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(out, key);
        out.push_str(": ");
        write_value(out, &map[key]);
    }
    out.push('}');
}

fn write_number(out: &mut String, n: &Number) {
    match n.as_f64() {
        Some(value) if n.is_f64() => write_float(out, value),
        _ => out.push_str(&n.to_string()),
    }
}

fn write_float(out: &mut String, value: f64) {
    // `{:e}` yields the shortest digits that round-trip, e.g. "-1.2345e-7".
    let scientific = format!("{:e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        out.push_str(&scientific);
        return;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        out.push_str(&scientific);
        return;
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    out.push_str(sign);
    if !(-4..16).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exponent < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exponent.unsigned_abs()));
    } else if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let point = exponent as usize + 1;
        if digits.len() > point {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        } else {
            out.push_str(&digits);
            for _ in digits.len()..point {
                out.push('0');
            }
            out.push_str(".0");
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({
            "zeta": 1,
            "alpha": {"b": true, "a": null},
            "mid": [{"y": 2, "x": 1}]
        });
        assert_eq!(
            to_canonical_json(&value).unwrap(),
            r#"{"alpha": {"a": null, "b": true}, "mid": [{"x": 1, "y": 2}], "zeta": 1}"#
        );
    }

    #[test]
    fn test_numbers_keep_their_kind() {
        let value = json!({"int": 5, "neg": -3, "float": 1700000000.25, "whole": 2.0});
        assert_eq!(
            to_canonical_json(&value).unwrap(),
            r#"{"float": 1700000000.25, "int": 5, "neg": -3, "whole": 2.0}"#
        );
    }

    #[test]
    fn test_float_notation_switches_at_exponent_bounds() {
        let cases = [
            (0.00001, "1e-05"),
            (1e-7, "1e-07"),
            (0.0001, "0.0001"),
            (0.000123, "0.000123"),
            (1e16, "1e+16"),
            (1e22, "1e+22"),
            (123456789012345678.0, "1.2345678901234568e+17"),
            (1e15, "1000000000000000.0"),
            (123.456, "123.456"),
            (-2.5e-9, "-2.5e-09"),
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (1.5e300, "1.5e+300"),
        ];
        for (value, expected) in cases {
            assert_eq!(to_canonical_json(&value).unwrap(), expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_small_amount_in_object() {
        let value = json!({"amount": 0.00001, "b": 1e16, "c": 1e22, "d": 0.0001, "e": 123456789012345678.0});
        assert_eq!(
            to_canonical_json(&value).unwrap(),
            r#"{"amount": 1e-05, "b": 1e+16, "c": 1e+22, "d": 0.0001, "e": 1.2345678901234568e+17}"#
        );
    }

    #[test]
    fn test_strings_are_ascii_escaped() {
        let encoded = to_canonical_json("caf\u{e9} \"q\" \\ \n \u{7f} \u{1f600}").unwrap();
        assert_eq!(encoded, r#""caf\u00e9 \"q\" \\ \n \u007f \ud83d\ude00""#);
        assert!(encoded.is_ascii());
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(to_canonical_json(&json!({"a": [], "b": {}})).unwrap(), r#"{"a": [], "b": {}}"#);
    }
}
