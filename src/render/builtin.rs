use crate::log::{Error, INCOMPATIBLE_TYPES, INVALID_FILTER};
use serde_json::{json, Value};

/// Return the length of the value.
///
/// Strings report the number of characters, arrays and objects the
/// number of members.
pub fn length(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::String(string) => Ok(json!(string.chars().count())),
        Value::Array(array) => Ok(json!(array.len())),
        Value::Object(object) => Ok(json!(object.len())),
        unsupported => Err(incompatible("length", unsupported)),
    }
}

/// Uppercase the string.
pub fn upper(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::String(string) => Ok(Value::String(string.to_uppercase())),
        unsupported => Err(incompatible("upper", unsupported)),
    }
}

/// Lowercase the string.
pub fn lower(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::String(string) => Ok(Value::String(string.to_lowercase())),
        unsupported => Err(incompatible("lower", unsupported)),
    }
}

/// Remove leading and trailing whitespace from the string.
pub fn trim(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::String(string) => Ok(Value::String(string.trim().to_owned())),
        unsupported => Err(incompatible("trim", unsupported)),
    }
}

/// Return the absolute value of the number.
pub fn abs(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(json!(integer.abs()))
            } else {
                Ok(json!(number.as_f64().unwrap_or_default().abs()))
            }
        }
        unsupported => Err(incompatible("abs", unsupported)),
    }
}

/// Return the first member of an array, or the first character of a string.
///
/// An empty receiver produces null.
pub fn first(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::Array(array) => Ok(array.first().cloned().unwrap_or(Value::Null)),
        Value::String(string) => Ok(string
            .chars()
            .next()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        unsupported => Err(incompatible("first", unsupported)),
    }
}

/// Return the last member of an array, or the last character of a string.
///
/// An empty receiver produces null.
pub fn last(value: &Value, _: &[Value]) -> Result<Value, Error> {
    match value {
        Value::Array(array) => Ok(array.last().cloned().unwrap_or(Value::Null)),
        Value::String(string) => Ok(string
            .chars()
            .next_back()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        unsupported => Err(incompatible("last", unsupported)),
    }
}

/// Join the members of an array into a string.
///
/// Accepts an optional separator, which defaults to an empty string.
/// String members are written verbatim, without quotes.
pub fn join(value: &Value, arguments: &[Value]) -> Result<Value, Error> {
    let Value::Array(array) = value else {
        return Err(incompatible("join", value));
    };
    let separator = match arguments.first() {
        None => String::new(),
        Some(Value::String(string)) => string.clone(),
        Some(other) => other.to_string(),
    };

    let mut output = String::new();
    for (index, member) in array.iter().enumerate() {
        if index > 0 {
            output.push_str(&separator);
        }
        match member {
            Value::String(string) => output.push_str(string),
            other => output.push_str(&other.to_string()),
        }
    }

    Ok(Value::String(output))
}

/// Return a sub-array or substring.
///
/// Takes an offset and an optional length. A negative offset counts back
/// from the end of the receiver, and is clamped to the beginning. Strings
/// are sliced by character.
pub fn slice(value: &Value, arguments: &[Value]) -> Result<Value, Error> {
    let Some(offset) = arguments.first().and_then(Value::as_i64) else {
        return Err(Error::build(INVALID_FILTER)
            .with_help("`slice` expects a numeric offset as the first argument"));
    };
    let length = match arguments.get(1) {
        None => None,
        Some(argument) => match argument.as_i64() {
            Some(length) if length >= 0 => Some(length as usize),
            _ => {
                return Err(Error::build(INVALID_FILTER)
                    .with_help("`slice` length must be a non-negative number"))
            }
        },
    };

    match value {
        Value::Array(array) => {
            let begin = resolve_offset(offset, array.len());
            let end = match length {
                Some(length) => (begin + length).min(array.len()),
                None => array.len(),
            };
            Ok(Value::Array(array[begin..end].to_vec()))
        }
        Value::String(string) => {
            let count = string.chars().count();
            let begin = resolve_offset(offset, count);
            let taken = match length {
                Some(length) => length,
                None => count - begin,
            };
            Ok(Value::String(
                string.chars().skip(begin).take(taken).collect(),
            ))
        }
        unsupported => Err(incompatible("slice", unsupported)),
    }
}

/// Group the members of an array into arrays of the given size.
///
/// The last group is padded with the optional fill value when the array
/// does not divide evenly.
pub fn batch(value: &Value, arguments: &[Value]) -> Result<Value, Error> {
    let Value::Array(array) = value else {
        return Err(incompatible("batch", value));
    };
    let size = match arguments.first().and_then(Value::as_u64) {
        Some(size) if size > 0 => size as usize,
        _ => {
            return Err(Error::build(INVALID_FILTER)
                .with_help("`batch` expects a positive group size as the first argument"))
        }
    };
    let fill = arguments.get(1);

    let mut groups = Vec::with_capacity(array.len().div_ceil(size));
    for chunk in array.chunks(size) {
        let mut group = chunk.to_vec();
        if let Some(fill) = fill {
            while group.len() < size {
                group.push(fill.clone());
            }
        }
        groups.push(Value::Array(group));
    }

    Ok(Value::Array(groups))
}

/// Convert a negative offset to an index from the end, clamped to zero,
/// and a positive offset to an index clamped to the length.
fn resolve_offset(offset: i64, length: usize) -> usize {
    if offset < 0 {
        length.saturating_sub(offset.unsigned_abs() as usize)
    } else {
        (offset as usize).min(length)
    }
}

fn incompatible(name: &str, value: &Value) -> Error {
    Error::build(INCOMPATIBLE_TYPES)
        .with_help(format!("filter `{name}` cannot be applied to `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length() {
        assert_eq!(length(&json!("héllo"), &[]).unwrap(), json!(5));
        assert_eq!(length(&json!([1, 2, 3]), &[]).unwrap(), json!(3));
        assert_eq!(length(&json!({"a": 1}), &[]).unwrap(), json!(1));
        assert!(length(&json!(10), &[]).is_err());
    }

    #[test]
    fn test_case() {
        assert_eq!(upper(&json!("abc"), &[]).unwrap(), json!("ABC"));
        assert_eq!(lower(&json!("ABC"), &[]).unwrap(), json!("abc"));
    }

    #[test]
    fn test_trim() {
        assert_eq!(trim(&json!("  a b  "), &[]).unwrap(), json!("a b"));
    }

    #[test]
    fn test_abs() {
        assert_eq!(abs(&json!(-4), &[]).unwrap(), json!(4));
        assert_eq!(abs(&json!(-1.5), &[]).unwrap(), json!(1.5));
    }

    #[test]
    fn test_first_last() {
        assert_eq!(first(&json!([1, 2, 3]), &[]).unwrap(), json!(1));
        assert_eq!(last(&json!([1, 2, 3]), &[]).unwrap(), json!(3));
        assert_eq!(first(&json!("héllo"), &[]).unwrap(), json!("h"));
        assert_eq!(last(&json!("héllo"), &[]).unwrap(), json!("o"));
        assert_eq!(first(&json!([]), &[]).unwrap(), json!(null));
        assert_eq!(last(&json!(""), &[]).unwrap(), json!(null));
    }

    #[test]
    fn test_join() {
        assert_eq!(
            join(&json!(["a", "b", "c"]), &[json!(", ")]).unwrap(),
            json!("a, b, c")
        );
        assert_eq!(join(&json!([1, 2]), &[]).unwrap(), json!("12"));
    }

    #[test]
    fn test_slice() {
        assert_eq!(
            slice(&json!([1, 2, 3, 4]), &[json!(1), json!(2)]).unwrap(),
            json!([2, 3])
        );
        assert_eq!(
            slice(&json!([1, 2, 3, 4]), &[json!(-2)]).unwrap(),
            json!([3, 4])
        );
        assert_eq!(
            slice(&json!("héllo"), &[json!(1), json!(3)]).unwrap(),
            json!("éll")
        );
        assert_eq!(
            slice(&json!("Hello World"), &[json!(-5)]).unwrap(),
            json!("World")
        );
        assert_eq!(slice(&json!([1, 2]), &[json!(-10)]).unwrap(), json!([1, 2]));
        assert!(slice(&json!([1]), &[json!(0), json!(-1)]).is_err());
    }

    #[test]
    fn test_batch() {
        assert_eq!(
            batch(&json!([1, 2, 3, 4, 5]), &[json!(2)]).unwrap(),
            json!([[1, 2], [3, 4], [5]])
        );
        assert_eq!(
            batch(&json!([1, 2, 3]), &[json!(2), json!(0)]).unwrap(),
            json!([[1, 2], [3, 0]])
        );
        assert!(batch(&json!([1]), &[json!(0)]).is_err());
    }
}
