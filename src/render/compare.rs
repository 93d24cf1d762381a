use crate::{compile::Operator, log::Error, log::INCOMPATIBLE_TYPES};
use serde_json::{json, Value};

/// Return true if the given [`Value`] is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(boolean) => *boolean,
        Value::Number(number) => number.as_f64().unwrap_or_default() > 0.0f64,
        Value::String(string) => !string.is_empty(),
        Value::Array(array) => !array.is_empty(),
        Value::Object(object) => !object.is_empty(),
        Value::Null => false,
    }
}

/// Apply the given [`Operator`] to the two [`Value`] instances.
///
/// Equality is deep and works on every type, with numbers compared by
/// numeric value rather than representation. Ordering applies to numbers
/// and strings, and arithmetic to numbers, with `+` doubling as string
/// concatenation.
///
/// # Errors
///
/// Returns an [`Error`] if the `Operator` cannot be applied to the types,
/// or the operation divides by zero.
pub fn apply_operator(left: &Value, operator: Operator, right: &Value) -> Result<Value, Error> {
    match operator {
        Operator::Equal => return Ok(Value::Bool(values_equal(left, right))),
        Operator::NotEqual => return Ok(Value::Bool(!values_equal(left, right))),
        Operator::And | Operator::Or => {
            unreachable!("logical operators are short-circuited by the renderer")
        }
        _ => {}
    }

    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            let left_as = left.as_f64().unwrap_or_default();
            let right_as = right.as_f64().unwrap_or_default();

            match operator {
                Operator::Greater => Ok(Value::Bool(left_as > right_as)),
                Operator::Lesser => Ok(Value::Bool(left_as < right_as)),
                Operator::GreaterOrEqual => Ok(Value::Bool(left_as >= right_as)),
                Operator::LesserOrEqual => Ok(Value::Bool(left_as <= right_as)),
                Operator::Divide => {
                    if right_as == 0.0 {
                        return Err(Error::build("division by zero").with_help(format!(
                            "the right side of `{left} {operator} {right}` evaluates to zero"
                        )));
                    }
                    // Integer division stays integral when it divides evenly.
                    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
                        if l % r == 0 {
                            return Ok(json!(l / r));
                        }
                    }

                    Ok(json!(left_as / right_as))
                }
                Operator::Add | Operator::Subtract | Operator::Multiply => {
                    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
                        let result = match operator {
                            Operator::Add => l.checked_add(r),
                            Operator::Subtract => l.checked_sub(r),
                            _ => l.checked_mul(r),
                        };
                        if let Some(value) = result {
                            return Ok(json!(value));
                        }
                    }
                    let result = match operator {
                        Operator::Add => left_as + right_as,
                        Operator::Subtract => left_as - right_as,
                        _ => left_as * right_as,
                    };

                    Ok(json!(result))
                }
                Operator::Equal | Operator::NotEqual | Operator::And | Operator::Or => {
                    unreachable!()
                }
            }
        }
        (Value::String(left), Value::String(right)) => match operator {
            Operator::Add => Ok(Value::String(format!("{left}{right}"))),
            Operator::Greater => Ok(Value::Bool(left > right)),
            Operator::Lesser => Ok(Value::Bool(left < right)),
            Operator::GreaterOrEqual => Ok(Value::Bool(left >= right)),
            Operator::LesserOrEqual => Ok(Value::Bool(left <= right)),
            unsupported => Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                "operator `{unsupported}` is invalid on string types"
            ))),
        },
        (left, right) => Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
            "operator `{operator}` cannot be applied to `{left}` and `{right}`"
        ))),
    }
}

/// Return true if the two [`Value`] instances are equal.
///
/// Numbers are compared by numeric value, so `1` and `1.0` are equal.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_operator, is_truthy};
    use crate::compile::Operator;
    use serde_json::{json, Value};

    #[test]
    fn test_truthy() {
        let truthy = vec![
            json!("lorem"),
            json!(12),
            json!(114.4),
            json!(true),
            json!(vec!["lorem", "ipsum"]),
            json!({"lorem": "ipsum"}),
        ];
        let falsy = vec![
            json!(""),
            json!(0),
            json!(0.0),
            json!(-12),
            json!(false),
            json!(vec![""; 0]),
            json!({}),
            Value::Null,
        ];

        for value in truthy {
            assert!(is_truthy(&value), "{value} must be truthy");
        }
        for value in falsy {
            assert!(!is_truthy(&value), "{value} must be falsy");
        }
    }

    #[test]
    fn test_equality_across_representations() {
        assert_eq!(
            apply_operator(&json!(1), Operator::Equal, &json!(1.0)).unwrap(),
            json!(true)
        );
        assert_eq!(
            apply_operator(&json!("a"), Operator::NotEqual, &json!("b")).unwrap(),
            json!(true)
        );
        assert_eq!(
            apply_operator(&json!([1, 2]), Operator::Equal, &json!([1, 2])).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            apply_operator(&json!(2), Operator::Add, &json!(3)).unwrap(),
            json!(5)
        );
        assert_eq!(
            apply_operator(&json!(10), Operator::Divide, &json!(4)).unwrap(),
            json!(2.5)
        );
        assert_eq!(
            apply_operator(&json!(10), Operator::Divide, &json!(5)).unwrap(),
            json!(2)
        );
        assert_eq!(
            apply_operator(&json!("a"), Operator::Add, &json!("b")).unwrap(),
            json!("ab")
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(apply_operator(&json!(1), Operator::Divide, &json!(0)).is_err());
    }

    #[test]
    fn test_incompatible_types() {
        assert!(apply_operator(&json!("a"), Operator::Greater, &json!(true)).is_err());
        assert!(apply_operator(&json!(true), Operator::Add, &json!(false)).is_err());
    }
}
