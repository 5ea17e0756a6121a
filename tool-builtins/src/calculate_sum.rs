//! `calculate_sum`: adds two numbers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Number, Value};
use tool_registry::{
    FieldSpec, FieldType, InputSchema, Tool, ToolDescriptor, ToolError, ToolResult,
    ValidatedArguments,
};

/// Registered name of the tool.
pub const NAME: &str = "calculate_sum";

/// Pure addition tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculateSum;

impl CalculateSum {
    /// Descriptor advertised in tool listings.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the static metadata is invalid.
    pub fn descriptor() -> ToolResult<ToolDescriptor> {
        let schema = InputSchema::builder()
            .field(FieldSpec::required("a", FieldType::Number).with_description("First addend"))
            .field(FieldSpec::required("b", FieldType::Number).with_description("Second addend"))
            .build()?;
        Ok(ToolDescriptor::new(NAME, "Add two numbers together")?.with_input_schema(schema))
    }
}

#[derive(Deserialize)]
struct Operands {
    a: Number,
    b: Number,
}

#[async_trait]
impl Tool for CalculateSum {
    async fn invoke(&self, arguments: ValidatedArguments) -> ToolResult<Value> {
        let Operands { a, b } = arguments.parse()?;
        sum(&a, &b).map(Value::Number)
    }
}

/// Adds two JSON numbers.
///
/// Integer operands stay integers as long as the sum fits in `i64` or `u64`,
/// so `2 + 3` encodes as `5`, not `5.0`, and `u64::MAX + 0` is exact.
/// Everything else is added as `f64`.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] when the float sum is not finite, since
/// JSON cannot represent it.
pub fn sum(a: &Number, b: &Number) -> ToolResult<Number> {
    if let (Some(a), Some(b)) = (integer(a), integer(b)) {
        // Both sides lie within [i64::MIN, u64::MAX]; i128 holds the sum.
        let total = a + b;
        if let Ok(total) = i64::try_from(total) {
            return Ok(Number::from(total));
        }
        if let Ok(total) = u64::try_from(total) {
            return Ok(Number::from(total));
        }
    }

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return Err(ToolError::execution("operands are not representable as f64"));
    };
    Number::from_f64(a + b).ok_or_else(|| ToolError::execution(format!("{a} + {b} is not finite")))
}

fn integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, json};

    fn validated(value: Value) -> ValidatedArguments {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        CalculateSum::descriptor()
            .unwrap()
            .input_schema()
            .validate(map)
            .unwrap()
    }

    #[tokio::test]
    async fn adds_integers_as_integers() {
        let result = CalculateSum
            .invoke(validated(json!({ "a": 2, "b": 3 })))
            .await
            .unwrap();
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn adds_floats() {
        let result = CalculateSum
            .invoke(validated(json!({ "a": 0.5, "b": 2 })))
            .await
            .unwrap();
        assert_eq!(result, json!(2.5));
    }

    #[tokio::test]
    async fn unsigned_operands_stay_exact() {
        let result = CalculateSum
            .invoke(validated(json!({ "a": u64::MAX, "b": 0 })))
            .await
            .unwrap();
        assert_eq!(result, json!(u64::MAX));

        let result = CalculateSum
            .invoke(validated(json!({ "a": 9_223_372_036_854_775_808_u64, "b": -1 })))
            .await
            .unwrap();
        assert_eq!(result, json!(i64::MAX));
    }

    #[tokio::test]
    async fn undeclared_arguments_are_ignored() {
        let result = CalculateSum
            .invoke(validated(json!({ "a": 40, "b": 2, "note": "extra" })))
            .await
            .unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn crossing_into_u64_stays_integer() {
        let total = sum(&Number::from(i64::MAX), &Number::from(1)).unwrap();
        assert_eq!(total, Number::from(9_223_372_036_854_775_808_u64));
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let total = sum(&Number::from(u64::MAX), &Number::from(1)).unwrap();
        assert!(total.is_f64());

        let total = sum(&Number::from(i64::MIN), &Number::from(-1)).unwrap();
        assert!(total.is_f64());
    }

    #[test]
    fn infinite_sum_is_an_execution_error() {
        let max = Number::from_f64(f64::MAX).unwrap();
        let err = sum(&max, &max).expect_err("overflow to infinity");
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[test]
    fn schema_requires_both_operands() {
        let descriptor = CalculateSum::descriptor().unwrap();
        let mut map = Map::new();
        map.insert("a".into(), json!(2));
        let err = descriptor.input_schema().validate(map).expect_err("missing b");
        assert_eq!(err.violations()[0].field(), "b");
    }

    proptest! {
        #[test]
        fn integer_sum_is_exact(a in -1_000_000_000_i64..1_000_000_000, b in -1_000_000_000_i64..1_000_000_000) {
            let total = sum(&Number::from(a), &Number::from(b)).unwrap();
            prop_assert_eq!(total.as_i64(), Some(a + b));
        }

        #[test]
        fn sum_is_commutative(a in -1e12_f64..1e12, b in -1e12_f64..1e12) {
            let a = Number::from_f64(a).unwrap();
            let b = Number::from_f64(b).unwrap();
            prop_assert_eq!(sum(&a, &b).unwrap(), sum(&b, &a).unwrap());
        }

        #[test]
        fn zero_is_the_identity(a in any::<i64>(), u in any::<u64>(), f in -1e12_f64..1e12) {
            prop_assert_eq!(sum(&Number::from(a), &Number::from(0)).unwrap(), Number::from(a));
            prop_assert_eq!(sum(&Number::from(u), &Number::from(0)).unwrap(), Number::from(u));

            let f = Number::from_f64(f).unwrap();
            let zero = Number::from_f64(0.0).unwrap();
            prop_assert_eq!(sum(&f, &zero).unwrap(), f);
        }
    }
}
