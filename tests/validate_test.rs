//! Integration tests for payload validation.

use oas_schema::{
    load_document_str, load_instance_str, resolve, validate, validate_component, validate_value,
    Instance, ResolveOptions, Schema, SchemaError, ValidateError, ValidateOptions, ViolationKind,
};
use serde_json::{json, Value};

fn schema(value: Value) -> Schema {
    serde_json::from_value(value).unwrap()
}

fn errors(schema: &Schema, value: Value, options: &ValidateOptions) -> Vec<SchemaError> {
    match validate(schema, &Instance::from(value), options) {
        Ok(()) => Vec::new(),
        Err(ValidateError::Invalid { errors }) => errors,
        Err(other) => panic!("unexpected error: {}", other),
    }
}

fn messages(schema: &Schema, value: Value) -> Vec<String> {
    errors(schema, value, &ValidateOptions::new())
        .into_iter()
        .map(|e| e.message)
        .collect()
}

// === Bounded Integer Tests ===

mod bounded_integer {
    use super::*;

    fn percentile() -> Schema {
        schema(json!({
            "type": "integer",
            "minimum": 1,
            "maximum": 10,
            "exclusiveMaximum": true
        }))
    }

    #[test]
    fn inside_range_passes() {
        assert!(messages(&percentile(), json!(9)).is_empty());
        assert!(messages(&percentile(), json!(1)).is_empty());
    }

    #[test]
    fn inclusive_maximum_passes() {
        let inclusive = schema(json!({ "type": "integer", "minimum": 1, "maximum": 10 }));
        assert!(messages(&inclusive, json!(10)).is_empty());
        assert!(messages(&inclusive, json!(1)).is_empty());
        assert_eq!(
            messages(&inclusive, json!(11)),
            vec!["integer value exceeds maximum value of 10"]
        );
    }

    #[test]
    fn inclusive_number_bounds_pass() {
        let ratio = schema(json!({ "type": "number", "minimum": 0.0, "maximum": 1.0 }));
        assert!(messages(&ratio, json!(1.0)).is_empty());
        assert!(messages(&ratio, json!(1)).is_empty());
        assert!(messages(&ratio, json!(0)).is_empty());
        assert_eq!(
            messages(&ratio, json!(1.5)),
            vec!["number value exceeds maximum value of 1"]
        );
    }

    #[test]
    fn exclusive_maximum_fails() {
        assert_eq!(
            messages(&percentile(), json!(10)),
            vec!["integer value is equal to exclusive maximum value of 10"]
        );
    }

    #[test]
    fn below_minimum_fails() {
        assert_eq!(
            messages(&percentile(), json!(0)),
            vec!["integer value is less than minimum value of 1"]
        );
    }

    #[test]
    fn above_maximum_fails() {
        assert_eq!(
            messages(&percentile(), json!(11)),
            vec!["integer value exceeds maximum value of 10"]
        );
    }

    #[test]
    fn string_digits_fail() {
        assert_eq!(
            messages(&percentile(), json!("9")),
            vec!["expected integer, got string"]
        );
    }
}

// === Type Mismatch Tests ===

mod type_mismatch {
    use super::*;

    #[test]
    fn non_numeric_values_fail_number_schema() {
        let number = schema(json!({ "type": "number" }));
        for (value, kind) in [
            (json!("1.5"), "string"),
            (json!(true), "boolean"),
            (json!([1]), "array"),
            (json!({ "n": 1 }), "object"),
        ] {
            let found = errors(&number, value, &ValidateOptions::new());
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].kind, ViolationKind::TypeMismatch);
            assert_eq!(found[0].message, format!("expected number, got {}", kind));
        }
    }

    #[test]
    fn boolean_schema() {
        let flag = schema(json!({ "type": "boolean" }));
        assert!(messages(&flag, json!(false)).is_empty());
        assert_eq!(messages(&flag, json!(0)), vec!["expected boolean, got integer"]);
    }

    #[test]
    fn null_against_non_nullable() {
        let name = schema(json!({ "type": "string" }));
        let found = errors(&name, json!(null), &ValidateOptions::new());
        assert_eq!(found[0].kind, ViolationKind::NullValue);
    }
}

// === Object Tests ===

mod objects {
    use super::*;

    fn pet() -> Schema {
        schema(json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "id": { "type": "integer", "minimum": 1 },
                "name": { "type": "string", "minLength": 1 },
                "tag": { "type": "string" }
            }
        }))
    }

    #[test]
    fn valid_pet() {
        assert!(messages(&pet(), json!({ "id": 1, "name": "Rex" })).is_empty());
    }

    #[test]
    fn required_property_missing() {
        assert_eq!(
            messages(&pet(), json!({ "id": 1 })),
            vec!["required property 'name' is missing"]
        );
    }

    #[test]
    fn lenient_mode_allows_extra_keys() {
        assert!(messages(&pet(), json!({ "id": 1, "name": "Rex", "color": "brown" })).is_empty());
    }

    #[test]
    fn strict_mode_rejects_extra_keys() {
        let options = ValidateOptions::new().strict(true);
        let found = errors(
            &pet(),
            json!({ "id": 1, "name": "Rex", "color": "brown" }),
            &options,
        );

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ViolationKind::DisallowedProperty);
        assert_eq!(found[0].path, "/color");
        assert_eq!(found[0].message, "property 'color' is not allowed");
    }

    #[test]
    fn nested_error_path() {
        let found = errors(&pet(), json!({ "id": "1", "name": "Rex" }), &ValidateOptions::new());
        assert_eq!(found[0].path, "/id");
        assert_eq!(found[0].to_string(), "/id: expected integer, got string");
    }

    #[test]
    fn all_errors_mode_collects_everything() {
        let options = ValidateOptions::new().stop_on_failure(false).strict(true);
        let found = errors(
            &pet(),
            json!({ "id": 0, "name": "", "extra": 1 }),
            &options,
        );

        let kinds: Vec<ViolationKind> = found.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::BelowMinimum,
                ViolationKind::TooShort,
                ViolationKind::DisallowedProperty,
            ]
        );
    }
}

// === Document Tests ===

mod documents {
    use super::*;

    const DOCUMENT: &str = r##"
openapi: 3.0.3
paths: {}
components:
  schemas:
    Order:
      type: object
      required: [items]
      properties:
        items:
          type: array
          minItems: 1
          items:
            $ref: '#/components/schemas/Line'
    Line:
      type: object
      required: [sku, quantity]
      properties:
        sku:
          type: string
          pattern: '^[A-Z]{3}-[0-9]+$'
        quantity:
          type: integer
          minimum: 1
"##;

    #[test]
    fn validates_against_resolved_component() {
        let document = load_document_str(DOCUMENT).unwrap();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();
        let order = resolution.document.schema("Order").unwrap();

        let payload = load_instance_str(
            r#"{"items": [{"sku": "ABC-1", "quantity": 2}, {"sku": "bad", "quantity": 0}]}"#,
        )
        .unwrap();
        let options = ValidateOptions::new().stop_on_failure(false);
        let err = validate(order, &payload, &options).unwrap_err();

        let paths: Vec<&str> = err.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/items/1/sku", "/items/1/quantity"]);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn validate_component_from_yaml_payload() {
        let document = load_document_str(DOCUMENT).unwrap();
        let payload = load_instance_str("items:\n  - sku: XYZ-42\n    quantity: 3\n").unwrap();

        assert!(validate_component(&document, "Order", &payload, &ValidateOptions::new()).is_ok());
    }

    #[test]
    fn unknown_component() {
        let document = load_document_str(DOCUMENT).unwrap();
        let err = validate_component(&document, "Invoice", &Instance::Null, &ValidateOptions::new())
            .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "schema component 'Invoice' not found");
    }

    #[test]
    fn unresolved_schema_is_reported() {
        let schema = Schema::from_ref("#/components/schemas/Ghost");
        let found = errors(&schema, json!({}), &ValidateOptions::new());
        assert_eq!(found[0].kind, ViolationKind::UnresolvedReference);
    }

    #[test]
    fn absent_inputs() {
        let options = ValidateOptions::new();
        assert!(matches!(
            validate_value(None, Some(&json!(1)), &options),
            Err(ValidateError::MissingSchema)
        ));
        let number = schema(json!({ "type": "number" }));
        let err = validate_value(Some(&number), None, &options).unwrap_err();
        assert!(matches!(err, ValidateError::MissingInstance));
        assert_eq!(err.exit_code(), 2);
    }
}
