use jsv::{
    Config, Draft, JsvError, Path, PathChunk, ReferencingError, Schema, ValidationErrorKind,
    Validator,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::error::Error;
use url::Url;

fn path(chunks: Vec<PathChunk>) -> Path {
    Path::new(chunks)
}

#[test]
fn minimum_and_maximum_bounds() -> Result<(), JsvError> {
    for m in &[0_i64, 1, 5, 100, 4096] {
        assert!(jsv::is_valid(&json!({ "minimum": m }), &json!(m))?);
        assert!(!jsv::is_valid(&json!({ "minimum": m }), &json!(m - 1))?);
        assert!(jsv::is_valid(&json!({ "maximum": m }), &json!(m))?);
        assert!(!jsv::is_valid(&json!({ "maximum": m }), &json!(m + 1))?);
    }
    Ok(())
}

#[test]
fn first_violation() {
    let error = jsv::validate(&json!({"minimum": 5}), &json!(2)).unwrap_err();
    assert_eq!(error.to_string().lines().next(), Some("2 is less than the minimum of 5"));
    match error {
        JsvError::Validation(error) => {
            assert_eq!(error.message(), "2 is less than the minimum of 5");
            assert_eq!(error.keyword(), Some("minimum"));
            assert_eq!(
                error.kind(),
                &ValidationErrorKind::Minimum { limit: json!(5) }
            );
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn tuple_paths() -> Result<(), JsvError> {
    let schema = Schema::compile(&json!({"items": [{"type": "string"}]}))?;
    let error = schema.validate(&json!([1])).unwrap_err();
    assert_eq!(
        error.schema_path(),
        &path(vec!["items".into(), 0usize.into(), "type".into()])
    );
    assert_eq!(error.instance_path(), &path(vec![0usize.into()]));
    assert_eq!(error.message(), r#"1 is not of type "string""#);
    assert_eq!(
        serde_json::to_value(error.schema_path()).unwrap(),
        json!(["items", 0, "type"])
    );
    Ok(())
}

#[test]
fn errors_follow_declared_property_order() -> Result<(), JsvError> {
    let schema = json!({
        "properties": {
            "foo": {"type": "integer"},
            "bar": {"type": "string"}
        }
    });
    let instance = json!({"foo": null, "bar": null});
    let mut errors = jsv::iter_errors(&schema, &instance)?;

    let first = errors.next().unwrap();
    assert_eq!(first.message(), r#"null is not of type "string""#);
    assert_eq!(first.instance_path(), &path(vec!["bar".to_owned().into()]));
    let second = errors.next().unwrap();
    assert_eq!(second.message(), r#"null is not of type "integer""#);
    assert_eq!(second.instance_path(), &path(vec!["foo".to_owned().into()]));

    assert!(errors.next().is_none());
    assert!(errors.next().is_none());
    Ok(())
}

#[test]
fn compiling_twice_behaves_identically() -> Result<(), JsvError> {
    let document = json!({
        "type": "object",
        "properties": {"a": {"type": "array", "items": {"minimum": 3}}},
        "additionalProperties": {"type": "string"}
    });
    let instances = vec![
        json!({"a": [1, 5, 2], "b": 3}),
        json!({"a": [3]}),
        json!([]),
        json!({"b": "x", "c": null}),
    ];
    let first = Schema::compile(&document)?;
    let second = Schema::compile(&document)?;
    for instance in &instances {
        assert_eq!(first.is_valid(instance), second.is_valid(instance));
        assert_eq!(
            first.iter_errors(instance).collect::<Vec<_>>(),
            second.iter_errors(instance).collect::<Vec<_>>()
        );
    }
    Ok(())
}

#[test]
fn display_round_trip() -> Result<(), JsvError> {
    let schema = Schema::from_source(r#"{"minimum": 5}"#)?;
    assert_eq!(schema.to_string(), r#"<JSONSchema: {"minimum":5}>"#);
    assert_eq!(schema.source(), &json!({"minimum": 5}));
    assert!(matches!(
        Schema::from_source("{\"minimum\": "),
        Err(JsvError::InvalidJson { .. })
    ));
    Ok(())
}

#[test]
fn compile_failures() {
    assert_eq!(
        jsv::compile(&json!({}), Some(5)).unwrap_err(),
        JsvError::UnknownDraft(5)
    );
    let error = jsv::compile(&json!([]), None).unwrap_err();
    assert_eq!(error, JsvError::InvalidSchemaType("[]".to_owned()));
    assert_eq!(error.to_string(), r#"[] is not of types "boolean", "object""#);
    assert_eq!(jsv::compile(&json!({}), Some(19)).unwrap().draft(), Draft::Draft201909);
}

#[test]
fn draft_detection() -> Result<(), JsvError> {
    let schema = Schema::compile(&json!({"$schema": "http://json-schema.org/draft-04/schema#"}))?;
    assert_eq!(schema.draft(), Draft::Draft4);
    assert_eq!(Schema::compile(&json!(true))?.draft(), Draft::Draft202012);
    assert_eq!(
        Schema::compile(&json!({"$schema": "invalid-uri", "type": "string"})).unwrap_err(),
        JsvError::Referencing(ReferencingError::UnknownSpecification {
            uri: "invalid-uri".to_owned()
        })
    );
    Ok(())
}

#[test]
fn unresolvable_references() {
    let error = |schema: Value| Schema::compile(&schema).unwrap_err().to_string();
    assert_eq!(
        error(json!({"$ref": "#/$defs/missing"})),
        "Pointer '/$defs/missing' does not exist"
    );
    assert_eq!(error(json!({"$ref": "#missing"})), "Anchor 'missing' does not exist");
    assert!(error(json!({"$ref": "https://example.com/schema.json"}))
        .starts_with("Resource 'https://example.com/schema.json' is not present in a registry"));
}

#[test]
fn registered_and_retrieved_documents() -> Result<(), JsvError> {
    let mut config = Config::new();
    config
        .resource(
            "https://example.com/name.json",
            json!({"type": "string", "minLength": 1}),
        )
        .retriever(
            |uri: &Url| -> Result<Value, Box<dyn Error + Send + Sync>> {
                match uri.path() {
                    "/age.json" => Ok(json!({"type": "integer", "minimum": 0})),
                    _ => Err("not found".into()),
                }
            },
        );
    let validator = Validator::new_with_config(config);
    let schema = validator.compile(&json!({
        "properties": {
            "name": {"$ref": "https://example.com/name.json"},
            "age": {"$ref": "https://example.com/age.json"}
        }
    }))?;
    assert!(schema.is_valid(&json!({"name": "Ann", "age": 7})));
    assert!(!schema.is_valid(&json!({"name": ""})));
    assert!(!schema.is_valid(&json!({"age": -1})));

    let error = validator
        .compile(&json!({"$ref": "https://example.com/other.json"}))
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Resource 'https://example.com/other.json' is not present in a registry and retrieving it failed: not found"
    );
    Ok(())
}

#[test]
fn format_assertion_is_configurable() -> Result<(), JsvError> {
    let document = json!({"format": "date"});
    assert!(Schema::compile(&document)?.is_valid(&json!("not a date")));

    let mut config = Config::new();
    config.validate_formats(true);
    let strict = Validator::new_with_config(config).compile(&document)?;
    assert!(!strict.is_valid(&json!("not a date")));
    assert!(strict.is_valid(&json!("2024-02-29")));
    assert_eq!(
        strict.validate(&json!("2023-02-29")).unwrap_err().message(),
        r#""2023-02-29" is not a "date""#
    );
    Ok(())
}

#[test]
fn aggregated_errors_name_the_unexpected_members() -> Result<(), JsvError> {
    let schema = Schema::compile(&json!({
        "properties": {"a": true},
        "additionalProperties": false
    }))?;
    let error = schema.validate(&json!({"a": 1, "b": 2, "c": 3})).unwrap_err();
    assert_eq!(
        error.message(),
        "Additional properties are not allowed ('b', 'c' were unexpected)"
    );
    assert_eq!(error.schema_path().to_string(), "/additionalProperties");
    assert_eq!(error.instance_path().to_string(), "");
    Ok(())
}

#[test]
fn false_schemas_have_no_keyword() -> Result<(), JsvError> {
    let schema = Schema::compile(&json!({"properties": {"a": false}}))?;
    let error = schema.validate(&json!({"a": 1})).unwrap_err();
    assert_eq!(error.keyword(), None);
    assert_eq!(error.message(), "False schema does not allow 1");
    assert_eq!(
        error.to_string(),
        "False schema does not allow 1\n\n\
         Failed validating \"false\" in schema[\"properties\"][\"a\"]\n\n\
         On instance[\"a\"]:\n    1"
    );
    Ok(())
}

#[test]
fn runaway_references_fail_instead_of_looping() -> Result<(), JsvError> {
    let schema = Schema::compile(&json!({
        "$defs": {
            "a": {"$ref": "#/$defs/b"},
            "b": {"$ref": "#/$defs/a"}
        },
        "$ref": "#/$defs/a"
    }))?;
    assert!(!schema.is_valid(&json!(1)));
    let errors = schema.iter_errors(&json!(1)).collect::<Vec<_>>();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "Maximum reference depth exceeded (32)");
    Ok(())
}

#[test]
fn meta_validation_on_compile() {
    let mut config = Config::new();
    config.validate_schema(true);
    let validator = Validator::new_with_config(config);
    assert!(validator.compile(&json!({"type": "string"})).is_ok());
    match validator.compile(&json!({"required": "name"})) {
        Err(JsvError::InvalidSchema(error)) => {
            assert_eq!(error.instance_path().to_string(), "/required");
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

fn nested(keyword: &str, depth: usize, inner: Value) -> Value {
    (0..depth).fold(inner, |schema, _| json!({ keyword: schema }))
}

#[test]
fn deeply_nested_negations() -> Result<(), JsvError> {
    let schema = Schema::compile(&nested("not", 600, json!({"const": 1})))?;
    assert!(schema.is_valid(&json!(1)));
    assert!(!schema.is_valid(&json!(2)));
    assert_eq!(schema.iter_errors(&json!(2)).count(), 1);
    assert!(jsv::validate(&nested("not", 601, json!({"const": 1})), &json!(2)).is_ok());
    Ok(())
}

#[test]
fn unevaluated_members_past_many_applicators() -> Result<(), JsvError> {
    let mut document = (0..40).fold(json!({"properties": {"a": true}}), |schema, _| {
        json!({"allOf": [schema]})
    });
    document["unevaluatedProperties"] = json!(false);
    let schema = Schema::compile(&document)?;
    assert!(schema.is_valid(&json!({"a": 1})));
    let errors = schema.iter_errors(&json!({"a": 1, "b": 2})).collect::<Vec<_>>();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind(),
        &ValidationErrorKind::UnevaluatedProperties {
            unexpected: vec!["b".to_owned()]
        }
    );
    Ok(())
}

#[test]
fn ecma_patterns() -> Result<(), JsvError> {
    let password = json!({"pattern": "^(?=.*\\d)(?=.*[a-z]).{8,}$"});
    assert!(jsv::is_valid(&password, &json!("secret123"))?);
    assert!(!jsv::is_valid(&password, &json!("secretabc"))?);
    assert!(!jsv::is_valid(&json!({"pattern": "^\\d$"}), &json!("\u{0663}"))?);
    assert!(jsv::meta::is_valid(&json!({"pattern": "^(?=.*[A-Z]).+$"}))?);
    Ok(())
}
