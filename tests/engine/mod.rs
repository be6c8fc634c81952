// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use multiplicity::*;

fn parse(engine: &Engine, text: &str) -> Result<Expression> {
    engine.parse_expression("main.tf".to_string(), text.to_string())
}

fn regions() -> Result<StaticScope> {
    StaticScope::new().with(
        "var.regions",
        Value::list(vec![Value::from("eu"), Value::from("us"), Value::from("eu")]),
    )
}

#[test]
fn instance_keys_and_values() -> Result<()> {
    let engine = Engine::new();
    let expr = parse(&engine, "toset(var.regions)")?;
    let (expansion, diags) = engine.expand(Some(&expr), None, &regions()?);
    diags.err()?;

    let keys: Vec<String> = expansion.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["[\"eu\"]", "[\"us\"]"]);

    let eu = InstanceKey::String("eu".to_string());
    assert_eq!(expansion.each_value(&eu), Some(&Value::from("eu")));
    assert_eq!(expansion.each_value(&InstanceKey::Int(0)), None);
    Ok(())
}

#[test]
fn count_instances() -> Result<()> {
    let engine = Engine::new();
    let expr = parse(&engine, "length(var.regions)")?;
    let (expansion, diags) = engine.expand(None, Some(&expr), &regions()?);
    assert!(diags.is_empty());
    assert_eq!(expansion, Expansion::Count(3));
    assert_eq!(expansion.keys().last(), Some(InstanceKey::Int(2)));
    assert_eq!(expansion.instance_count(), Some(3));
    Ok(())
}

#[test]
fn operation_decides_unknown_policy() -> Result<()> {
    let mut engine = Engine::new();
    let scope = StaticScope::new().with("var.later", Value::unknown(Type::map(Type::String)))?;
    let expr = parse(&engine, "var.later")?;

    // Validation defers unknown expansion.
    let (r, diags) = engine.expand_for_each(Some(&expr), &scope);
    assert!(!r.is_known());
    assert!(diags.is_empty());

    engine.set_operation(OperationType::Plan);
    let (r, diags) = engine.expand_for_each(Some(&expr), &scope);
    assert!(!r.is_known());
    assert_eq!(diags.kinds(), vec![DiagnosticKind::Unknown(UnknownShape::Map)]);
    assert!(diags.err().is_err());

    engine.set_allow_unknown(Some(true));
    let (expansion, diags) = engine.expand(Some(&expr), None, &scope);
    assert_eq!(expansion, Expansion::Unknown);
    assert_eq!(expansion.keys().count(), 0);
    assert!(diags.is_empty());
    Ok(())
}

#[test]
fn for_each_map_rejects_unknown() -> Result<()> {
    let engine = Engine::new();
    assert!(engine.options().allows_unknown());

    let scope = StaticScope::new().with("var.later", Value::unknown(Type::set(Type::String)))?;
    let expr = parse(&engine, "var.later")?;
    let (m, diags) = engine.for_each_map(Some(&expr), &scope);
    assert!(m.is_empty());
    assert_eq!(diags.kinds(), vec![DiagnosticKind::Unknown(UnknownShape::Set)]);

    let (m, diags) = engine.for_each_map(None, &scope);
    assert!(m.is_empty());
    assert!(diags.is_empty());
    Ok(())
}

#[test]
fn cancelled_expansion() -> Result<()> {
    let mut engine = Engine::new();
    let token = CancellationToken::new();
    engine.set_cancellation_token(Some(token.clone()));

    let expr = parse(&engine, "toset(var.regions)")?;
    let (r, diags) = engine.expand_for_each(Some(&expr), &regions()?);
    assert!(r.is_known());
    assert!(diags.is_empty());

    token.cancel();
    let (r, diags) = engine.expand_for_each(Some(&expr), &regions()?);
    assert!(r.is_null());
    assert_eq!(diags.kinds(), vec![DiagnosticKind::Cancelled]);

    let count = parse(&engine, "3")?;
    let (r, diags) = engine.expand_count(Some(&count), &regions()?);
    assert_eq!(r, Some(Expansion::Count(0)));
    assert_eq!(diags.kinds(), vec![DiagnosticKind::Cancelled]);
    Ok(())
}

#[test]
fn diagnostics_point_at_the_argument() -> Result<()> {
    let engine = Engine::new();
    let expr = parse(&engine, "\n  var.missing")?;
    let (_, diags) = engine.expand_for_each(Some(&expr), &StaticScope::new());

    let d = diags.iter().next().expect("missing diagnostic");
    assert_eq!(d.severity, Severity::Error);
    assert_eq!(d.subject.as_ref().map(|s| s.line), Some(2));

    let message = diags.err().unwrap_err().to_string();
    assert!(message.contains("main.tf:2"), "{message}");
    Ok(())
}

#[test]
fn sensitive_values_do_not_leak() -> Result<()> {
    let engine = Engine::new();
    let scope = StaticScope::new().with("var.password", Value::from("hunter2").mark())?;
    let expr = parse(&engine, "toset([var.password])")?;
    let (r, diags) = engine.expand_for_each(Some(&expr), &scope);

    assert!(r.is_null());
    assert!(diags.iter().all(|d| d.extra.caused_by_sensitive));
    assert!(!diags.to_string().contains("hunter2"));
    assert_eq!(Value::from("hunter2").mark().to_string(), "\"(sensitive value)\"");
    Ok(())
}

#[test]
fn parse_errors() {
    let engine = Engine::new();
    assert!(parse(&engine, "{\"a\", ").is_err());
    assert!(parse(&engine, "var.").is_err());
    assert!(engine.parse_expression_from_file("does/not/exist.tf").is_err());
}

#[test]
fn options_round_trip() -> Result<()> {
    let options = EngineOptions {
        operation: OperationType::Apply,
        allow_unknown: None,
    };
    let json = serde_json::to_string(&options)?;
    assert_eq!(json, r#"{"operation":"apply","allowUnknown":null}"#);

    let engine = Engine::with_options(serde_json::from_str(&json)?);
    assert!(!engine.options().allows_unknown());
    Ok(())
}
