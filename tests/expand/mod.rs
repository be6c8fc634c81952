// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::env;

use anyhow::{bail, Result};
use multiplicity::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

fn single_field<'a>(v: &'a Value, name: &str) -> Option<&'a Value> {
    match v.as_map() {
        Ok(fields) if fields.len() == 1 => v.get(name),
        _ => None,
    }
}

// Process test value specified in yaml to interpret special encodings.
pub fn process_value(v: &Value) -> Result<Value> {
    // set! : [item1, item2, ...]
    if let Some(items) = single_field(v, "set!") {
        let mut set = vec![];
        for item in items.as_list()? {
            set.push(process_value(item)?);
        }
        return Ok(Value::set(set));
    }

    // map! : {k: v, ...}
    if let Some(fields) = single_field(v, "map!") {
        let mut entries = vec![];
        for (k, item) in fields.as_map()? {
            entries.push((k.to_string(), process_value(item)?));
        }
        return Ok(Value::map_from(entries));
    }

    // unknown! : <type name>
    if let Some(ty) = single_field(v, "unknown!") {
        return Ok(Value::unknown(ty.as_string()?.parse()?));
    }

    // null! : <type name>
    if let Some(ty) = single_field(v, "null!") {
        return Ok(Value::null_of(ty.as_string()?.parse()?));
    }

    // sensitive! : <value>
    if let Some(inner) = single_field(v, "sensitive!") {
        return Ok(process_value(inner)?.mark());
    }

    if let Ok(items) = v.as_list() {
        let mut list = vec![];
        for item in items {
            list.push(process_value(item)?);
        }
        return Ok(Value::list(list));
    }

    if let Ok(fields) = v.as_map() {
        let mut entries = vec![];
        for (k, item) in fields {
            entries.push((k.to_string(), process_value(item)?));
        }
        return Ok(Value::object_from(entries));
    }

    Ok(v.clone())
}

fn for_each_to_value(r: ForEachValue) -> Value {
    match r {
        ForEachValue::Null => Value::null(),
        ForEachValue::Unknown(ty) => Value::unknown(ty),
        ForEachValue::Known(keys) => Value::object_from(keys),
    }
}

fn count_to_value(r: Option<Expansion>) -> Value {
    match r {
        None => Value::null(),
        Some(Expansion::Count(n)) => Value::from(n as usize),
        Some(Expansion::Unknown) => Value::unknown(Type::Dynamic),
        Some(e) => Value::from(format!("{e:?}")),
    }
}

fn key_names(e: &Expansion) -> Vec<String> {
    e.keys().map(|k| k.to_string()).collect()
}

#[derive(Serialize, Deserialize, Debug)]
struct TestCase {
    note: String,
    for_each: Option<String>,
    count: Option<String>,
    scope: Option<Value>,
    unknown_fallback: Option<bool>,
    operation: Option<OperationType>,
    allow_unknown: Option<bool>,
    want_result: Option<Value>,
    want_keys: Option<Vec<String>>,
    #[serde(default)]
    want_diagnostics: Vec<DiagnosticKind>,
    want_detail: Option<String>,
    skip: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn make_scope(case: &TestCase) -> Result<StaticScope> {
    let scope = match &case.scope {
        Some(v) => StaticScope::from_value(&process_value(v)?)?,
        None => StaticScope::new(),
    };
    Ok(match case.unknown_fallback {
        Some(true) => scope.with_unknown_fallback(),
        _ => scope,
    })
}

fn run_case(case: &TestCase) -> Result<()> {
    let mut engine = Engine::new();
    engine.set_options(EngineOptions {
        operation: case.operation.unwrap_or(OperationType::Plan),
        allow_unknown: case.allow_unknown,
    });
    let scope = make_scope(case)?;

    let parse = |text: &Option<String>| -> Result<Option<Expression>> {
        match text {
            Some(t) => Ok(Some(engine.parse_expression(format!("{}.tf", case.note), t.clone())?)),
            None => Ok(None),
        }
    };
    let for_each = parse(&case.for_each)?;
    let count = parse(&case.count)?;

    let (result, keys, diags) = match (&for_each, &count) {
        (Some(_), Some(_)) => {
            let (e, diags) = engine.expand(for_each.as_ref(), count.as_ref(), &scope);
            (Value::from(format!("{e:?}")), key_names(&e), diags)
        }
        (_, None) => {
            let (r, diags) = engine.expand_for_each(for_each.as_ref(), &scope);
            let (e, _) = engine.expand(for_each.as_ref(), None, &scope);
            (for_each_to_value(r), key_names(&e), diags)
        }
        (None, Some(_)) => {
            let (r, diags) = engine.expand_count(count.as_ref(), &scope);
            let (e, _) = engine.expand(None, count.as_ref(), &scope);
            (count_to_value(r), key_names(&e), diags)
        }
    };

    if let Some(want) = &case.want_result {
        let want = process_value(want)?;
        if result != want {
            bail!(
                "result mismatch\nleft  = {result:?}\nright = {want:?}\ndiagnostics:\n{diags}"
            );
        }
    }

    if let Some(want_keys) = &case.want_keys {
        if &keys != want_keys {
            bail!("keys mismatch\nleft  = {keys:?}\nright = {want_keys:?}");
        }
    }

    if diags.kinds() != case.want_diagnostics {
        bail!(
            "diagnostics mismatch\nleft  = {:?}\nright = {:?}\n{diags}",
            diags.kinds(),
            case.want_diagnostics
        );
    }

    if let Some(detail) = &case.want_detail {
        let text = diags.to_string();
        if !text.contains(detail.as_str()) {
            bail!("diagnostics\n`{text}`\ndo not contain `{detail}`");
        }
    }

    // Expansion is a pure function of its inputs.
    let (again, again_diags) = match (&for_each, &count) {
        (_, None) => {
            let (r, d) = engine.expand_for_each(for_each.as_ref(), &scope);
            (for_each_to_value(r), d)
        }
        (None, Some(_)) => {
            let (r, d) = engine.expand_count(count.as_ref(), &scope);
            (count_to_value(r), d)
        }
        (Some(_), Some(_)) => {
            let (e, d) = engine.expand(for_each.as_ref(), count.as_ref(), &scope);
            (Value::from(format!("{e:?}")), d)
        }
    };
    if again != result || again_diags != diags {
        bail!("repeated expansion produced a different outcome");
    }

    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    for case in &test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }

        if let Err(e) = run_case(case) {
            bail!("case {} failed: {e}", case.note);
        }
        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test]
fn yaml_test_basic() -> Result<()> {
    yaml_test("tests/expand/cases/basic.yaml")
}

#[test]
#[ignore = "intended for running a single yaml file"]
fn one_yaml() -> Result<()> {
    let file = match env::args().find(|a| a.ends_with(".yaml")) {
        Some(f) => f,
        None => bail!("missing <yaml-file>"),
    };
    yaml_test(file.as_str())
}

#[test_resources("tests/expand/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
