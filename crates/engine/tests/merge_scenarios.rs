//! End-to-end merge scenarios

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};
use weld_engine::{Engine, EngineError, ResolverProgress};

fn engine_with(pairs: &[(&str, Value)]) -> Engine {
    let mut engine = Engine::new();
    for (name, node) in pairs {
        engine.put_dataset(*name, node.clone());
    }
    engine
}

#[test]
fn trivial_substitution() {
    let mut engine = engine_with(&[("a", json!("Hi"))]);
    assert_eq!(engine.fill_in_placeholder("{{a}} world").unwrap(), "Hi world");
}

#[test]
fn ternary_substitution() {
    let mut engine = engine_with(&[("n", json!(3))]);
    assert_eq!(
        engine.fill_in_placeholder("{{n>0 ? 'pos' : 'neg'}}").unwrap(),
        "pos"
    );
}

#[test]
fn unresolvable_with_poisoning() {
    let mut engine = Engine::new();
    let error = engine.fill_in_placeholder("[{{x}}][{{x}}]").unwrap_err();
    let EngineError::NoValuePresent(failure) = error else {
        panic!("expected NoValuePresent, got {error:?}");
    };
    assert_eq!(
        failure.unresolvable_placeholders,
        ["x".to_string()].into_iter().collect()
    );
    assert_eq!(failure.partial_text, "[**x**][**x**]");
}

#[test]
fn inner_join_query() {
    let engine = engine_with(&[
        ("L", json!([{"id": 1, "a": 10}, {"id": 2, "a": 20}])),
        ("R", json!([{"id": 2, "b": "B"}])),
    ]);
    assert_eq!(
        engine.evaluate_query("L{id} >=< R{id}").unwrap(),
        Some(json!([{"id": 2, "a": 20, "b": "B"}]))
    );
}

#[test]
fn left_many_join_with_derived_array_name() {
    let engine = engine_with(&[
        ("L", json!([{"id": 1}, {"id": 2}])),
        (
            "things",
            json!([
                {"fk": 1, "v": "x"},
                {"fk": 1, "v": "y"},
                {"fk": 2, "v": "z"},
            ]),
        ),
    ]);
    assert_eq!(
        engine.evaluate_query("L{id} <=<< things{fk}").unwrap(),
        Some(json!([
            {"id": 1, "things": [{"fk": 1, "v": "x"}, {"fk": 1, "v": "y"}]},
            {"id": 2, "things": [{"fk": 2, "v": "z"}]},
        ]))
    );
}

#[test]
fn resolver_cycle_terminates() {
    let mut engine = Engine::new();
    let mut progress = ResolverProgress::new();
    let error = engine
        .fill_in_placeholder_with_resolver(
            "{{a}}",
            |name| match name {
                "a" => Some("{{b}}".to_string()),
                "b" => Some("{{a}}".to_string()),
                _ => None,
            },
            |_, _| None,
            &mut progress,
        )
        .unwrap_err();
    let EngineError::NoValuePresent(failure) = error else {
        panic!("expected NoValuePresent, got {error:?}");
    };
    assert!(failure.unresolvable_placeholders.contains("a"));
}

// Universal invariant 1: a successful merge is a fixpoint.
#[test]
fn merge_is_idempotent() {
    let registry = [
        ("who", json!("world")),
        ("n", json!(2)),
        ("xs", json!([1, 2, 3])),
    ];
    let template = "{{who}} has {{n * 2}} and {{xs}}";
    let mut engine = engine_with(&registry);
    let merged = engine.fill_in_placeholder(template).unwrap();

    let mut engine = engine_with(&registry);
    assert_eq!(engine.fill_in_placeholder(&merged).unwrap(), merged);
}

// Universal invariant 2: a template without placeholders is untouched.
#[rstest]
#[case("plain text")]
#[case("single brace { and } pair")]
#[case("")]
#[case("closing }} only")]
fn no_placeholder_shortcut(#[case] template: &str) {
    let mut engine = engine_with(&[("a", json!(1))]);
    assert_eq!(engine.fill_in_placeholder(template).unwrap(), template);
}

// Universal invariant 3: after failure, the partial text has a `**...**`
// rewrite for every unresolvable placeholder and no `{{` survives.
#[test]
fn failure_preserves_partial_text() {
    let mut engine = engine_with(&[("known", json!("ok"))]);
    let error = engine
        .fill_in_placeholder("{{known}} [{{gone}}] [{{also.gone}}]")
        .unwrap_err();
    let EngineError::NoValuePresent(failure) = error else {
        panic!("expected NoValuePresent, got {error:?}");
    };
    assert!(!failure.partial_text.contains("{{"));
    for placeholder in &failure.unresolvable_placeholders {
        assert!(
            failure.partial_text.contains(&format!("**{placeholder}**")),
            "missing rewrite for {placeholder} in {}",
            failure.partial_text
        );
    }
}

// Universal invariant 5: left-one and right-one agree under side swap.
#[test]
fn join_commutativity_under_swap() {
    let engine = engine_with(&[
        ("A", json!([{"k": 1, "x": "a1"}, {"k": 2, "x": "a2"}])),
        ("B", json!([{"k": 2, "y": "b2"}, {"k": 3, "y": "b3"}])),
    ]);
    assert_eq!(
        engine.evaluate_query("A{k} <=< B{k}").unwrap(),
        engine.evaluate_query("B{k} >=> A{k}").unwrap()
    );
    assert_eq!(
        engine.evaluate_query("A{k} <=<< B{k}").unwrap(),
        engine.evaluate_query("B{k} >>=> A{k}").unwrap()
    );
}

// Universal invariant 6: `=` and `!=` are complementary.
#[rstest]
#[case("1", "1")]
#[case("1", "2")]
#[case("'a'", "'a'")]
#[case("'a'", "1")]
#[case("null", "null")]
#[case("true", "false")]
#[case("'2.5'", "2.5")]
fn relational_complement(#[case] x: &str, #[case] y: &str) {
    let engine = Engine::new();
    let eq = engine.evaluate_query(&format!("{x} = {y}")).unwrap();
    let ne = engine.evaluate_query(&format!("{x} != {y}")).unwrap();
    assert!(
        eq.unwrap().as_bool().unwrap() ^ ne.unwrap().as_bool().unwrap(),
        "complement failed for {x} vs {y}"
    );
}

#[test]
fn resolver_round_trip_with_data_finder() {
    let mut engine = Engine::new();
    let mut progress = ResolverProgress::new().with_auto_mark_end(true);
    let merged = engine
        .fill_in_placeholder_with_resolver(
            "{{order.id}} for {{customer.name}}",
            |name| match name {
                "order" => Some("orders ? {\"status\": \"open\"}".to_string()),
                "customer" => Some("order.customer".to_string()),
                _ => None,
            },
            |collection, payload| {
                assert_eq!(collection, "orders?");
                assert_eq!(payload, "{\"status\": \"open\"}");
                Some(json!({"id": 7, "customer": {"name": "Ada"}}))
            },
            &mut progress,
        )
        .unwrap();
    assert_eq!(merged, "7 for Ada");
    assert!(progress.round() >= 2);
    assert_eq!(progress.steps().last().map(String::as_str), Some("End"));
}

#[test]
fn evaluate_query_with_resolver_returns_node() {
    let mut engine = Engine::new();
    engine.put_dataset("rate", json!(2));
    let mut progress = ResolverProgress::new();
    let node = engine
        .evaluate_query_with_resolver(
            "base * rate",
            |name| (name == "base").then(|| "21".to_string()),
            |_, _| None,
            &mut progress,
        )
        .unwrap();
    assert_eq!(node, Some(json!(42)));
}

#[test]
fn xml_placeholder_merge() {
    let mut engine = engine_with(&[("n", json!(3))]);
    let merged = engine
        .fill_in_xml_placeholder("<v>{{n &gt; 0 ? 'pos' : <b/>'neg'}}</v>")
        .unwrap();
    assert_eq!(merged, "<v>pos<b/></v>");
}

#[test]
fn placeholder_brace_run_uses_last_opener() {
    let mut engine = engine_with(&[("foo", json!("bar"))]);
    assert_eq!(engine.fill_in_placeholder("{{{{foo}}").unwrap(), "{{bar");
}

#[test]
fn dataset_poisoning_is_sticky_within_engine() {
    let mut engine = Engine::new();
    let _ = engine.fill_in_placeholder("{{x}}");
    // x was poisoned by the failed merge; a later put replaces it
    assert!(engine.fill_in_placeholder("{{x}}").is_err());
    engine.put_dataset("x", json!("now"));
    assert_eq!(engine.fill_in_placeholder("{{x}}").unwrap(), "now");
}

#[test]
fn join_inside_dictionary_feeds_template() {
    let mut engine = engine_with(&[
        ("orders", json!([{"id": 1, "cid": 9}])),
        ("customers", json!([{"cid": 9, "name": "Ada"}])),
    ]);
    let mut progress = ResolverProgress::new();
    let merged = engine
        .fill_in_placeholder_with_resolver(
            "{{enriched[0].name}}",
            |name| (name == "enriched").then(|| "orders{cid} >=< customers{cid}".to_string()),
            |_, _| None,
            &mut progress,
        )
        .unwrap();
    assert_eq!(merged, "Ada");
}
