use pdp_core::function::{FirstOrderFunction, FunctionSignature, Implementation};
use pdp_core::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
const STRING_BAG: &str = "urn:oasis:names:tc:xacml:1.0:function:string-bag";
const STRING_ONE_AND_ONLY: &str = "urn:oasis:names:tc:xacml:1.0:function:string-one-and-only";
const STRING_LOWER: &str = "urn:oasis:names:tc:xacml:1.0:function:string-normalize-to-lower-case";
const INTEGER_ADD: &str = "urn:oasis:names:tc:xacml:1.0:function:integer-add";
const INTEGER_LESS_THAN: &str = "urn:oasis:names:tc:xacml:1.0:function:integer-less-than";

fn factory() -> ExpressionFactory {
    ExpressionFactory::new(EngineConfig::default()).unwrap()
}

fn subject(id: &str) -> AttributeFqn {
    AttributeFqn::new(category::ACCESS_SUBJECT, id)
}

fn strings(f: &ExpressionFactory, values: &[&str]) -> ExpressionRef {
    let args = values.iter().map(|v| f.constant(*v)).collect();
    f.apply(STRING_BAG, args).unwrap()
}

fn eval(expression: &ExpressionRef, ctx: &RequestContext) -> EvalResult<Value> {
    expression.evaluate(Some(ctx))
}

#[test]
fn test_fixed_arity_rejected_at_construction() {
    let f = factory();
    for n in [0, 1, 3] {
        let args = (0..n).map(|_| f.constant("a")).collect();
        assert!(matches!(
            f.apply(STRING_EQUAL, args),
            Err(PolicyError::InvalidArity { .. })
        ));
    }
    assert!(matches!(
        f.apply(STRING_EQUAL, vec![f.constant("a"), f.constant(AttributeValue::Integer(1))]),
        Err(PolicyError::ArgumentType { index: 1, .. })
    ));
}

#[test]
fn test_varargs() {
    let f = factory();
    for n in [0usize, 1, 2, 5] {
        let values: Vec<String> = (0..n).map(|i| format!("v{i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let bag = strings(&f, &refs).evaluate(None).unwrap();
        assert_eq!(bag.as_bag().unwrap().size(), n);
    }

    // n-of: at least the count
    assert!(matches!(
        f.apply(ids::N_OF, vec![]),
        Err(PolicyError::InvalidArity { .. })
    ));
    let flags = [true, false, true, false];
    for n in [1usize, 2, 5] {
        let count = i64::from(n > 1);
        let mut args = vec![f.constant(AttributeValue::Integer(count))];
        args.extend(flags[..n - 1].iter().map(|b| f.constant(*b)));
        let n_of = f.apply(ids::N_OF, args).unwrap();
        assert_eq!(n_of.evaluate(None).unwrap(), Value::from(true));
    }

    assert!(f.apply(INTEGER_ADD, vec![f.constant(AttributeValue::Integer(1))]).is_err());
    let sum = f
        .apply(
            INTEGER_ADD,
            (1..=5).map(|i| f.constant(AttributeValue::Integer(i))).collect(),
        )
        .unwrap();
    assert_eq!(sum.evaluate(None).unwrap(), Value::from(AttributeValue::Integer(15)));
}

#[test]
fn test_must_be_present() {
    let f = factory();
    let ctx = RequestContext::new();

    let optional = f.designator(subject("role"), AttributeType::String, false);
    let bag = eval(&optional, &ctx).unwrap();
    assert!(bag.as_bag().unwrap().is_empty());

    let required = f.designator(subject("role"), AttributeType::String, true);
    let err = eval(&required, &ctx).unwrap_err();
    assert_eq!(err.status(), StatusCode::MissingAttribute);
}

#[test]
fn test_one_and_only() {
    let f = factory();
    let role = f.designator(subject("role"), AttributeType::String, false);
    let only = f.apply(STRING_ONE_AND_ONLY, vec![role]).unwrap();

    let one = RequestContext::new().with_attribute(subject("role"), "admin");
    assert_eq!(eval(&only, &one).unwrap(), Value::from(AttributeValue::from("admin")));

    let two = RequestContext::new().with_values(subject("role"), ["admin", "user"]);
    let none = RequestContext::new();
    for ctx in [two, none] {
        let err = eval(&only, &ctx).unwrap_err();
        assert_eq!(err.root_cause().status(), StatusCode::ProcessingError);
    }
}

#[test]
fn test_any_of_short_circuits() {
    let mut f = factory();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    f.registry_mut()
        .register(
            FirstOrderFunction::new(
                "urn:example:function:counting-string-equal",
                Datatype::BOOLEAN,
                FunctionSignature::fixed([Datatype::STRING, Datatype::STRING]),
                Implementation::single_primitive(move |values| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::from(values[0] == values[1]))
                }),
            )
            .unwrap(),
        )
        .unwrap();

    let any_of = f
        .apply(
            ids::ANY_OF,
            vec![
                f.function("urn:example:function:counting-string-equal").unwrap(),
                f.constant("a"),
                strings(&f, &["a", "b", "c"]),
            ],
        )
        .unwrap();
    assert_eq!(any_of.evaluate(None).unwrap(), Value::from(true));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_higher_order_functions() {
    let f = factory();
    let ctx = RequestContext::new().with_values(subject("age"), [20i64, 35, 41]);
    let ages = f.designator(subject("age"), AttributeType::Integer, true);

    // 18 < age for every age
    let all_adults = f
        .apply(
            ids::ALL_OF,
            vec![
                f.function(INTEGER_LESS_THAN).unwrap(),
                f.constant(AttributeValue::Integer(18)),
                ages,
            ],
        )
        .unwrap();
    assert_eq!(eval(&all_adults, &ctx).unwrap().as_bool(), Some(true));

    let lower = f
        .apply(
            ids::MAP,
            vec![f.function(STRING_LOWER).unwrap(), strings(&f, &["A", "b"])],
        )
        .unwrap();
    assert_eq!(lower.datatype(), AttributeType::String.bag());
    let mapped = lower.evaluate(None).unwrap();
    assert!(mapped.as_bag().unwrap().contains(&AttributeValue::from("a")));

    let any_of_any = f
        .apply(
            ids::ANY_OF_ANY,
            vec![
                f.function(STRING_EQUAL).unwrap(),
                strings(&f, &["x", "y"]),
                strings(&f, &["z", "y"]),
            ],
        )
        .unwrap();
    assert_eq!(any_of_any.evaluate(None).unwrap(), Value::from(true));

    assert!(matches!(
        f.apply(
            ids::ANY_OF,
            vec![f.constant("not a function"), strings(&f, &["a"])]
        ),
        Err(PolicyError::NonConstantFunctionArgument { .. })
    ));
}

#[test]
fn test_regex_precompiled_matches_cached() {
    let f = factory();
    let cache = f.registry().regex_cache().clone();
    let subject_text = "admin@example.com";

    for pattern in ["^admin@", "example\\.org$", "@ex"] {
        let precompiled = f
            .apply(
                ids::STRING_REGEXP_MATCH,
                vec![f.constant(pattern), f.constant(subject_text)],
            )
            .unwrap();

        let ctx = RequestContext::new().with_attribute(subject("pattern"), pattern);
        let dynamic_pattern = f
            .apply(
                STRING_ONE_AND_ONLY,
                vec![f.designator(subject("pattern"), AttributeType::String, true)],
            )
            .unwrap();
        let dynamic = f
            .apply(
                ids::STRING_REGEXP_MATCH,
                vec![dynamic_pattern, f.constant(subject_text)],
            )
            .unwrap();

        assert_eq!(
            precompiled.evaluate(None).unwrap(),
            eval(&dynamic, &ctx).unwrap()
        );
    }
    assert_eq!(cache.len(), 3);

    assert!(matches!(
        f.apply(
            ids::STRING_REGEXP_MATCH,
            vec![f.constant("(unclosed"), f.constant(subject_text)]
        ),
        Err(PolicyError::InvalidRegex(_))
    ));
}

#[test]
fn test_logical_keeps_indeterminate() {
    let f = factory();
    let missing = f.apply(
        STRING_ONE_AND_ONLY,
        vec![f.designator(subject("role"), AttributeType::String, true)],
    );
    let is_admin = f
        .apply(STRING_EQUAL, vec![missing.unwrap(), f.constant("admin")])
        .unwrap();

    let or_true = f.apply(ids::OR, vec![is_admin.clone(), f.constant(true)]).unwrap();
    let or_false = f.apply(ids::OR, vec![is_admin, f.constant(false)]).unwrap();
    let ctx = RequestContext::new();

    assert_eq!(eval(&or_true, &ctx).unwrap(), Value::from(true));
    let err = eval(&or_false, &ctx).unwrap_err();
    assert_eq!(err.root_cause().status(), StatusCode::MissingAttribute);
    assert_eq!(
        f.apply(ids::AND, vec![]).unwrap().evaluate(None).unwrap(),
        Value::from(true)
    );
}

#[test]
fn test_conditions_and_variables() {
    let mut f = factory();
    let role = f
        .apply(
            STRING_ONE_AND_ONLY,
            vec![f.designator(subject("role"), AttributeType::String, true)],
        )
        .unwrap();
    let is_admin = f
        .apply(STRING_EQUAL, vec![role, f.constant("admin")])
        .unwrap();
    assert_eq!(f.define_variable("is-admin", is_admin).unwrap(), 0);

    let not_admin = f
        .apply(ids::NOT, vec![f.variable("is-admin").unwrap()])
        .unwrap();
    assert_eq!(f.define_variable("not-admin", not_admin).unwrap(), 1);

    let condition = f.condition(f.variable("not-admin").unwrap()).unwrap();
    let admin = RequestContext::new().with_attribute(subject("role"), "admin");
    let user = RequestContext::new().with_attribute(subject("role"), "user");
    assert_eq!(condition.outcome(Some(&admin)), Outcome::False);
    assert_eq!(condition.outcome(Some(&user)), Outcome::True);
    assert!(condition.outcome(Some(&RequestContext::new())).is_indeterminate());
}
