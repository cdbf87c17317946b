use std::cell::RefCell;

use super::{EncodeConfig, EncodeError, Encoder};
use crate::{
    registry::Registry,
    value::{Encodable, Key, Value},
};

struct Point {
    x: i64,
    y: i64,
}

impl Encodable for Point {}

fn encode_point(point: &Point) -> Value {
    Value::object(vec![
        (Key::from("x"), Value::from(point.x)),
        (Key::from("y"), Value::from(point.y)),
    ])
}

fn point_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register::<Point, _>(encode_point);
    registry
}

#[test]
fn registered_type_encodes_like_its_expansion() {
    let registry = point_registry();
    let encoder = Encoder::new().registry(&registry);

    let point = Point { x: 1, y: 2 };
    let direct = encoder.encode(&encode_point(&point)).unwrap();
    let through_registry = encoder.encode(&Value::foreign(point)).unwrap();

    // insertion order of the returned mapping is preserved
    assert_eq!(through_registry, r#"{"x":1,"y":2}"#);
    assert_eq!(through_registry, direct);
}

#[test]
fn unregistered_type_is_unserializable() {
    struct Blob;
    impl Encodable for Blob {}

    let error = crate::to_string(&Value::foreign(Blob)).unwrap_err();

    assert!(
        matches!(error, EncodeError::Unserializable(name) if name.ends_with("Blob"))
    );
}

#[test]
fn replaced_encoder_is_never_invoked_again() {
    struct Tag;
    impl Encodable for Tag {}

    crate::register::<Tag, _>(|_| Value::Str("old".to_owned()));
    crate::register::<Tag, _>(|_| Value::Str("new".to_owned()));

    assert_eq!(
        crate::to_string(&Value::foreign(Tag)).unwrap(),
        r#""new""#
    );
}

#[test]
fn native_escape_hatch_bypasses_registry() {
    let registry = point_registry();
    let encoder = Encoder::new().registry(&registry).native();

    let error = encoder.encode(&Value::foreign(Point { x: 0, y: 0 }));

    assert!(matches!(error, Err(EncodeError::Unserializable(_))));
}

#[test]
fn fallback_handler_replaces_registry_lookup() {
    let registry = point_registry();
    let fallback = |_: &crate::Foreign| -> Result<Value, EncodeError> {
        Ok(Value::Str("fallback".to_owned()))
    };
    let encoder = Encoder::new().registry(&registry).fallback(&fallback);

    assert_eq!(
        encoder.encode(&Value::foreign(Point { x: 1, y: 1 })).unwrap(),
        r#""fallback""#
    );
}

#[test]
fn nested_foreign_values_expand_recursively() {
    struct Segment {
        from: Point,
        to: Point,
    }
    impl Encodable for Segment {}

    let mut registry = point_registry();
    registry.register::<Segment, _>(|segment| {
        Value::object(vec![
            (
                Key::from("from"),
                Value::foreign(Point {
                    x: segment.from.x,
                    y: segment.from.y,
                }),
            ),
            (
                Key::from("to"),
                Value::foreign(Point { x: segment.to.x, y: segment.to.y }),
            ),
        ])
    });

    let encoder = Encoder::new().registry(&registry);
    let segment = Segment {
        from: Point { x: 0, y: 0 },
        to: Point { x: 3, y: 4 },
    };

    assert_eq!(
        encoder.encode(&Value::foreign(segment)).unwrap(),
        r#"{"from":{"x":0,"y":0},"to":{"x":3,"y":4}}"#
    );
}

#[test]
fn direct_cycle_is_detected() {
    let items = Value::array(vec![Value::Int(1)]);
    items.as_array().unwrap().borrow_mut().push(items.clone());

    let error = crate::to_string(&items).unwrap_err();

    assert!(matches!(error, EncodeError::CircularReference));
}

#[test]
fn object_cycle_is_detected() {
    let entries = Value::object(vec![(Key::from("name"), Value::Null)]);
    entries
        .as_object()
        .unwrap()
        .borrow_mut()
        .push((Key::from("self"), entries.clone()));

    let error = crate::to_string(&entries).unwrap_err();

    assert!(matches!(error, EncodeError::CircularReference));
}

#[test]
fn shared_acyclic_nodes_encode_once_per_occurrence() {
    let shared = Value::array(vec![Value::Int(1), Value::Int(2)]);
    let value = Value::array(vec![shared.clone(), shared]);

    assert_eq!(crate::to_string(&value).unwrap(), "[[1,2],[1,2]]");
}

#[test]
fn cycle_through_custom_encoder_is_detected() {
    struct Node {
        next: RefCell<Option<Value>>,
    }
    impl Encodable for Node {}

    let mut registry = Registry::new();
    registry.register::<Node, _>(|node| {
        Value::object(vec![(
            Key::from("next"),
            node.next.borrow().clone().unwrap_or(Value::Null),
        )])
    });

    let node = Value::foreign(Node { next: RefCell::new(None) });
    *node
        .as_foreign()
        .unwrap()
        .downcast_ref::<Node>()
        .unwrap()
        .next
        .borrow_mut() = Some(node.clone());

    let encoder = Encoder::new().registry(&registry);
    let error = encoder.encode(&node).unwrap_err();

    assert!(matches!(error, EncodeError::CircularReference));
}

#[test]
fn cycle_checking_can_be_disabled_for_acyclic_sharing() {
    let shared = Value::array(vec![Value::Int(7)]);
    let value = Value::array(vec![shared.clone(), shared]);

    let encoder = Encoder::with_config(EncodeConfig {
        check_circular: false,
        ..EncodeConfig::default()
    });

    assert_eq!(encoder.encode(&value).unwrap(), "[[7],[7]]");
}

#[test]
fn sort_keys_orders_entries() {
    let value = Value::object(vec![
        (Key::from("b"), Value::Int(2)),
        (Key::from("a"), Value::Int(1)),
        (Key::from(10_i64), Value::Int(3)),
    ]);

    let encoder = Encoder::with_config(EncodeConfig {
        sort_keys: true,
        ..EncodeConfig::default()
    });

    assert_eq!(encoder.encode(&value).unwrap(), r#"{"10":3,"a":1,"b":2}"#);
}

#[test]
fn indent_matches_native_pretty_output() {
    let value = Value::object(vec![
        (Key::from("a"), Value::array(vec![Value::Int(1), Value::Int(2)])),
        (Key::from("b"), Value::object(vec![])),
    ]);

    let encoder = Encoder::with_config(EncodeConfig {
        indent: Some("  ".to_owned()),
        ..EncodeConfig::default()
    });

    let expected = serde_json::to_string_pretty(
        &serde_json::json!({"a": [1, 2], "b": {}}),
    )
    .unwrap();

    assert_eq!(encoder.encode(&value).unwrap(), expected);
}

#[test]
fn custom_separators_apply() {
    let value = Value::object(vec![
        (Key::from("a"), Value::Int(1)),
        (Key::from("b"), Value::array(vec![Value::Int(2), Value::Int(3)])),
    ]);

    let encoder = Encoder::with_config(EncodeConfig {
        separators: Some((", ".to_owned(), ": ".to_owned())),
        ..EncodeConfig::default()
    });

    assert_eq!(
        encoder.encode(&value).unwrap(),
        r#"{"a": 1, "b": [2, 3]}"#
    );
}

#[test]
fn ensure_ascii_escapes_non_ascii() {
    let value = Value::from("caf\u{e9} \u{1f600}");

    let encoder = Encoder::with_config(EncodeConfig {
        ensure_ascii: true,
        ..EncodeConfig::default()
    });

    assert_eq!(
        encoder.encode(&value).unwrap(),
        r#""caf\u00e9 \ud83d\ude00""#
    );

    // untouched by default
    assert_eq!(crate::to_string(&value).unwrap(), "\"caf\u{e9} \u{1f600}\"");
}

#[test]
fn non_finite_floats_follow_the_nan_policy() {
    let value = Value::array(vec![Value::Float(f64::NAN)]);

    assert_eq!(crate::to_string(&value).unwrap(), "[null]");

    let strict = Encoder::with_config(EncodeConfig {
        allow_nan: false,
        ..EncodeConfig::default()
    });

    assert!(matches!(
        strict.encode(&value).unwrap_err(),
        EncodeError::NonFiniteFloat
    ));
}

#[test]
fn foreign_keys_follow_the_skip_policy() {
    struct Opaque;
    impl Encodable for Opaque {}

    let Value::Foreign(key) = Value::foreign(Opaque) else {
        unreachable!()
    };
    let value = Value::object(vec![
        (Key::from("kept"), Value::Int(1)),
        (Key::Foreign(key), Value::Int(2)),
    ]);

    assert!(matches!(
        crate::to_string(&value).unwrap_err(),
        EncodeError::InvalidKey(_)
    ));

    let lenient = Encoder::with_config(EncodeConfig {
        skip_foreign_keys: true,
        ..EncodeConfig::default()
    });

    assert_eq!(lenient.encode(&value).unwrap(), r#"{"kept":1}"#);
}

#[test]
fn writer_output_equals_string_output() {
    let value = Value::object(vec![
        (Key::from("menu"), Value::array(vec![Value::from("egg")])),
        (Key::from("count"), Value::Int(2)),
    ]);

    let mut buffer = Vec::new();
    crate::to_writer(&mut buffer, &value).unwrap();

    assert_eq!(buffer, crate::to_string(&value).unwrap().into_bytes());
}

#[test]
fn default_facade_equals_explicit_default_encoder() {
    let value = Value::array(vec![Value::Bool(true), Value::Null]);

    assert_eq!(
        crate::to_string(&value).unwrap(),
        Encoder::new().encode(&value).unwrap()
    );
}
