// src/accelerator.rs
//! Accelerator factory: compile a schema once, encode many values.
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;

use crate::backend::Program;
use crate::compiler::compile_plan;
use crate::plan::Plan;
use crate::schema::Schema;
use crate::text::StringEscape;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AcceleratorOptions {
    pub string_escape: StringEscape,
}

/// A schema-specialized JSON encoder.
///
/// Holds no per-call state: `encode` may run concurrently from any number of threads.
#[derive(Debug)]
pub struct Accelerator {
    plan: Plan,
    program: Program,
}

impl Accelerator {
    /// JSON text for a value conforming to the compiled schema. Conformance is not checked.
    pub fn encode(&self, value: &Value) -> String {
        self.program.run(value)
    }

    pub fn encode_json(&self, value: &serde_json::Value) -> String {
        self.encode(&Value::from(value))
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }
}

pub fn create_accelerator(schema: &Schema) -> Accelerator {
    create_accelerator_with(schema, AcceleratorOptions::default())
}

pub fn create_accelerator_with(schema: &Schema, options: AcceleratorOptions) -> Accelerator {
    let plan = compile_plan(schema);
    let program = Program::bind(&plan, options.string_escape);
    Accelerator { plan, program }
}

// ------------------------------- Cache ------------------------------------ //

type Slot = Arc<OnceCell<Arc<Accelerator>>>;

/// Compiled accelerators keyed by schema.
///
/// At most one compile runs per key; threads asking for a key that is being
/// compiled wait for it, and published entries are read without contention.
#[derive(Debug, Default)]
pub struct AcceleratorCache {
    options: AcceleratorOptions,
    entries: RwLock<HashMap<String, Slot>>,
}

impl AcceleratorCache {
    pub fn new(options: AcceleratorOptions) -> Self {
        Self { options, entries: RwLock::new(HashMap::new()) }
    }

    pub fn get_or_compile(&self, schema: &Schema) -> Arc<Accelerator> {
        let key = crate::load::to_document(schema).to_string();
        let slot = self.slot(key);
        slot.get_or_init(|| Arc::new(create_accelerator_with(schema, self.options)))
            .clone()
    }

    fn slot(&self, key: String) -> Slot {
        if let Some(slot) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return slot.clone();
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    /// Both encoders' outputs, parsed back.
    fn both(schema: &Schema, value: &Value) -> (serde_json::Value, serde_json::Value) {
        let fast = create_accelerator(schema).encode(value);
        let slow = crate::value::to_json_string(value);
        let fast: serde_json::Value = serde_json::from_str(&fast)
            .unwrap_or_else(|e| panic!("invalid JSON {fast:?}: {e}"));
        (fast, serde_json::from_str(&slow).unwrap())
    }

    fn assert_equivalent(schema: &Schema, value: serde_json::Value) {
        let (fast, slow) = both(schema, &Value::from(value));
        assert_eq!(fast, slow);
    }

    fn user() -> Schema {
        Schema::object([
            ("id", Schema::number()),
            ("name", Schema::string()),
            ("active", Schema::boolean()),
            ("tags", Schema::array(Schema::string())),
            ("scores", Schema::array(Schema::number())),
            ("bio", Schema::string().nullable()),
            ("social", Schema::object([
                ("facebook", Schema::string().nullable()),
                ("twitter", Schema::string().nullable()),
            ]).optional()),
            ("friends", Schema::array(Schema::object([
                ("id", Schema::number()),
                ("nick", Schema::string().optional()),
            ]))),
        ])
    }

    #[test]
    fn matches_generic_encoder_on_nested_documents() {
        assert_equivalent(&user(), json!({
            "id": 1,
            "name": "saltyaom",
            "active": true,
            "tags": ["a", "b"],
            "scores": [1, 2.5, -3],
            "bio": null,
            "social": {"facebook": "fb", "twitter": null},
            "friends": [{"id": 2, "nick": "x"}, {"id": 3}]
        }));
        assert_equivalent(&user(), json!({
            "id": 1, "name": "", "active": false, "tags": [], "scores": [],
            "bio": "hi", "friends": []
        }));
    }

    #[test]
    fn optional_fields_never_leave_stray_commas() {
        let schema = Schema::object([
            ("a", Schema::number().optional()),
            ("b", Schema::number().optional()),
            ("c", Schema::number()),
            ("d", Schema::number().optional()),
        ]);
        let accel = create_accelerator(&schema);
        for mask in 0..8u8 {
            let mut v = serde_json::Map::new();
            if mask & 1 != 0 { v.insert("a".into(), json!(1)); }
            if mask & 2 != 0 { v.insert("b".into(), json!(2)); }
            v.insert("c".into(), json!(3));
            if mask & 4 != 0 { v.insert("d".into(), json!(4)); }
            let value = serde_json::Value::Object(v);
            let out = accel.encode_json(&value);
            let parsed: serde_json::Value = serde_json::from_str(&out)
                .unwrap_or_else(|e| panic!("mask {mask}: {out:?}: {e}"));
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn all_optional_object_with_every_subset() {
        let schema = Schema::object([
            ("a", Schema::string().optional()),
            ("b", Schema::string().optional()),
            ("c", Schema::string().optional()),
        ]);
        let accel = create_accelerator(&schema);
        assert_eq!(accel.encode_json(&json!({})), "{}");
        assert_eq!(accel.encode_json(&json!({"c": "z"})), r#"{"c":"z"}"#);
        assert_eq!(accel.encode_json(&json!({"a": "x", "c": "z"})), r#"{"a":"x","c":"z"}"#);
        assert_eq!(accel.encode_json(&json!({"b": "y", "c": "z"})), r#"{"b":"y","c":"z"}"#);
    }

    #[test]
    fn absent_optional_field_is_omitted_or_defaulted() {
        let schema = Schema::object([
            ("a", Schema::string().optional()),
            ("n", Schema::number().optional().with_default(5)),
            ("s", Schema::string().optional().with_default("dflt")),
        ]);
        let accel = create_accelerator(&schema);
        assert_eq!(accel.encode_json(&json!({})), r#"{"n":5,"s":"dflt"}"#);
        assert_eq!(accel.encode_json(&json!({"a": "x", "n": 1})), r#"{"a":"x","n":1,"s":"dflt"}"#);
    }

    #[test]
    fn nullable_string_default() {
        let with_default = Schema::object([("name", Schema::string().with_default("x").nullable())]);
        let without = Schema::object([("name", Schema::string().nullable())]);
        let v = json!({"name": null});
        assert_eq!(create_accelerator(&with_default).encode_json(&v), r#"{"name":"x"}"#);
        assert_eq!(create_accelerator(&without).encode_json(&v), r#"{"name":null}"#);
    }

    #[test]
    fn array_fast_paths() {
        let strings = create_accelerator(&Schema::array(Schema::string()));
        let numbers = create_accelerator(&Schema::array(Schema::number()));
        let objects = create_accelerator(&Schema::array(Schema::object([("a", Schema::number())])));
        assert_eq!(strings.encode_json(&json!([])), "[]");
        assert_eq!(numbers.encode_json(&json!([])), "[]");
        assert_eq!(objects.encode_json(&json!([])), "[]");
        assert_eq!(strings.encode_json(&json!(["a", "b"])), r#"["a","b"]"#);
        assert_eq!(numbers.encode_json(&json!([1, 2, 3])), "[1,2,3]");
        assert_eq!(objects.encode_json(&json!([{"a": 1}, {"a": 2}])), r#"[{"a":1},{"a":2}]"#);
    }

    #[test]
    fn nullable_arrays_and_objects_write_null() {
        let schema = Schema::object([
            ("xs", Schema::array(Schema::number()).nullable()),
            ("o", Schema::object([("a", Schema::number())]).nullable()),
        ]);
        let accel = create_accelerator(&schema);
        assert_eq!(accel.encode_json(&json!({"xs": null, "o": null})), r#"{"xs":null,"o":null}"#);
        assert_eq!(accel.encode_json(&json!({"xs": [1], "o": {"a": 2}})), r#"{"xs":[1],"o":{"a":2}}"#);
    }

    #[test]
    fn intersection_merge_writes_both_sides() {
        let schema = Schema::intersection([
            Schema::object([("a", Schema::number())]),
            Schema::object([("b", Schema::number())]),
        ]);
        let accel = create_accelerator(&schema);
        assert_eq!(accel.encode_json(&json!({"a": 1, "b": 2})), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn nullable_date_field() {
        let schema = Schema::object([(
            "at",
            Schema::union([Schema::date(), Schema::string().with_format("date-time"), Schema::null()]),
        )]);
        let accel = create_accelerator(&schema);
        let dt = Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap();
        let dated = Value::object([("at", Value::Date(dt))]);
        assert_eq!(accel.encode(&dated), r#"{"at":"2023-06-01T12:30:00.000Z"}"#);
        assert_eq!(accel.encode_json(&json!({"at": null})), r#"{"at":null}"#);
        assert_eq!(
            accel.encode_json(&json!({"at": "2020-01-01"})),
            r#"{"at":"2020-01-01"}"#
        );
        let (fast, slow) = both(&schema, &dated);
        assert_eq!(fast, slow);
    }

    #[test]
    fn special_property_names() {
        let schema = Schema::object([
            ("first name", Schema::string()),
            ("x-id", Schema::number()),
            ("tab\there", Schema::boolean()),
        ]);
        let accel = create_accelerator(&schema);
        assert_eq!(
            accel.encode_json(&json!({"first name": "Ada", "x-id": 7, "tab\there": true})),
            r#"{"first name":"Ada","x-id":7,"tab\there":true}"#
        );
    }

    #[test]
    fn integer_strings_are_written_bare() {
        let schema = Schema::object([
            ("big", Schema::integer_string()),
            ("maybe", Schema::integer_string().nullable()),
            ("list", Schema::array(Schema::integer_string())),
        ]);
        let accel = create_accelerator(&schema);
        let out = accel.encode_json(&json!({
            "big": "123456789012345678901234567890",
            "maybe": null,
            "list": ["1", 2]
        }));
        assert_eq!(out, r#"{"big":123456789012345678901234567890,"maybe":null,"list":[1,2]}"#);
    }

    #[test]
    fn nullable_integer_string_items() {
        let accel = create_accelerator(&Schema::array(Schema::integer_string().nullable()));
        assert_eq!(accel.encode_json(&json!(["12", null, 3])), "[12,null,3]");
    }

    #[test]
    fn bigint_fields_are_raw() {
        let schema = Schema::object([("n", Schema::bigint())]);
        let v = Value::object([("n", Value::BigInt(-9007199254740993))]);
        assert_eq!(create_accelerator(&schema).encode(&v), r#"{"n":-9007199254740993}"#);
    }

    #[test]
    fn generic_fallbacks_stay_equivalent() {
        let schema = Schema::object([
            ("any", Schema::union([Schema::string(), Schema::number()])),
            ("map", Schema::object([("k", Schema::number())]).with_additional_properties()),
            ("unknown", Schema::other("Symbol")),
        ]);
        assert_equivalent(&schema, json!({
            "any": 3,
            "map": {"k": 1, "extra": [1, {"deep": true}]},
            "unknown": {"whatever": "\"quoted\""}
        }));
    }

    #[test]
    fn strings_are_escaped_unless_trusted() {
        let schema = Schema::object([("s", Schema::string()), ("xs", Schema::array(Schema::string()))]);
        let v = json!({"s": "a\"b\n", "xs": ["\\"]});
        let escaped = create_accelerator(&schema).encode_json(&v);
        assert_eq!(serde_json::from_str::<serde_json::Value>(&escaped).unwrap(), v);

        let trusted = create_accelerator_with(
            &schema,
            AcceleratorOptions { string_escape: StringEscape::Trusted },
        );
        assert_eq!(trusted.encode_json(&v), "{\"s\":\"a\"b\n\",\"xs\":[\"\\\"]}");
    }

    #[test]
    fn repeated_compiles_agree() {
        let v = Value::from(json!({
            "id": 9, "name": "n", "active": true, "tags": ["t"], "scores": [0],
            "bio": null, "friends": [{"id": 1}]
        }));
        let a = create_accelerator(&user());
        let b = create_accelerator(&user());
        assert_eq!(a.plan(), b.plan());
        assert_eq!(a.encode(&v), b.encode(&v));
        assert_eq!(a.encode(&v), a.encode(&v));
    }

    #[test]
    fn concurrent_encoding_shares_one_accelerator() {
        use rayon::prelude::*;
        let accel = create_accelerator(&user());
        let outputs: Vec<String> = (0..64i64)
            .into_par_iter()
            .map(|i| {
                accel.encode_json(&json!({
                    "id": i, "name": "n", "active": i % 2 == 0, "tags": [], "scores": [i],
                    "bio": null, "friends": [{"id": i, "nick": "k"}, {"id": i + 1}]
                }))
            })
            .collect();
        for (i, out) in outputs.iter().enumerate() {
            let parsed: serde_json::Value = serde_json::from_str(out).unwrap();
            assert_eq!(parsed["id"], json!(i));
            assert_eq!(parsed["friends"][1], json!({"id": i + 1}));
        }
    }

    #[test]
    fn cache_compiles_once_per_schema() {
        use rayon::prelude::*;
        let cache = AcceleratorCache::default();
        let firsts: Vec<Arc<Accelerator>> = (0..16)
            .into_par_iter()
            .map(|_| cache.get_or_compile(&user()))
            .collect();
        assert_eq!(cache.len(), 1);
        assert!(firsts.iter().all(|a| Arc::ptr_eq(a, &firsts[0])));
        cache.get_or_compile(&Schema::string());
        assert_eq!(cache.len(), 2);
    }
}
