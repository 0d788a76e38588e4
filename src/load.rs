//! Schema documents ⇄ `Schema`.
//!
//! Reads the JSON Schema dialect TypeBox emits (`type`, `properties`,
//! `required`, `items`, `anyOf`, `allOf`, `default`, `format`,
//! `additionalProperties`, `patternProperties`, and the `Date`/`bigint`/`undefined`
//! type names).
//! A property is optional when its object's `required` does not list it.
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SchemaError;
use crate::path_de::{from_slice_with_path, from_str_with_path, from_value_with_path};
use crate::schema::{ObjectSchema, Schema, SchemaKind};

// ————————————————————————————————————————————————————————————————————————————
// RAW DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "type")]
    ty: Option<TypeField>,
    properties: Option<IndexMap<String, RawSchema>>,
    required: Option<Vec<String>>,
    additional_properties: Option<AdditionalProperties>,
    pattern_properties: Option<IndexMap<String, RawSchema>>,
    items: Option<Items>,
    prefix_items: Option<Vec<RawSchema>>,
    any_of: Option<Vec<RawSchema>>,
    all_of: Option<Vec<RawSchema>>,
    default: Option<Value>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AdditionalProperties {
    Flag(bool),
    Schema(Box<RawSchema>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Items {
    // a derived struct also accepts sequences, so try the tuple form first
    Tuple(Vec<RawSchema>),
    One(Box<RawSchema>),
}

// ————————————————————————————————————————————————————————————————————————————
// LOADING
// ————————————————————————————————————————————————————————————————————————————

pub fn load_str(src: &str) -> Result<Schema, SchemaError> {
    let raw: RawSchema = from_str_with_path(src)?;
    lower(&raw, "#")
}

pub fn load_slice(bytes: &[u8]) -> Result<Schema, SchemaError> {
    let raw: RawSchema = from_slice_with_path(bytes)?;
    lower(&raw, "#")
}

pub fn load_value(doc: Value) -> Result<Schema, SchemaError> {
    let raw: RawSchema = from_value_with_path(doc)?;
    lower(&raw, "#")
}

fn lower(raw: &RawSchema, path: &str) -> Result<Schema, SchemaError> {
    let kind = if let Some(any_of) = &raw.any_of {
        SchemaKind::Union { any_of: lower_all(any_of, "anyOf", path)? }
    } else if let Some(all_of) = &raw.all_of {
        SchemaKind::Intersection { all_of: lower_all(all_of, "allOf", path)? }
    } else {
        match &raw.ty {
            Some(TypeField::One(name)) => kind_for(name, raw, path)?,
            Some(TypeField::Many(names)) => {
                let any_of = names.iter()
                    .map(|name| kind_for(name, raw, path).map(Schema::new))
                    .collect::<Result<Vec<_>, _>>()?;
                SchemaKind::Union { any_of }
            }
            // untyped but shaped like an object
            None if raw.properties.is_some() || raw.pattern_properties.is_some() => {
                kind_for("object", raw, path)?
            }
            None => SchemaKind::Other("any".to_string()),
        }
    };

    Ok(Schema { kind, default: raw.default.clone(), optional: false })
}

fn lower_all(members: &[RawSchema], keyword: &'static str, path: &str) -> Result<Vec<Schema>, SchemaError> {
    if members.is_empty() {
        return Err(SchemaError::EmptyComposition { keyword, path: path.to_string() });
    }
    members.iter()
        .enumerate()
        .map(|(i, m)| lower(m, &format!("{path}/{keyword}/{i}")))
        .collect()
}

fn kind_for(name: &str, raw: &RawSchema, path: &str) -> Result<SchemaKind, SchemaError> {
    let kind = match name {
        "string" => SchemaKind::String { format: raw.format.clone() },
        "number" | "integer" => SchemaKind::Number,
        "boolean" => SchemaKind::Boolean,
        "bigint" => SchemaKind::BigInt,
        "null" => SchemaKind::Null,
        "undefined" => SchemaKind::Undefined,
        "Date" => SchemaKind::Date,
        "object" => SchemaKind::Object(lower_object(raw, path)?),
        "array" => match (&raw.items, &raw.prefix_items) {
            (Some(Items::One(items)), None) => SchemaKind::Array {
                items: Box::new(lower(items, &format!("{path}/items"))?),
            },
            // positional tuples have no specialized encoding
            (Some(Items::Tuple(_)), _) | (_, Some(_)) => SchemaKind::Other("tuple".to_string()),
            (None, None) => return Err(SchemaError::MissingItems { path: path.to_string() }),
        },
        other => SchemaKind::Other(other.to_string()),
    };
    Ok(kind)
}

fn lower_object(raw: &RawSchema, path: &str) -> Result<ObjectSchema, SchemaError> {
    let required = raw.required.clone().unwrap_or_default();
    let mut properties = IndexMap::new();
    if let Some(props) = &raw.properties {
        for (key, prop) in props {
            let mut schema = lower(prop, &format!("{path}/properties/{key}"))?;
            schema.optional = !required.contains(key);
            properties.insert(key.clone(), schema);
        }
    }
    let additional_properties = match &raw.additional_properties {
        Some(AdditionalProperties::Flag(flag)) => *flag,
        Some(AdditionalProperties::Schema(_)) => true,
        None => false,
    };
    // records: keys are only known at runtime
    let has_patterns = raw.pattern_properties.as_ref().is_some_and(|p| !p.is_empty());
    let additional_properties = additional_properties || has_patterns;
    Ok(ObjectSchema { properties, required, additional_properties })
}

// ————————————————————————————————————————————————————————————————————————————
// EMISSION
// ————————————————————————————————————————————————————————————————————————————

/// Canonical document for a schema; `load_value` reads it back to an equal schema
/// whenever each object's `required` matches its optional markers.
pub fn to_document(schema: &Schema) -> Value {
    let mut doc = match &schema.kind {
        SchemaKind::String { format } => {
            let mut o = json!({ "type": "string" });
            if let Some(f) = format {
                o["format"] = Value::from(f.clone());
            }
            o
        }
        SchemaKind::Number => json!({ "type": "number" }),
        SchemaKind::Boolean => json!({ "type": "boolean" }),
        SchemaKind::BigInt => json!({ "type": "bigint" }),
        SchemaKind::Null => json!({ "type": "null" }),
        SchemaKind::Undefined => json!({ "type": "undefined" }),
        SchemaKind::Date => json!({ "type": "Date" }),
        SchemaKind::Other(name) => json!({ "type": name }),
        SchemaKind::Object(object) => {
            let mut props = serde_json::Map::new();
            for (k, p) in &object.properties {
                props.insert(k.clone(), to_document(p));
            }
            let required = object.properties.iter()
                .filter(|(_, p)| !p.optional)
                .map(|(k, _)| Value::from(k.clone()))
                .collect::<Vec<_>>();
            let mut o = json!({ "type": "object", "properties": props, "required": required });
            if object.additional_properties {
                o["additionalProperties"] = Value::Bool(true);
            }
            o
        }
        SchemaKind::Array { items } => json!({ "type": "array", "items": to_document(items) }),
        SchemaKind::Union { any_of } => json!({ "anyOf": any_of.iter().map(to_document).collect::<Vec<_>>() }),
        SchemaKind::Intersection { all_of } => {
            json!({ "allOf": all_of.iter().map(to_document).collect::<Vec<_>>() })
        }
    };
    if let Some(default) = &schema.default {
        doc["default"] = default.clone();
    }
    doc
}
