// src/normalize.rs
//! Schema normalization.
//!
//! Pure functions over borrowed schema nodes: peel nullable/undefinable wrapper
//! unions, flatten object intersections, and recognize the two special scalar
//! encodings (date-like and integer-as-string). Nothing here mutates its input;
//! merging derives a new owned node.

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::schema::{ObjectSchema, Schema, SchemaKind};

/// A node with its wrapper union peeled away.
#[derive(Debug, Clone, Copy)]
pub struct Modifiers<'s> {
    pub schema: &'s Schema,
    pub nullable: bool,
    pub undefinable: bool,
}

impl Modifiers<'_> {
    pub fn is_wrapped(&self) -> bool {
        self.nullable || self.undefinable
    }
}

/// Peel `X | null | undefined` down to `X`.
///
/// Non-unions come back unchanged with both flags off. A union with more than
/// one member besides null/undefined (or with none) does not normalize: the
/// original union is returned, flags off, and the caller falls back to generic
/// encoding.
pub fn classify_modifiers(node: &Schema) -> Modifiers<'_> {
    let unchanged = Modifiers { schema: node, nullable: false, undefinable: false };
    let SchemaKind::Union { any_of } = &node.kind else {
        return unchanged;
    };

    let mut nullable = false;
    let mut undefinable = false;
    let mut effective: Option<&Schema> = None;

    for member in any_of {
        match member.kind {
            SchemaKind::Null => nullable = true,
            SchemaKind::Undefined => undefinable = true,
            _ if effective.is_none() => effective = Some(member),
            _ => return unchanged,
        }
    }

    match effective {
        Some(schema) => Modifiers { schema, nullable, undefinable },
        None => unchanged,
    }
}

/// Which null/undefined members a union carries, whether or not it normalizes.
pub fn nullish_members(node: &Schema) -> (bool, bool) {
    let SchemaKind::Union { any_of } = &node.kind else {
        return (false, false);
    };
    any_of.iter().fold((false, false), |(n, u), m| match m.kind {
        SchemaKind::Null => (true, u),
        SchemaKind::Undefined => (n, true),
        _ => (n, u),
    })
}

/// Flatten an object-typed intersection into one object schema.
///
/// Properties are gathered member by member (later members win on a key
/// collision), `required` lists are concatenated, and a member that admits
/// additional properties makes the merged object admit them. Property schemas
/// that are themselves intersections are merged recursively. Members that are
/// not objects are skipped.
pub fn merge_intersection(node: &Schema) -> Cow<'_, Schema> {
    let SchemaKind::Intersection { all_of } = &node.kind else {
        return Cow::Borrowed(node);
    };
    if !node.is_object_typed() {
        return Cow::Borrowed(node);
    }

    let mut merged = ObjectSchema {
        properties: IndexMap::new(),
        required: Vec::new(),
        additional_properties: false,
    };
    for member in all_of {
        let member = merge_intersection(member);
        let SchemaKind::Object(object) = &member.kind else {
            log::debug!("skipping non-object intersection member of kind `{}`", member.kind_name());
            continue;
        };
        merged.required.extend(object.required.iter().cloned());
        merged.additional_properties |= object.additional_properties;
        for (key, property) in &object.properties {
            merged.properties.insert(key.clone(), merge_intersection(property).into_owned());
        }
    }

    Cow::Owned(Schema {
        kind: SchemaKind::Object(merged),
        default: node.default.clone(),
        optional: node.optional,
    })
}

/// `string{format: integer} | number`, ignoring null/undefined members and a
/// null/undefined wrapper around the union.
pub fn is_integer_encoded_as_string(node: &Schema) -> bool {
    let Some(members) = flat_members(node) else {
        return false;
    };

    let mut has_integer_format = false;
    let mut has_number = false;
    for member in members {
        match &member.kind {
            SchemaKind::Null | SchemaKind::Undefined => continue,
            SchemaKind::String { format: Some(f) } if f == "integer" && !has_integer_format => {
                has_integer_format = true;
            }
            SchemaKind::Number if !has_number => has_number = true,
            _ => return false,
        }
    }
    has_integer_format && has_number
}

/// A union with a date member. Other members (strings, numbers) are tolerated,
/// and so is a null/undefined wrapper around the union.
pub fn is_date_like(node: &Schema) -> bool {
    flat_members(node)
        .is_some_and(|members| members.iter().any(|m| matches!(m.kind, SchemaKind::Date)))
}

/// A union's members with nested unions spliced in one level deep.
fn flat_members(node: &Schema) -> Option<Vec<&Schema>> {
    let SchemaKind::Union { any_of } = &node.kind else {
        return None;
    };
    let mut out = Vec::with_capacity(any_of.len());
    for member in any_of {
        match &member.kind {
            SchemaKind::Union { any_of: inner } => out.extend(inner),
            _ => out.push(member),
        }
    }
    Some(out)
}
