//! Schema → encoding plan compiler.
//!
//! Recursive descent over the schema tree. Each call gets the schema node and
//! the access path of the value it describes, and returns the plan fragment
//! that writes that value. One [`CompileState`] is threaded through every call
//! of a top-level compile so that group flags, loop slots and hoisted aliases
//! get distinct, never reused indices.
//!
//! Dispatch happens on the *normalized* node: wrapper unions are peeled first
//! (see [`crate::normalize`]), and the null/undefined flags they carried turn
//! into a [`Guard`] around the kind-specific fragment.
pub mod array;
pub mod object;

use crate::normalize::{
    classify_modifiers, is_date_like, is_integer_encoded_as_string, nullish_members,
};
use crate::plan::{Fragment, Guard, Path, Plan, Step};
use crate::schema::{Schema, SchemaKind};

// ------------------------------ State ------------------------------------- //

/// Mutable state for one top-level compile. Counters only grow.
#[derive(Debug, Default)]
pub struct CompileState {
    /// Optional-group flags allocated so far (one per object level with optional fields).
    pub optional_groups: usize,
    /// Loop slots allocated so far (one per array).
    pub loops: usize,
    /// Paths bound to aliases, in binding order.
    pub hoisted: Vec<Path>,
}

impl CompileState {
    pub fn new() -> Self { Self::default() }

    pub fn next_group(&mut self) -> usize {
        let g = self.optional_groups;
        self.optional_groups += 1;
        g
    }

    pub fn next_loop(&mut self) -> usize {
        let i = self.loops;
        self.loops += 1;
        i
    }

    /// Bind `path` to a fresh alias and return the alias path.
    pub fn hoist(&mut self, path: Path) -> Path {
        let i = self.hoisted.len();
        log::trace!("hoisting {path} as s{i}");
        self.hoisted.push(path);
        Path::Alias(i)
    }

    /// Close the compile: the root fragment plus the declarations it needs.
    pub fn finish(self, root: Fragment) -> Plan {
        Plan {
            steps: root.into_steps(),
            groups: self.optional_groups,
            aliases: self.hoisted,
            loops: self.loops,
        }
    }
}

// ------------------------------ Front API ---------------------------------- //

/// Compile a root schema into a finished plan.
pub fn compile_plan(schema: &Schema) -> Plan {
    let mut state = CompileState::new();
    let root = compile(schema, &Path::Root, &mut state);
    let plan = state.finish(root);
    log::debug!(
        "compiled `{}` schema: {} steps, {} group flags, {} aliases, {} loops",
        schema.kind_name(),
        plan.steps.len(),
        plan.groups,
        plan.aliases.len(),
        plan.loops,
    );
    plan
}

/// Plan fragment writing the value at `at`, described by `schema`.
pub fn compile(schema: &Schema, at: &Path, state: &mut CompileState) -> Fragment {
    let modifiers = classify_modifiers(schema);
    let effective = modifiers.schema;
    let (nullable, undefinable) = (modifiers.nullable, modifiers.undefinable);

    match &effective.kind {
        SchemaKind::String { .. } => {
            let guard = Guard::new(nullable, undefinable, default_text(effective, schema));
            Fragment::of(Step::Quoted(at.clone())).guarded(at, guard)
        }
        SchemaKind::Number | SchemaKind::Boolean | SchemaKind::BigInt => {
            let guard = Guard::new(nullable, undefinable, default_text(effective, schema));
            Fragment::of(Step::Raw(at.clone())).guarded(at, guard)
        }
        SchemaKind::Null => Fragment::of(Step::Raw(at.clone())),
        SchemaKind::Undefined => Fragment::new(),
        SchemaKind::Object(_) => {
            object::compile_object(effective, at, Guard::new(nullable, undefinable, "null"), state)
        }
        SchemaKind::Intersection { .. } if effective.is_object_typed() => {
            object::compile_object(effective, at, Guard::new(nullable, undefinable, "null"), state)
        }
        SchemaKind::Array { items } => {
            array::compile_array(items, at, Guard::new(nullable, undefinable, "null"), state)
        }
        _ => compile_other(effective, schema, at, nullable, undefinable),
    }
}

/// Date-like and integer-as-string unions, else the generic fallback.
fn compile_other(
    effective: &Schema,
    declared: &Schema,
    at: &Path,
    nullable: bool,
    undefinable: bool,
) -> Fragment {
    // a peeled `Date | null` leaves the bare date tag behind
    let date = is_date_like(effective) || matches!(effective.kind, SchemaKind::Date);
    if !date && !is_integer_encoded_as_string(effective) {
        log::trace!("generic fallback for `{}` at {at}", effective.kind_name());
        return Fragment::of(Step::Generic(at.clone()));
    }

    // these unions carry several members and never normalize, so their own
    // null/undefined members count alongside any wrapper's
    let (inner_null, inner_undefined) = nullish_members(effective);
    let guard = Guard::new(
        nullable || inner_null,
        undefinable || inner_undefined,
        default_text(effective, declared),
    );
    let step = if date {
        Step::Date(at.clone())
    } else {
        Step::Raw(at.clone())
    };
    Fragment::of(step).guarded(at, guard)
}

/// JSON text written when a guard hits: the node's default, else `null`.
///
/// The peeled node's default wins over the wrapper's.
fn default_text(effective: &Schema, declared: &Schema) -> String {
    effective.default.as_ref()
        .or(declared.default.as_ref())
        .map(|d| d.to_string())
        .unwrap_or_else(|| "null".to_string())
}
