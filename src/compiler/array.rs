use crate::normalize::is_integer_encoded_as_string;
use crate::plan::{Fragment, Guard, Path, Step};
use crate::schema::{Schema, SchemaKind};

use super::{compile, CompileState};

/// Arrays: a join for scalar items, else a loop over an item sub-plan.
///
/// Every array takes a loop slot, fast path or not, so slot numbers follow
/// array nesting order.
pub fn compile_array(
    items: &Schema,
    at: &Path,
    guard: Option<Guard>,
    state: &mut CompileState,
) -> Fragment {
    let slot = state.next_loop();

    let body = match &items.kind {
        SchemaKind::String { .. } => Step::JoinQuoted(at.clone()),
        SchemaKind::Number | SchemaKind::Boolean | SchemaKind::BigInt => Step::JoinRaw(at.clone()),
        _ if is_integer_encoded_as_string(items) => Step::JoinRaw(at.clone()),
        _ => {
            let item = compile(items, &Path::Item(slot), state);
            Step::Loop { at: at.clone(), slot, item: item.into_steps() }
        }
    };

    Fragment::of(body).guarded(at, guard)
}
