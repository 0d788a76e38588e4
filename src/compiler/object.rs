use crate::normalize::merge_intersection;
use crate::plan::{Fragment, Guard, Path, Separator, Step};
use crate::schema::{Schema, SchemaKind};
use crate::text::quoted_key;

use super::{compile, CompileState};

/// `{"key":value,...}` in declaration order.
///
/// Separators are literal wherever the position is known at compile time, i.e.
/// once a required field has been written. Before that, a field's comma depends
/// on which optional fields turned out to be present, so it goes through the
/// level's group flag.
pub fn compile_object(
    schema: &Schema,
    at: &Path,
    guard: Option<Guard>,
    state: &mut CompileState,
) -> Fragment {
    let merged = merge_intersection(schema);
    let SchemaKind::Object(object) = &merged.kind else {
        return Fragment::of(Step::Generic(at.clone()));
    };
    if object.additional_properties {
        return Fragment::of(Step::Generic(at.clone()));
    }

    let group = object.properties.values()
        .any(|p| p.optional)
        .then(|| state.next_group());

    let mut body = Fragment::new();
    if let Some(g) = group {
        body.push(Step::Separator(Separator::Reset(g)));
    }
    body.text("{");

    let mut placed = false; // a field has been written unconditionally
    for (key, property) in &object.properties {
        if matches!(property.kind, SchemaKind::Undefined) {
            continue;
        }

        let name = at.field(key);
        let value_at = if property.is_object_typed() && !name.in_loop() {
            state.hoist(name)
        } else {
            name
        };
        let label = format!("{}:", quoted_key(key));
        let value = compile(property, &value_at, state);

        if property.optional {
            let mut present = Fragment::new();
            separator(&mut present, placed, group);
            present.text(&label).append(value);

            let mut absent = Fragment::new();
            if let Some(default) = &property.default {
                separator(&mut absent, placed, group);
                absent.text(&label).text(&default.to_string());
            }

            body.push(Step::Optional {
                at: value_at,
                present: present.into_steps(),
                absent: absent.into_steps(),
            });
        } else {
            separator(&mut body, placed, group);
            body.text(&label).append(value);
            placed = true;
        }
    }

    body.text("}");
    body.guarded(at, guard)
}

fn separator(frag: &mut Fragment, placed: bool, group: Option<usize>) {
    match (placed, group) {
        (true, _) => {
            frag.text(",");
        }
        (false, Some(g)) => {
            frag.push(Step::Separator(Separator::Comma(g)));
        }
        (false, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_becomes_static_after_first_required_field() {
        let schema = Schema::object([
            ("a", Schema::number().optional()),
            ("b", Schema::number()),
            ("c", Schema::number().optional()),
        ]);
        let mut state = CompileState::new();
        let frag = compile_object(&schema, &Path::Root, None, &mut state);
        let steps = frag.steps();

        let Step::Optional { present: first, .. } = &steps[2] else { panic!("{steps:?}") };
        assert_eq!(first[0], Step::Separator(Separator::Comma(0)));

        assert_eq!(steps[3], Step::Separator(Separator::Comma(0)));

        let Step::Optional { present: last, absent, .. } = &steps[6] else { panic!("{steps:?}") };
        assert_eq!(last[0], Step::Text(",\"c\":".into()));
        assert!(absent.is_empty());
    }

    #[test]
    fn absent_optional_with_default_writes_prebaked_pair() {
        let schema = Schema::object([("n", Schema::number().optional().with_default(3))]);
        let mut state = CompileState::new();
        let frag = compile_object(&schema, &Path::Root, None, &mut state);
        let Step::Optional { absent, .. } = &frag.steps()[2] else { panic!("optional") };
        assert_eq!(absent, &vec![
            Step::Separator(Separator::Comma(0)),
            Step::Text("\"n\":3".into()),
        ]);
    }

    #[test]
    fn keys_are_escaped_in_literals() {
        let schema = Schema::object([("say \"hi\"", Schema::number())]);
        let mut state = CompileState::new();
        let frag = compile_object(&schema, &Path::Root, None, &mut state);
        assert_eq!(frag.steps()[0], Step::Text(r#"{"say \"hi\"":"#.into()));
    }
}
