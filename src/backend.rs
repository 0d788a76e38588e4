//! Closure back end.
//!
//! Lowers a [`Plan`] once into a tree of boxed closures. Each invocation gets a
//! fresh [`Frame`] holding the root value, the resolved alias bindings, the
//! loop item slots and the group flags; nothing mutable outlives a call, so a
//! [`Program`] can be shared across threads.
use crate::plan::{Guard, Path, Plan, Separator, Step};
use crate::text::{push_int, push_quoted, StringEscape};
use crate::value::{to_json_string, Value, UNDEFINED};

/// Per-invocation state.
pub struct Frame<'v> {
    root: &'v Value,
    aliases: Vec<&'v Value>,
    items: Vec<&'v Value>,
    groups: Vec<bool>,
}

type Emit = Box<dyn for<'v> Fn(&mut Frame<'v>, &mut String) + Send + Sync>;

fn emit<F>(f: F) -> Emit
where
    F: for<'v> Fn(&mut Frame<'v>, &mut String) + Send + Sync + 'static,
{
    Box::new(f)
}

// ------------------------------- Access ----------------------------------- //

#[derive(Debug, Clone, Copy)]
enum Base {
    Root,
    Alias(usize),
    Item(usize),
}

/// A path flattened into its base slot plus the keys to follow.
#[derive(Debug, Clone)]
struct Access {
    base: Base,
    keys: Box<[String]>,
}

impl Access {
    fn new(path: &Path) -> Self {
        let base = match path.base() {
            Path::Alias(i) => Base::Alias(*i),
            Path::Item(i) => Base::Item(*i),
            _ => Base::Root,
        };
        let keys = path.keys().into_iter().map(str::to_string).collect();
        Self { base, keys }
    }

    fn resolve<'v>(&self, frame: &Frame<'v>) -> &'v Value {
        let mut v = match self.base {
            Base::Root => frame.root,
            Base::Alias(i) => frame.aliases[i],
            Base::Item(i) => frame.items[i],
        };
        for key in self.keys.iter() {
            v = v.get(key);
        }
        v
    }
}

// ------------------------------- Program ---------------------------------- //

/// A plan bound into a callable encoder.
pub struct Program {
    emit: Emit,
    aliases: Vec<Access>,
    groups: usize,
    loops: usize,
    capacity: usize,
}

impl Program {
    pub fn bind(plan: &Plan, escape: StringEscape) -> Self {
        Self {
            emit: lower(&plan.steps, escape),
            aliases: plan.aliases.iter().map(Access::new).collect(),
            groups: plan.groups,
            loops: plan.loops,
            capacity: plan.literal_len() + 16,
        }
    }

    pub fn run(&self, value: &Value) -> String {
        let mut frame = Frame {
            root: value,
            aliases: Vec::with_capacity(self.aliases.len()),
            items: vec![&UNDEFINED; self.loops],
            groups: vec![false; self.groups],
        };
        // bind in order: an alias may be a path off an earlier one
        for alias in &self.aliases {
            let v = alias.resolve(&frame);
            frame.aliases.push(v);
        }

        let mut out = String::with_capacity(self.capacity);
        (self.emit)(&mut frame, &mut out);
        out
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("aliases", &self.aliases)
            .field("groups", &self.groups)
            .field("loops", &self.loops)
            .finish_non_exhaustive()
    }
}

// ------------------------------- Lowering --------------------------------- //

fn lower(steps: &[Step], escape: StringEscape) -> Emit {
    let mut parts: Vec<Emit> = steps.iter().map(|s| lower_step(s, escape)).collect();
    match parts.len() {
        0 => emit(|_, _| {}),
        1 => parts.remove(0),
        _ => emit(move |frame, out| {
            for part in &parts {
                part(frame, out);
            }
        }),
    }
}

fn lower_step(step: &Step, escape: StringEscape) -> Emit {
    match step {
        Step::Text(text) => {
            let text = text.clone();
            emit(move |_, out| out.push_str(&text))
        }
        Step::Quoted(at) => {
            let at = Access::new(at);
            emit(move |frame, out| write_quoted(out, at.resolve(frame), escape))
        }
        Step::Raw(at) => {
            let at = Access::new(at);
            emit(move |frame, out| write_raw(out, at.resolve(frame), escape))
        }
        Step::Date(at) => {
            let at = Access::new(at);
            emit(move |frame, out| write_date(out, at.resolve(frame), escape))
        }
        Step::Generic(at) => {
            let at = Access::new(at);
            emit(move |frame, out| out.push_str(&to_json_string(at.resolve(frame))))
        }
        Step::JoinQuoted(at) => {
            let at = Access::new(at);
            emit(move |frame, out| {
                write_joined(out, at.resolve(frame), |out, x| write_quoted(out, x, escape))
            })
        }
        Step::JoinRaw(at) => {
            let at = Access::new(at);
            emit(move |frame, out| {
                write_joined(out, at.resolve(frame), |out, x| write_raw(out, x, escape))
            })
        }
        Step::Separator(Separator::Reset(g)) => {
            let g = *g;
            emit(move |frame, _| frame.groups[g] = false)
        }
        Step::Separator(Separator::Comma(g)) => {
            let g = *g;
            emit(move |frame, out| {
                if frame.groups[g] {
                    out.push(',');
                } else {
                    frame.groups[g] = true;
                }
            })
        }
        Step::Guarded { at, guard, steps } => {
            let at = Access::new(at);
            let guard: Guard = guard.clone();
            let body = lower(steps, escape);
            emit(move |frame, out| {
                if guard.matches(at.resolve(frame)) {
                    out.push_str(&guard.fallback);
                } else {
                    body(frame, out);
                }
            })
        }
        Step::Optional { at, present, absent } => {
            let at = Access::new(at);
            let present = lower(present, escape);
            let absent = lower(absent, escape);
            emit(move |frame, out| {
                if at.resolve(frame).is_undefined() {
                    absent(frame, out);
                } else {
                    present(frame, out);
                }
            })
        }
        Step::Loop { at, slot, item } => {
            let at = Access::new(at);
            let slot = *slot;
            let item = lower(item, escape);
            emit(move |frame, out| match at.resolve(frame) {
                Value::Array(xs) => {
                    out.push('[');
                    for (i, x) in xs.iter().enumerate() {
                        if i != 0 {
                            out.push(',');
                        }
                        frame.items[slot] = x;
                        item(frame, out);
                    }
                    out.push(']');
                }
                other => out.push_str(&to_json_string(other)),
            })
        }
    }
}

// -------------------------------- Writers --------------------------------- //

fn write_quoted(out: &mut String, v: &Value, escape: StringEscape) {
    match v {
        Value::String(s) => push_quoted(out, s, escape),
        other => out.push_str(&to_json_string(other)),
    }
}

/// Scalars as their bare text. Strings pass through unquoted (integer-as-string).
fn write_raw(out: &mut String, v: &Value, escape: StringEscape) {
    match v {
        Value::Undefined | Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::BigInt(n) => push_int(out, *n),
        Value::String(s) => out.push_str(s),
        Value::Date(_) => write_date(out, v, escape),
        Value::Array(_) | Value::Object(_) => out.push_str(&to_json_string(v)),
    }
}

fn write_date(out: &mut String, v: &Value, escape: StringEscape) {
    match v {
        Value::Date(dt) => push_quoted(out, &crate::text::iso_8601(dt), StringEscape::Trusted),
        Value::String(s) => push_quoted(out, s, escape),
        other => write_raw(out, other, escape),
    }
}

fn write_joined(out: &mut String, v: &Value, mut each: impl FnMut(&mut String, &Value)) {
    let Value::Array(xs) = v else {
        out.push_str(&to_json_string(v));
        return;
    };
    out.push('[');
    for (i, x) in xs.iter().enumerate() {
        if i != 0 {
            out.push(',');
        }
        each(out, x);
    }
    out.push(']');
}
