// src/plan.rs
//! Encoding plans.
//!
//! The compiler's output is data, not code: a tree of [`Step`]s plus the setup
//! each invocation needs (group flags, alias bindings, loop slots). A back end
//! turns it into something callable; `Display` renders it for humans.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// ACCESS PATHS
// ————————————————————————————————————————————————————————————————————————————

/// Where a value lives at encode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    /// The value passed to the encoder.
    Root,
    /// A hoisted sub-path, bound once per invocation.
    Alias(usize),
    /// The current element of loop `n`.
    Item(usize),
    Field(Box<Path>, String),
}

static SPECIAL_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t\n-]").expect("static pattern")
});

/// Keys that cannot be written with a bare dotted accessor.
pub fn is_special_property(name: &str) -> bool {
    SPECIAL_PROPERTY.is_match(name)
}

impl Path {
    pub fn field(&self, key: &str) -> Path {
        Path::Field(Box::new(self.clone()), key.to_string())
    }

    /// The path this one starts from: root, an alias, or a loop item.
    pub fn base(&self) -> &Path {
        match self {
            Path::Field(parent, _) => parent.base(),
            other => other,
        }
    }

    pub fn in_loop(&self) -> bool {
        matches!(self.base(), Path::Item(_))
    }

    /// Field names from the base outwards.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Path::Field(parent, key) => {
                let mut keys = parent.keys();
                keys.push(key);
                keys
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root => f.write_str("v"),
            Path::Alias(i) => write!(f, "s{i}"),
            Path::Item(i) => write!(f, "ar{i}p"),
            Path::Field(parent, key) if is_special_property(key) => write!(f, "{parent}[{key:?}]"),
            Path::Field(parent, key) => write!(f, "{parent}.{key}"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// STEPS
// ————————————————————————————————————————————————————————————————————————————

/// Null/undefined check whose hit writes `fallback` (JSON text) instead of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub null: bool,
    pub undefined: bool,
    pub fallback: String,
}

impl Guard {
    pub fn new(null: bool, undefined: bool, fallback: impl Into<String>) -> Option<Guard> {
        (null || undefined).then(|| Guard { null, undefined, fallback: fallback.into() })
    }

    pub fn matches(&self, v: &Value) -> bool {
        (self.null && v.is_null()) || (self.undefined && v.is_undefined())
    }
}

/// Separator bookkeeping for one optional group (one object level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// Clear the flag: a new object at this level is starting.
    Reset(usize),
    /// Write `,` if a field was already written, then record that one was.
    Comma(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Text(String),
    /// String value, quoted.
    Quoted(Path),
    /// Scalar value as-is.
    Raw(Path),
    /// Date objects as quoted ISO-8601, anything else passed through.
    Date(Path),
    /// No specialization; the generic encoder handles the value.
    Generic(Path),
    /// Array of strings, `["a","b"]`.
    JoinQuoted(Path),
    /// Array of raw scalars, `[1,2]`.
    JoinRaw(Path),
    Separator(Separator),
    Guarded { at: Path, guard: Guard, steps: Vec<Step> },
    /// Field that may be absent (undefined).
    Optional { at: Path, present: Vec<Step>, absent: Vec<Step> },
    Loop { at: Path, slot: usize, item: Vec<Step> },
}

/// An ordered run of steps with adjacent literals folded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    steps: Vec<Step>,
}

impl Fragment {
    pub fn new() -> Self { Self::default() }

    pub fn of(step: Step) -> Self {
        let mut out = Self::new();
        out.push(step);
        out
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        if s.is_empty() {
            return self;
        }
        match self.steps.last_mut() {
            Some(Step::Text(prev)) => prev.push_str(s),
            _ => self.steps.push(Step::Text(s.to_string())),
        }
        self
    }

    pub fn push(&mut self, step: Step) -> &mut Self {
        match step {
            Step::Text(s) => self.text(&s),
            step => {
                self.steps.push(step);
                self
            }
        }
    }

    pub fn append(&mut self, other: Fragment) -> &mut Self {
        for step in other.steps {
            self.push(step);
        }
        self
    }

    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    /// Wrap in a null/undefined check, if there is one.
    pub fn guarded(self, at: &Path, guard: Option<Guard>) -> Fragment {
        match guard {
            Some(guard) => Fragment::of(Step::Guarded { at: at.clone(), guard, steps: self.steps }),
            None => self,
        }
    }

    pub fn steps(&self) -> &[Step] { &self.steps }

    pub fn into_steps(self) -> Vec<Step> { self.steps }
}

// ————————————————————————————————————————————————————————————————————————————
// PLAN
// ————————————————————————————————————————————————————————————————————————————

/// A finalized root plan and the declarations its steps rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<Step>,
    /// Number of optional-group flags (`op0`, `op1`, ...), all false at start.
    pub groups: usize,
    /// Hoisted paths bound in order to `s0`, `s1`, ...; later ones may build on earlier ones.
    pub aliases: Vec<Path>,
    /// Number of loop item slots (`ar0p`, ...).
    pub loops: usize,
}

impl Plan {
    /// Bytes of literal text the plan writes unconditionally; a capacity hint.
    pub fn literal_len(&self) -> usize {
        self.steps.iter()
            .map(|s| match s {
                Step::Text(t) => t.len(),
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups > 0 {
            let flags = (0..self.groups).map(|i| format!("op{i}=false")).collect::<Vec<_>>();
            writeln!(f, "let {}", flags.join(","))?;
        }
        if !self.aliases.is_empty() {
            let binds = self.aliases.iter()
                .enumerate()
                .map(|(i, p)| format!("s{i}={p}"))
                .collect::<Vec<_>>();
            writeln!(f, "const {}", binds.join(","))?;
        }
        writeln!(f, "return")?;
        write_steps(f, &self.steps, 1)
    }
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step], depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    for step in steps {
        match step {
            Step::Text(t) => writeln!(f, "{pad}text {t:?}")?,
            Step::Quoted(p) => writeln!(f, "{pad}quoted {p}")?,
            Step::Raw(p) => writeln!(f, "{pad}raw {p}")?,
            Step::Date(p) => writeln!(f, "{pad}date {p}")?,
            Step::Generic(p) => writeln!(f, "{pad}generic {p}")?,
            Step::JoinQuoted(p) => writeln!(f, "{pad}join-quoted {p}")?,
            Step::JoinRaw(p) => writeln!(f, "{pad}join-raw {p}")?,
            Step::Separator(Separator::Reset(g)) => writeln!(f, "{pad}op{g}=false")?,
            Step::Separator(Separator::Comma(g)) => writeln!(f, "{pad}comma op{g}")?,
            Step::Guarded { at, guard, steps } => {
                let cond = match (guard.null, guard.undefined) {
                    (true, true) => format!("{at}===null||{at}===undefined"),
                    (true, false) => format!("{at}===null"),
                    _ => format!("{at}===undefined"),
                };
                writeln!(f, "{pad}if {cond} then {:?} else", guard.fallback)?;
                write_steps(f, steps, depth + 1)?;
            }
            Step::Optional { at, present, absent } => {
                writeln!(f, "{pad}if {at}===undefined")?;
                write_steps(f, absent, depth + 1)?;
                writeln!(f, "{pad}else")?;
                write_steps(f, present, depth + 1)?;
            }
            Step::Loop { at, slot, item } => {
                writeln!(f, "{pad}for ar{slot}p of {at}")?;
                write_steps(f, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_names_use_bracket_accessors() {
        let p = Path::Root.field("first name").field("x-y").field("plain");
        assert_eq!(p.to_string(), r#"v["first name"]["x-y"].plain"#);
        assert_eq!(p.keys(), ["first name", "x-y", "plain"]);
        assert_eq!(p.base(), &Path::Root);
    }

    #[test]
    fn loop_rooted_paths_are_detected() {
        assert!(Path::Item(0).field("a").in_loop());
        assert!(!Path::Alias(0).field("a").in_loop());
    }

    #[test]
    fn adjacent_text_folds() {
        let mut frag = Fragment::new();
        frag.text("{").text("\"a\":").push(Step::Raw(Path::Root));
        frag.push(Step::Text(",".into())).text("}");
        assert_eq!(frag.steps(), &[
            Step::Text("{\"a\":".into()),
            Step::Raw(Path::Root),
            Step::Text(",}".into()),
        ]);
    }

    #[test]
    fn guard_only_when_flagged() {
        assert!(Guard::new(false, false, "null").is_none());
        let g = Guard::new(true, false, "null").unwrap();
        assert!(g.matches(&Value::Null));
        assert!(!g.matches(&Value::Undefined));
    }
}
