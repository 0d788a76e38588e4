// Strongly-typed schema tree consumed by the compiler. No raw JSON documents here.

use indexmap::IndexMap;

/// One node of a schema tree.
///
/// `optional` is the property-level modifier ("this field may be absent"); it is
/// independent of the kind. `default` is the literal written in place of a
/// missing or null value where the encoder allows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub kind: SchemaKind,
    pub default: Option<serde_json::Value>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String { format: Option<String> },
    Number,
    Boolean,
    BigInt,
    Null,
    Undefined,
    Object(ObjectSchema),
    Array { items: Box<Schema> },
    Union { any_of: Vec<Schema> },
    Intersection { all_of: Vec<Schema> },
    /// Date tag; only meaningful as a member of a date-like union.
    Date,
    /// Anything the compiler does not recognize, keyed by its type name.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>, // declaration order drives output order
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self { kind, default: None, optional: false }
    }

    pub fn string() -> Self { Self::new(SchemaKind::String { format: None }) }
    pub fn number() -> Self { Self::new(SchemaKind::Number) }
    pub fn boolean() -> Self { Self::new(SchemaKind::Boolean) }
    pub fn bigint() -> Self { Self::new(SchemaKind::BigInt) }
    pub fn null() -> Self { Self::new(SchemaKind::Null) }
    pub fn undefined() -> Self { Self::new(SchemaKind::Undefined) }
    pub fn date() -> Self { Self::new(SchemaKind::Date) }
    pub fn other(name: impl Into<String>) -> Self { Self::new(SchemaKind::Other(name.into())) }

    /// Object schema; properties not marked optional are listed in `required`.
    pub fn object<K, I>(properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        let properties: IndexMap<String, Schema> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        let required = properties.iter()
            .filter(|(_, p)| !p.optional)
            .map(|(k, _)| k.clone())
            .collect();
        Self::new(SchemaKind::Object(ObjectSchema {
            properties,
            required,
            additional_properties: false,
        }))
    }

    pub fn array(items: Schema) -> Self {
        Self::new(SchemaKind::Array { items: Box::new(items) })
    }

    pub fn union(any_of: impl IntoIterator<Item = Schema>) -> Self {
        Self::new(SchemaKind::Union { any_of: any_of.into_iter().collect() })
    }

    pub fn intersection(all_of: impl IntoIterator<Item = Schema>) -> Self {
        Self::new(SchemaKind::Intersection { all_of: all_of.into_iter().collect() })
    }

    /// A string carrying decimal digits for integers beyond the safe-number range.
    pub fn integer_string() -> Self {
        Self::union([Self::string().with_format("integer"), Self::number()])
    }

    /// The date-like union: a date object, or a value already formatted.
    pub fn date_like() -> Self {
        Self::union([
            Self::date(),
            Self::string().with_format("date-time"),
            Self::number(),
        ])
    }

    // -------------------------------- modifiers -------------------------------- //

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// `self | null`. A union gains the member in place, anything else is
    /// wrapped and the optional marker moves to the wrapper.
    pub fn nullable(self) -> Self {
        self.widen(Self::null())
    }

    /// `self | undefined`, flattened like [`Schema::nullable`].
    pub fn undefinable(self) -> Self {
        self.widen(Self::undefined())
    }

    fn widen(mut self, member: Schema) -> Self {
        if let SchemaKind::Union { any_of } = &mut self.kind {
            any_of.push(member);
            return self;
        }
        let optional = std::mem::take(&mut self.optional);
        let mut out = Self::union([self, member]);
        out.optional = optional;
        out
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_format(mut self, fmt: impl Into<String>) -> Self {
        if let SchemaKind::String { format } = &mut self.kind {
            *format = Some(fmt.into());
        }
        self
    }

    /// Only meaningful on objects: let values carry keys the schema does not declare.
    pub fn with_additional_properties(mut self) -> Self {
        if let SchemaKind::Object(object) = &mut self.kind {
            object.additional_properties = true;
        }
        self
    }

    // -------------------------------- queries ---------------------------------- //

    /// Object, or an intersection that merges into one.
    pub fn is_object_typed(&self) -> bool {
        match &self.kind {
            SchemaKind::Object(_) => true,
            SchemaKind::Intersection { all_of } => all_of.iter().any(Schema::is_object_typed),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &str {
        match &self.kind {
            SchemaKind::String { .. } => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::BigInt => "bigint",
            SchemaKind::Null => "null",
            SchemaKind::Undefined => "undefined",
            SchemaKind::Object(_) => "object",
            SchemaKind::Array { .. } => "array",
            SchemaKind::Union { .. } => "union",
            SchemaKind::Intersection { .. } => "intersection",
            SchemaKind::Date => "Date",
            SchemaKind::Other(name) => name,
        }
    }
}
