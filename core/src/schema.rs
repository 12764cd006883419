use serde_json::{Map, Value};

/// The accepted shape of a single tool argument.
///
/// One tree serves both argument validation and the discovery document
/// returned by `tools/list`, so the two views cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    Array(Box<FieldKind>),
    Object(ArgumentSchema),
    /// A closed set of string literals.
    Enum(Vec<String>),
    /// Any one of the listed alternatives, tried in declaration order.
    Union(Vec<FieldKind>),
    /// Accepts `null` in addition to the inner kind.
    Nullable(Box<FieldKind>),
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    Date,
}

impl FieldKind {
    pub fn integer() -> Self {
        FieldKind::Integer {
            min: None,
            max: None,
        }
    }

    pub fn integer_range(min: i64, max: i64) -> Self {
        FieldKind::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn number() -> Self {
        FieldKind::Number {
            min: None,
            max: None,
        }
    }

    pub fn array(items: FieldKind) -> Self {
        FieldKind::Array(Box::new(items))
    }

    pub fn object(schema: ArgumentSchema) -> Self {
        FieldKind::Object(schema)
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn union(alternatives: Vec<FieldKind>) -> Self {
        FieldKind::Union(alternatives)
    }

    pub fn nullable(inner: FieldKind) -> Self {
        FieldKind::Nullable(Box::new(inner))
    }

    /// Short human name used in validation messages.
    pub(crate) fn label(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Integer { .. } => "integer".to_string(),
            FieldKind::Number { .. } => "number".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Array(items) => format!("array of {}", items.label()),
            FieldKind::Object(_) => "object".to_string(),
            FieldKind::Enum(values) => format!("one of [{}]", values.join(", ")),
            FieldKind::Union(alternatives) => alternatives
                .iter()
                .map(FieldKind::label)
                .collect::<Vec<_>>()
                .join(" | "),
            FieldKind::Nullable(inner) => format!("{} or null", inner.label()),
            FieldKind::Date => "date (YYYY-MM-DD)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub description: Option<String>,
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            optional: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Ordered set of named fields accepted by a tool (or by a nested object).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSchema {
    fields: Vec<Field>,
}

impl ArgumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn required(
        self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
    ) -> Self {
        self.field(Field::new(name, kind).describe(description))
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
    ) -> Self {
        self.field(Field::new(name, kind).describe(description).optional())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Names of fields not marked optional, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| !field.optional)
            .map(|field| field.name.as_str())
            .collect()
    }

    /// Translate the tree into the JSON Schema document advertised to callers.
    pub fn to_json_schema(&self) -> Value {
        object_document(self, None)
    }
}

fn object_document(schema: &ArgumentSchema, description: Option<&str>) -> Value {
    let mut properties = Map::new();
    for field in &schema.fields {
        properties.insert(
            field.name.clone(),
            kind_document(&field.kind, field.description.as_deref()),
        );
    }

    let mut doc = Map::new();
    doc.insert("type".to_string(), Value::from("object"));
    doc.insert("properties".to_string(), Value::Object(properties));
    let required = schema.required_names();
    if !required.is_empty() {
        doc.insert(
            "required".to_string(),
            Value::Array(required.into_iter().map(Value::from).collect()),
        );
    }
    attach_description(&mut doc, description);
    Value::Object(doc)
}

fn kind_document(kind: &FieldKind, description: Option<&str>) -> Value {
    match kind {
        // Optionality and nullability belong to the parent's `required` list.
        FieldKind::Nullable(inner) => kind_document(inner, description),
        FieldKind::Union(alternatives) => {
            let mut doc = Map::new();
            doc.insert(
                "oneOf".to_string(),
                Value::Array(
                    alternatives
                        .iter()
                        .map(|alternative| kind_document(alternative, None))
                        .collect(),
                ),
            );
            attach_description(&mut doc, description);
            Value::Object(doc)
        }
        FieldKind::Enum(values) => {
            let mut doc = typed("string");
            doc.insert(
                "enum".to_string(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
            attach_description(&mut doc, description);
            Value::Object(doc)
        }
        FieldKind::String => described("string", description),
        FieldKind::Boolean => described("boolean", description),
        FieldKind::Integer { min, max } => {
            let mut doc = typed("integer");
            if let Some(min) = min {
                doc.insert("minimum".to_string(), Value::from(*min));
            }
            if let Some(max) = max {
                doc.insert("maximum".to_string(), Value::from(*max));
            }
            attach_description(&mut doc, description);
            Value::Object(doc)
        }
        FieldKind::Number { min, max } => {
            let mut doc = typed("number");
            if let Some(min) = min {
                doc.insert("minimum".to_string(), Value::from(*min));
            }
            if let Some(max) = max {
                doc.insert("maximum".to_string(), Value::from(*max));
            }
            attach_description(&mut doc, description);
            Value::Object(doc)
        }
        FieldKind::Array(items) => {
            let mut doc = typed("array");
            doc.insert("items".to_string(), kind_document(items, None));
            attach_description(&mut doc, description);
            Value::Object(doc)
        }
        FieldKind::Object(schema) => object_document(schema, description),
        // No dedicated rule: permissive string fallback.
        FieldKind::Date => described("string", description),
    }
}

fn typed(kind: &str) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("type".to_string(), Value::from(kind));
    doc
}

fn described(kind: &str, description: Option<&str>) -> Value {
    let mut doc = typed(kind);
    attach_description(&mut doc, description);
    Value::Object(doc)
}

fn attach_description(doc: &mut Map<String, Value>, description: Option<&str>) {
    if let Some(description) = description {
        doc.insert("description".to_string(), Value::from(description));
    }
}
