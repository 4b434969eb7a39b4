use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Properties = Map<String, Value>;

/// Property key holding the provenance labels of an entity.
pub const SOURCES_KEY: &str = "sources";

/// Relationship type used when the model leaves one out.
pub const DEFAULT_RELATION_TYPE: &str = "related_to";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
}

impl ResolvedEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a provenance label to `sources`, keeping the list free of
    /// duplicates. Returns `true` when the label was not there yet.
    pub fn add_source(&mut self, source: &str) -> bool {
        let entry = self
            .properties
            .entry(SOURCES_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        // A bare string left by an earlier writer becomes a one-element list.
        if let Value::String(existing) = entry {
            let existing = std::mem::take(existing);
            *entry = Value::Array(vec![Value::String(existing)]);
        }

        match entry {
            Value::Array(list) => {
                if list.iter().any(|v| v.as_str() == Some(source)) {
                    false
                } else {
                    list.push(Value::String(source.to_string()));
                    true
                }
            }
            _ => false,
        }
    }

    pub fn sources(&self) -> Vec<&str> {
        self.properties
            .get(SOURCES_KEY)
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub start: String,
    pub end: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl RelationshipRecord {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            relation_type: relation_type.into(),
            properties: Properties::new(),
        }
    }

    pub fn has_endpoints(&self) -> bool {
        !self.start.trim().is_empty() && !self.end.trim().is_empty()
    }
}

/// One edge returned by a traversal, with the properties of both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEdge {
    pub source: String,
    pub relationship: String,
    pub target: String,
    #[serde(default)]
    pub source_properties: Properties,
    #[serde(default)]
    pub target_properties: Properties,
    #[serde(default)]
    pub relationship_properties: Properties,
}

impl ContextEdge {
    pub fn new(
        source: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relationship: relationship.into(),
            target: target.into(),
            source_properties: Properties::new(),
            target_properties: Properties::new(),
            relationship_properties: Properties::new(),
        }
    }

    /// `source -[type]-> target | source_props={..} target_props={..}`
    pub fn render(&self) -> String {
        let mut line = format!(
            "{} -[{}]-> {} | source_props={} target_props={}",
            self.source,
            self.relationship,
            self.target,
            Value::Object(self.source_properties.clone()),
            Value::Object(self.target_properties.clone()),
        );
        if !self.relationship_properties.is_empty() {
            line.push_str(&format!(
                " rel_props={}",
                Value::Object(self.relationship_properties.clone())
            ));
        }
        line
    }

    /// Both endpoints' properties as `"<source> -> <target>"`.
    pub fn summary(&self) -> String {
        format!(
            "{} -> {}",
            Value::Object(self.source_properties.clone()),
            Value::Object(self.target_properties.clone())
        )
    }
}
