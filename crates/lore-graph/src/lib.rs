mod properties;
mod store;

pub use properties::{flatten_properties, to_property_value, PropertyValue};
pub use store::Neo4jGraphStore;
