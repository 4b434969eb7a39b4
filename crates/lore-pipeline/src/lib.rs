pub mod graph;
pub mod json;
pub mod orchestrator;
pub mod stage;
pub mod stages;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use graph::{BranchFn, StageGraph, StageGraphBuilder};
pub use json::{parse_json_object, Recovery};
pub use orchestrator::{route_by_mode, Gateways, Orchestrator};
pub use stage::{Stage, StageId};
