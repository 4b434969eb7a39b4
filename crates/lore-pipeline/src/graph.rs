//! A small directed graph of stages with conditional edges.
//!
//! Graphs are assembled with [`StageGraphBuilder`] and validated once by
//! [`StageGraphBuilder::compile`]; a compiled [`StageGraph`] is immutable and
//! can be shared between concurrent runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use lore_core::error::{LoreError, Result};
use lore_core::state::{Mode, PipelineState};

use crate::stage::{Stage, StageId};

/// Chooses a branch from the current state. Must be pure.
pub type BranchFn = fn(&PipelineState) -> Mode;

enum Transition {
    Next(StageId),
    Branch {
        selector: BranchFn,
        routes: HashMap<Mode, StageId>,
    },
    Finish,
}

#[derive(Default)]
pub struct StageGraphBuilder {
    entry: Option<StageId>,
    stages: HashMap<StageId, Arc<dyn Stage>>,
    transitions: HashMap<StageId, Transition>,
    problems: Vec<String>,
}

impl StageGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        let id = stage.id();
        if self.stages.insert(id, stage).is_some() {
            self.problems.push(format!("stage {id} registered twice"));
        }
        self
    }

    pub fn set_entry(mut self, id: StageId) -> Self {
        self.entry = Some(id);
        self
    }

    pub fn add_edge(self, from: StageId, to: StageId) -> Self {
        self.transition(from, Transition::Next(to))
    }

    pub fn add_branch(
        self,
        from: StageId,
        selector: BranchFn,
        routes: impl IntoIterator<Item = (Mode, StageId)>,
    ) -> Self {
        let routes = routes.into_iter().collect();
        self.transition(from, Transition::Branch { selector, routes })
    }

    pub fn add_finish(self, from: StageId) -> Self {
        self.transition(from, Transition::Finish)
    }

    fn transition(mut self, from: StageId, transition: Transition) -> Self {
        if self.transitions.insert(from, transition).is_some() {
            self.problems.push(format!("stage {from} has more than one outgoing transition"));
        }
        self
    }

    pub fn compile(self) -> Result<StageGraph> {
        let mut problems = self.problems;

        let entry = match self.entry {
            Some(entry) => entry,
            None => {
                problems.push("no entry stage".to_string());
                StageId::QueryAnalyzer
            }
        };
        if !self.stages.contains_key(&entry) {
            problems.push(format!("entry stage {entry} is not registered"));
        }

        let mut ids: Vec<&StageId> = self.stages.keys().collect();
        ids.sort();
        for id in ids {
            if !self.transitions.contains_key(id) {
                problems.push(format!("stage {id} has no outgoing transition"));
            }
        }

        for (from, transition) in &self.transitions {
            if !self.stages.contains_key(from) {
                problems.push(format!("transition from unregistered stage {from}"));
            }
            match transition {
                Transition::Next(to) if !self.stages.contains_key(to) => {
                    problems.push(format!("edge {from} -> {to} targets an unregistered stage"));
                }
                Transition::Branch { routes, .. } => {
                    for mode in Mode::ALL {
                        match routes.get(&mode) {
                            None => problems.push(format!("branch at {from} has no route for mode {mode}")),
                            Some(to) if !self.stages.contains_key(to) => problems
                                .push(format!("branch {from} -[{mode}]-> {to} targets an unregistered stage")),
                            Some(_) => {}
                        }
                    }
                }
                _ => {}
            }
        }

        if !problems.is_empty() {
            return Err(LoreError::Config(format!(
                "invalid stage graph: {}",
                problems.join("; ")
            )));
        }

        let graph = StageGraph {
            entry,
            stages: self.stages,
            transitions: self.transitions,
        };

        // Every mode must reach a finish without revisiting a stage.
        for mode in Mode::ALL {
            graph.execution_order(mode)?;
        }

        Ok(graph)
    }
}

pub struct StageGraph {
    entry: StageId,
    stages: HashMap<StageId, Arc<dyn Stage>>,
    transitions: HashMap<StageId, Transition>,
}

impl StageGraph {
    pub fn entry(&self) -> StageId {
        self.entry
    }

    fn next(&self, from: StageId, state: &PipelineState) -> Result<Option<StageId>> {
        match self.transitions.get(&from) {
            Some(Transition::Next(to)) => Ok(Some(*to)),
            Some(Transition::Finish) => Ok(None),
            Some(Transition::Branch { selector, routes }) => {
                let key = selector(state);
                routes.get(&key).copied().map(Some).ok_or_else(|| {
                    LoreError::Config(format!("branch at {from} has no route for mode {key}"))
                })
            }
            None => Err(LoreError::Config(format!("stage {from} has no outgoing transition"))),
        }
    }

    /// The stages a run in `mode` visits, in order.
    pub fn execution_order(&self, mode: Mode) -> Result<Vec<StageId>> {
        let sample = PipelineState::new(mode);
        let mut order = Vec::new();
        let mut current = Some(self.entry);

        while let Some(id) = current {
            if order.contains(&id) {
                return Err(LoreError::Config(format!(
                    "stage graph revisits {id} in {mode} mode"
                )));
            }
            order.push(id);
            current = self.next(id, &sample)?;
        }

        Ok(order)
    }

    /// Run every stage on the path for `state.mode`, once each, in order.
    /// The first stage error aborts the run.
    #[instrument(name = "pipeline", skip_all, fields(run_id = %state.run_id, mode = %state.mode))]
    pub async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let mode = state.mode;
        let started = Instant::now();
        let mut visited = HashSet::new();
        let mut current = Some(self.entry);

        info!("Pipeline run started");

        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(LoreError::Internal(format!("stage {id} re-entered")));
            }

            let stage = self
                .stages
                .get(&id)
                .ok_or_else(|| LoreError::Config(format!("stage {id} is not registered")))?;

            let stage_started = Instant::now();
            state = stage.run(state).await.map_err(|e| {
                tracing::error!(stage = %id, error = %e, "Stage failed, aborting run");
                LoreError::Stage {
                    stage: id.to_string(),
                    message: e.to_string(),
                }
            })?;
            state.check_invariants(mode)?;

            debug!(
                stage = %id,
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                entities = state.entities.len(),
                "Stage finished"
            );

            current = self.next(id, &state)?;
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            stages = visited.len(),
            "Pipeline run finished"
        );

        Ok(state)
    }
}
