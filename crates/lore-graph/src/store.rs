use std::collections::{HashMap, HashSet};
use std::future::Future;

use async_trait::async_trait;
use neo4rs::{query, BoltType, ConfigBuilder, Graph};

use lore_core::config::AppConfig;
use lore_core::entity::{ContextEdge, Properties, RelationshipRecord, ResolvedEntity, SOURCES_KEY};
use lore_core::error::{LoreError, Result};
use lore_core::graph::{GraphStore, TRAVERSAL_LIMIT};

use crate::properties::{flatten_properties, PropertyValue};

/// Timeout for all Neo4j operations (seconds).
const NEO4J_TIMEOUT_SECS: u64 = 5;

const UPSERT_ENTITY: &str = "\
    MERGE (n:Entity {name: $name}) \
    SET n += $props \
    WITH n \
    FOREACH (_ IN CASE WHEN size($sources) > 0 THEN [1] ELSE [] END | \
      SET n.sources = coalesce(n.sources, []) + \
        [s IN $sources WHERE NOT s IN coalesce(n.sources, [])])";

const UPSERT_RELATIONSHIP: &str = "\
    MATCH (a:Entity {name: $start}), (b:Entity {name: $end}) \
    MERGE (a)-[r:RELATED {type: $type}]->(b) \
    SET r += $props";

const INCIDENT_EDGES: &str = "\
    MATCH (e:Entity)-[r]->(target) \
    WHERE e.name IN $names OR target.name IN $names \
    RETURN e.name AS source, coalesce(r.type, type(r)) AS rel_type, target.name AS target, \
           properties(r) AS rel_props, properties(e) AS source_props, \
           properties(target) AS target_props \
    LIMIT $limit";

pub struct Neo4jGraphStore {
    graph: Option<Graph>,
}

impl Neo4jGraphStore {
    /// Connect to Neo4j. A failed connection leaves the store in degraded
    /// mode where every call returns a graph error.
    pub async fn new(config: &AppConfig) -> Self {
        match Self::connect(config).await {
            Ok(graph) => {
                tracing::info!(uri = %config.neo4j_uri, database = %config.neo4j_database, "Connected to Neo4j");
                Self { graph: Some(graph) }
            }
            Err(e) => {
                tracing::warn!(uri = %config.neo4j_uri, error = %e, "Failed to connect to Neo4j, running in degraded mode");
                Self { graph: None }
            }
        }
    }

    async fn connect(config: &AppConfig) -> Result<Graph> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.neo4j_uri.as_str())
            .user(config.neo4j_user.as_str())
            .password(config.neo4j_password.as_str())
            .db(config.neo4j_database.as_str())
            .build()
            .map_err(|e| LoreError::Config(format!("Invalid Neo4j configuration: {e}")))?;

        timed(Graph::connect(neo4j_config))
            .await?
            .map_err(|e| LoreError::Graph(format!("Failed to connect: {e}")))
    }

    fn graph(&self) -> Result<&Graph> {
        self.graph.as_ref().ok_or_else(|| LoreError::Graph("Neo4j not connected".into()))
    }

    pub fn is_connected(&self) -> bool {
        self.graph.is_some()
    }

    async fn count(&self, cypher: &str, what: &str) -> Result<u64> {
        let mut stream = timed(self.graph()?.execute(query(cypher)))
            .await?
            .map_err(|e| LoreError::Graph(format!("Failed to count {what}: {e}")))?;

        match stream.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get("cnt")
                    .map_err(|e| LoreError::Graph(format!("Failed to get count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(LoreError::Graph(format!("Error counting {what}: {e}"))),
        }
    }
}

/// Wrap any async operation with a timeout, converting timeout to LoreError::Graph.
async fn timed<T, F: Future<Output = T>>(op: F) -> Result<T> {
    tokio::time::timeout(std::time::Duration::from_secs(NEO4J_TIMEOUT_SECS), op)
        .await
        .map_err(|_| {
            tracing::warn!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS);
            LoreError::Graph(format!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS))
        })
}

fn props_param(props: Vec<(String, PropertyValue)>) -> BoltType {
    let map: HashMap<String, BoltType> = props
        .into_iter()
        .map(|(key, value)| (key, value.into()))
        .collect();
    map.into()
}

fn entity_sources(entity: &ResolvedEntity) -> Vec<String> {
    entity.sources().into_iter().map(str::to_string).collect()
}

fn json_to_properties(value: serde_json::Value) -> Properties {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Properties::new(),
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn write(
        &self,
        entities: &[ResolvedEntity],
        relationships: &[RelationshipRecord],
    ) -> Result<()> {
        let mut txn = timed(self.graph()?.start_txn())
            .await?
            .map_err(|e| LoreError::Graph(format!("Failed to start transaction: {e}")))?;

        for entity in entities {
            let props = flatten_properties(&entity.properties, &["name", SOURCES_KEY]);
            let q = query(UPSERT_ENTITY)
                .param("name", entity.name.clone())
                .param("props", props_param(props))
                .param("sources", entity_sources(entity));

            txn.run(q)
                .await
                .map_err(|e| LoreError::Graph(format!("Failed to store entity {}: {e}", entity.name)))?;

            tracing::debug!(entity_name = %entity.name, "Stored entity");
        }

        let mut written = 0usize;
        for rel in relationships {
            if !rel.has_endpoints() {
                tracing::debug!(rel_type = %rel.relation_type, "Skipping relationship without start or end");
                continue;
            }

            let props = flatten_properties(&rel.properties, &["type"]);
            let q = query(UPSERT_RELATIONSHIP)
                .param("start", rel.start.clone())
                .param("end", rel.end.clone())
                .param("type", rel.relation_type.clone())
                .param("props", props_param(props));

            txn.run(q).await.map_err(|e| {
                LoreError::Graph(format!(
                    "Failed to store relationship {} -[{}]-> {}: {e}",
                    rel.start, rel.relation_type, rel.end
                ))
            })?;
            written += 1;

            tracing::debug!(
                start = %rel.start,
                end = %rel.end,
                rel_type = %rel.relation_type,
                "Stored relationship"
            );
        }

        txn.commit()
            .await
            .map_err(|e| LoreError::Graph(format!("Failed to commit transaction: {e}")))?;

        tracing::info!(
            entities = entities.len(),
            relationships = written,
            "Wrote entities to graph"
        );

        Ok(())
    }

    async fn query(&self, names: &[String]) -> Result<Vec<ContextEdge>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let q = query(INCIDENT_EDGES)
            .param("names", names.to_vec())
            .param("limit", TRAVERSAL_LIMIT as i64);

        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| LoreError::Graph(format!("Failed to query graph: {e}")))?;

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let row = match stream.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(LoreError::Graph(format!("Error reading traversal rows: {e}"))),
            };

            let source: String = match row.get("source") {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping edge with unnamed source");
                    continue;
                }
            };
            let target: String = row.get("target").unwrap_or_default();
            let relationship: String = row.get("rel_type").unwrap_or_default();

            let mut relationship_properties =
                json_to_properties(row.get("rel_props").unwrap_or_default());
            relationship_properties.remove("type");

            if !seen.insert((source.clone(), relationship.clone(), target.clone())) {
                continue;
            }

            edges.push(ContextEdge {
                source,
                relationship,
                target,
                source_properties: json_to_properties(row.get("source_props").unwrap_or_default()),
                target_properties: json_to_properties(row.get("target_props").unwrap_or_default()),
                relationship_properties,
            });
        }

        tracing::debug!(names = names.len(), edges = edges.len(), "Traversal query completed");

        Ok(edges)
    }

    async fn entity_count(&self) -> Result<u64> {
        self.count("MATCH (n:Entity) RETURN count(n) AS cnt", "entities").await
    }

    async fn relationship_count(&self) -> Result<u64> {
        self.count("MATCH (:Entity)-[r]->() RETURN count(r) AS cnt", "relationships")
            .await
    }
}
