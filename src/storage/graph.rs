//! Association graph: directed weighted edges between memory ids.
//!
//! Held in memory with periodic persistence: the graph is flushed every N
//! edge writes (configurable) and on shutdown. Losing the most recent edges
//! is tolerable: auto-generated edges are rebuilt by re-running similarity
//! queries, and reconcile drops edges whose endpoints vanished.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Association, Direction};

/// Edge key: one edge per `(source, target, type)` triple.
type EdgeKey = (uuid::Uuid, uuid::Uuid, String);

#[derive(Debug, Serialize, Deserialize, Default)]
struct GraphFile {
    nodes: HashSet<uuid::Uuid>,
    edges: Vec<Association>,
}

struct GraphState {
    nodes: HashSet<uuid::Uuid>,
    edges: HashMap<EdgeKey, Association>,
    writes_since_flush: usize,
}

/// In-memory association graph with sidecar persistence.
pub struct AssociationGraph {
    state: RwLock<GraphState>,
    path: PathBuf,
    flush_every: usize,
}

impl AssociationGraph {
    /// Open (or create) the graph backed by `path`, flushing every
    /// `flush_every` edge writes.
    pub fn open(path: PathBuf, flush_every: usize) -> Self {
        let file = load_graph_file(&path);
        let edges = file
            .edges
            .into_iter()
            .map(|a| ((a.source_id, a.target_id, a.association_type.clone()), a))
            .collect();
        Self {
            state: RwLock::new(GraphState {
                nodes: file.nodes,
                edges,
                writes_since_flush: 0,
            }),
            path,
            flush_every: flush_every.max(1),
        }
    }

    /// Register a node. Idempotent.
    pub async fn add_node(&self, id: uuid::Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.nodes.insert(id);
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub async fn remove_node(&self, id: uuid::Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.nodes.remove(&id);
        let before = state.edges.len();
        state
            .edges
            .retain(|(src, dst, _), _| *src != id && *dst != id);
        let removed = before - state.edges.len();
        if removed > 0 {
            debug!(memory_id = %id, removed, "Removed node with incident edges");
        }
        self.flush_locked(&mut state, true);
        Ok(())
    }

    /// Insert an edge, replacing any prior edge with the same
    /// `(source, target, type)`. Endpoints are registered as nodes.
    pub async fn add_edge(
        &self,
        source_id: uuid::Uuid,
        target_id: uuid::Uuid,
        association_type: &str,
        strength: f32,
        auto_generated: bool,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.nodes.insert(source_id);
        state.nodes.insert(target_id);
        state.edges.insert(
            (source_id, target_id, association_type.to_string()),
            Association {
                source_id,
                target_id,
                association_type: association_type.to_string(),
                strength: strength.clamp(0.0, 1.0),
                auto_generated,
                created_at: Utc::now(),
            },
        );
        state.writes_since_flush += 1;
        let due = state.writes_since_flush >= self.flush_every;
        self.flush_locked(&mut state, due);
        Ok(())
    }

    /// Edges incident to `id`, filtered by direction and minimum strength,
    /// strongest first.
    pub async fn edges_of(
        &self,
        id: uuid::Uuid,
        direction: Direction,
        min_strength: f32,
    ) -> Vec<Association> {
        let state = self.state.read().await;
        let mut edges: Vec<Association> = state
            .edges
            .values()
            .filter(|a| match direction {
                Direction::Out => a.source_id == id,
                Direction::In => a.target_id == id,
                Direction::Both => a.source_id == id || a.target_id == id,
            })
            .filter(|a| a.strength >= min_strength)
            .cloned()
            .collect();
        edges.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        edges
    }

    /// Breadth-first neighbors of `id` up to `depth` hops (either edge
    /// direction), de-duplicated, excluding `id` itself.
    pub async fn neighbors(
        &self,
        id: uuid::Uuid,
        depth: usize,
        min_strength: f32,
    ) -> Vec<uuid::Uuid> {
        let state = self.state.read().await;
        let mut adjacency: HashMap<uuid::Uuid, Vec<uuid::Uuid>> = HashMap::new();
        for a in state.edges.values() {
            if a.strength < min_strength {
                continue;
            }
            adjacency.entry(a.source_id).or_default().push(a.target_id);
            adjacency.entry(a.target_id).or_default().push(a.source_id);
        }

        let mut visited: HashSet<uuid::Uuid> = HashSet::from([id]);
        let mut out = Vec::new();
        let mut queue: VecDeque<(uuid::Uuid, usize)> = VecDeque::from([(id, 0)]);
        while let Some((current, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            if let Some(next) = adjacency.get(&current) {
                let mut next = next.clone();
                next.sort();
                for n in next {
                    if visited.insert(n) {
                        out.push(n);
                        queue.push_back((n, dist + 1));
                    }
                }
            }
        }
        out
    }

    /// Drop all outgoing auto-generated edges of `id`. Returns the count.
    pub async fn remove_auto_edges_from(&self, id: uuid::Uuid) -> usize {
        let mut state = self.state.write().await;
        let before = state.edges.len();
        state
            .edges
            .retain(|(src, _, _), a| !(*src == id && a.auto_generated));
        let removed = before - state.edges.len();
        if removed > 0 {
            self.flush_locked(&mut state, true);
        }
        removed
    }

    /// Remove edges referencing ids outside `valid`. Used by reconcile.
    pub async fn prune_dangling(&self, valid: &HashSet<uuid::Uuid>) -> usize {
        let mut state = self.state.write().await;
        let before = state.edges.len();
        state
            .edges
            .retain(|(src, dst, _), _| valid.contains(src) && valid.contains(dst));
        state.nodes.retain(|n| valid.contains(n));
        let removed = before - state.edges.len();
        if removed > 0 {
            warn!(removed, "Pruned dangling association edges");
            self.flush_locked(&mut state, true);
        }
        removed
    }

    pub async fn contains_node(&self, id: uuid::Uuid) -> bool {
        self.state.read().await.nodes.contains(&id)
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    /// Force a flush to disk. Called on shutdown.
    pub async fn flush(&self) {
        let mut state = self.state.write().await;
        self.flush_locked(&mut state, true);
    }

    fn flush_locked(&self, state: &mut GraphState, due: bool) {
        if !due {
            return;
        }
        state.writes_since_flush = 0;
        let file = GraphFile {
            nodes: state.nodes.clone(),
            edges: state.edges.values().cloned().collect(),
        };
        save_graph_file(&self.path, &file);
    }
}

fn load_graph_file(path: &Path) -> GraphFile {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Failed to parse graph store at {}: {}", path.display(), e);
            GraphFile::default()
        }),
        Err(_) => GraphFile::default(),
    }
}

fn save_graph_file(path: &Path, file: &GraphFile) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create graph store directory: {}", e);
            return;
        }
    }
    match serde_json::to_string(file) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to write graph store to {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("Failed to serialize graph store: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_graph() -> (tempfile::TempDir, AssociationGraph) {
        let dir = tempfile::TempDir::new().unwrap();
        let graph = AssociationGraph::open(dir.path().join("graph.json"), 1);
        (dir, graph)
    }

    #[tokio::test]
    async fn test_add_node_idempotent() {
        let (_dir, graph) = temp_graph();
        let id = uuid::Uuid::new_v4();
        graph.add_node(id).await.unwrap();
        graph.add_node(id).await.unwrap();
        assert_eq!(graph.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_edge_replaces_same_triple() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.7, true).await.unwrap();
        graph.add_edge(a, b, "semantic", 0.9, true).await.unwrap();
        assert_eq!(graph.edge_count().await, 1);
        let edges = graph.edges_of(a, Direction::Out, 0.0).await;
        assert!((edges[0].strength - 0.9).abs() < 1e-6, "newer edge replaces");
        // A different type is a distinct edge
        graph.add_edge(a, b, "manual", 0.5, false).await.unwrap();
        assert_eq!(graph.edge_count().await, 2);
    }

    #[tokio::test]
    async fn test_strength_clamped() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 1.5, true).await.unwrap();
        let edges = graph.edges_of(a, Direction::Out, 0.0).await;
        assert_eq!(edges[0].strength, 1.0);
    }

    #[tokio::test]
    async fn test_edges_of_directions() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let c = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.8, true).await.unwrap();
        graph.add_edge(c, a, "semantic", 0.6, true).await.unwrap();

        assert_eq!(graph.edges_of(a, Direction::Out, 0.0).await.len(), 1);
        assert_eq!(graph.edges_of(a, Direction::In, 0.0).await.len(), 1);
        assert_eq!(graph.edges_of(a, Direction::Both, 0.0).await.len(), 2);
        // min_strength filters
        assert_eq!(graph.edges_of(a, Direction::Both, 0.7).await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_node_cascades_edges() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let c = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.8, true).await.unwrap();
        graph.add_edge(b, c, "semantic", 0.8, true).await.unwrap();
        graph.remove_node(b).await.unwrap();
        assert_eq!(graph.edge_count().await, 0, "all incident edges removed");
        assert!(!graph.contains_node(b).await);
        assert_eq!(graph.edges_of(a, Direction::Both, 0.0).await.len(), 0);
    }

    #[tokio::test]
    async fn test_neighbors_bfs_depth() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let c = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.9, true).await.unwrap();
        graph.add_edge(b, c, "semantic", 0.9, true).await.unwrap();

        let one_hop = graph.neighbors(a, 1, 0.0).await;
        assert_eq!(one_hop, vec![b]);
        let two_hop = graph.neighbors(a, 2, 0.0).await;
        assert_eq!(two_hop.len(), 2);
        assert!(two_hop.contains(&b) && two_hop.contains(&c));
        // Source is never its own neighbor
        assert!(!two_hop.contains(&a));
    }

    #[tokio::test]
    async fn test_remove_auto_edges_keeps_manual() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let c = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.8, true).await.unwrap();
        graph.add_edge(a, c, "reference", 0.5, false).await.unwrap();
        graph.add_edge(b, a, "semantic", 0.8, true).await.unwrap();

        let removed = graph.remove_auto_edges_from(a).await;
        assert_eq!(removed, 1, "only outgoing auto edges removed");
        assert_eq!(graph.edges_of(a, Direction::Out, 0.0).await.len(), 1);
        assert_eq!(graph.edges_of(a, Direction::In, 0.0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_dangling() {
        let (_dir, graph) = temp_graph();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let ghost = uuid::Uuid::new_v4();
        graph.add_edge(a, b, "semantic", 0.8, true).await.unwrap();
        graph.add_edge(a, ghost, "semantic", 0.8, true).await.unwrap();

        let valid: HashSet<uuid::Uuid> = [a, b].into_iter().collect();
        let removed = graph.prune_dangling(&valid).await;
        assert_eq!(removed, 1);
        assert_eq!(graph.edge_count().await, 1);
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        {
            let graph = AssociationGraph::open(path.clone(), 1);
            graph.add_edge(a, b, "semantic", 0.75, true).await.unwrap();
            graph.flush().await;
        }
        let reopened = AssociationGraph::open(path, 1);
        assert_eq!(reopened.edge_count().await, 1);
        let edges = reopened.edges_of(a, Direction::Out, 0.0).await;
        assert_eq!(edges[0].target_id, b);
        assert!((edges[0].strength - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_deferred_flush_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let graph = AssociationGraph::open(path.clone(), 10);
        graph
            .add_edge(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), "semantic", 0.5, true)
            .await
            .unwrap();
        // One write with flush_every=10: nothing on disk yet
        assert!(!path.exists(), "flush should be deferred");
        graph.flush().await;
        assert!(path.exists(), "explicit flush must persist");
    }
}
