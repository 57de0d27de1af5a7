//! Deterministic workflow graph layout.
//!
//! Assigns each step `(x, y) = (80 + layer·200, 80 + node·150)` from the DAG
//! layers, so rendering needs no third-party layout engine and is stable
//! across runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::dag::{Dag, DagError};
use super::definition::WorkflowDefinition;

const LAYER_SPACING: f64 = 200.0;
const NODE_SPACING: f64 = 150.0;
const ORIGIN: f64 = 80.0;

/// A positioned node in the rendered graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Step ID.
    pub id: String,
    /// Display name (falls back to the ID).
    pub name: String,
    /// Step action.
    pub action: String,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Optional execution status overlay.
    pub status: Option<String>,
}

/// An edge from a dependency to its dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Edge identifier.
    pub id: String,
    /// Source step.
    pub source: String,
    /// Target step.
    pub target: String,
}

/// Generate the graph structure (nodes, edges, layout metadata) for a
/// workflow, optionally overlaying per-step execution status.
pub fn generate_workflow_graph(
    definition: &WorkflowDefinition,
    execution_status: &HashMap<String, String>,
) -> Result<Value, DagError> {
    let dag = Dag::from_steps(&definition.steps)?;
    let groups = dag.parallel_groups()?;

    let step_map: HashMap<&str, &super::definition::WorkflowStep> = definition
        .steps
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect();

    let mut nodes: Vec<GraphNode> = Vec::with_capacity(definition.steps.len());
    for (layer_index, group) in groups.iter().enumerate() {
        let x = ORIGIN + layer_index as f64 * LAYER_SPACING;
        for (node_index, step_id) in group.iter().enumerate() {
            let step = step_map[step_id.as_str()];
            nodes.push(GraphNode {
                id: step.id.clone(),
                name: step.name.clone().unwrap_or_else(|| step.id.clone()),
                action: serde_json::to_value(step.action)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
                x,
                y: ORIGIN + node_index as f64 * NODE_SPACING,
                status: execution_status.get(step_id).cloned(),
            });
        }
    }

    let edges: Vec<GraphEdge> = definition
        .steps
        .iter()
        .flat_map(|step| {
            step.depends_on.iter().map(|dep| GraphEdge {
                id: format!("edge-{dep}-{}", step.id),
                source: dep.clone(),
                target: step.id.clone(),
            })
        })
        .collect();

    let max_x = nodes.iter().map(|n| n.x).fold(0.0, f64::max);
    let max_y = nodes.iter().map(|n| n.y).fold(0.0, f64::max);

    Ok(json!({
        "workflow_id": definition.name,
        "workflow_version": definition.version,
        "nodes": nodes,
        "edges": edges,
        "layout": {
            "type": "layered",
            "width": max_x + LAYER_SPACING,
            "height": max_y + LAYER_SPACING,
            "layer_spacing": LAYER_SPACING,
            "node_spacing": NODE_SPACING,
        },
        "metadata": {
            "step_count": definition.steps.len(),
            "execution_mode": definition.execution.mode,
        },
    }))
}
