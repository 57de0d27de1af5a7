//! Dependency graph over workflow steps.
//!
//! Edges run from a step to its dependents. Both public operations are
//! deterministic: topological order always picks the alphabetically first
//! ready step, and parallel groups emit each layer sorted.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::definition::WorkflowStep;

/// Errors from DAG construction and traversal.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// The graph contains at least one cycle.
    #[error("cycle detected among steps: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
    /// A dependency references a step that does not exist.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        /// The dependent step.
        step: String,
        /// The missing upstream step.
        dependency: String,
    },
}

/// A built dependency graph.
#[derive(Debug, Clone)]
pub struct Dag {
    /// Step ID → its dependencies.
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Step ID → its dependents.
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl Dag {
    /// Build a DAG from a step list.
    pub fn from_steps(steps: &[WorkflowStep]) -> Result<Self, DagError> {
        let ids: BTreeSet<String> = steps.iter().map(|s| s.id.clone()).collect();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for step in steps {
            dependencies.entry(step.id.clone()).or_default();
            dependents.entry(step.id.clone()).or_default();
        }
        for step in steps {
            for dep in &step.depends_on {
                if !ids.contains(dep) {
                    return Err(DagError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependencies
                    .get_mut(&step.id)
                    .expect("entry created above")
                    .insert(dep.clone());
                dependents
                    .get_mut(dep)
                    .expect("entry created above")
                    .insert(step.id.clone());
            }
        }

        Ok(Self {
            dependencies,
            dependents,
        })
    }

    /// Number of steps in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Deterministic linear ordering: repeatedly take the alphabetically
    /// first step with zero remaining in-degree.
    pub fn topological_order(&self) -> Result<Vec<String>, DagError> {
        let mut in_degree: HashMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(self.len());

        while order.len() < self.len() {
            // BTreeMap iteration order makes this pick alphabetical.
            let next = self
                .dependencies
                .keys()
                .find(|id| in_degree.get(id.as_str()) == Some(&0));

            let Some(next) = next.cloned() else {
                let remaining: Vec<String> = self
                    .dependencies
                    .keys()
                    .filter(|id| in_degree.contains_key(id.as_str()))
                    .cloned()
                    .collect();
                return Err(DagError::CycleDetected(remaining));
            };

            in_degree.remove(next.as_str());
            if let Some(successors) = self.dependents.get(&next) {
                for successor in successors {
                    if let Some(degree) = in_degree.get_mut(successor.as_str()) {
                        *degree -= 1;
                    }
                }
            }
            order.push(next);
        }

        Ok(order)
    }

    /// Dependency layers: layer 0 holds all steps with no dependencies;
    /// layer k+1 holds steps whose whole dependency set is in layers 0..=k.
    pub fn parallel_groups(&self) -> Result<Vec<Vec<String>>, DagError> {
        let mut emitted: BTreeSet<&str> = BTreeSet::new();
        let mut layers: Vec<Vec<String>> = Vec::new();

        while emitted.len() < self.len() {
            let layer: Vec<String> = self
                .dependencies
                .iter()
                .filter(|(id, _)| !emitted.contains(id.as_str()))
                .filter(|(_, deps)| deps.iter().all(|d| emitted.contains(d.as_str())))
                .map(|(id, _)| id.clone())
                .collect();

            if layer.is_empty() {
                let remaining: Vec<String> = self
                    .dependencies
                    .keys()
                    .filter(|id| !emitted.contains(id.as_str()))
                    .cloned()
                    .collect();
                return Err(DagError::CycleDetected(remaining));
            }

            for id in &layer {
                emitted.insert(self.dependency_key(id));
            }
            layers.push(layer);
        }

        Ok(layers)
    }

    // Borrow the canonical key string owned by the map, so `emitted` can
    // hold references across iterations.
    fn dependency_key(&self, id: &str) -> &str {
        self.dependencies
            .get_key_value(id)
            .map(|(k, _)| k.as_str())
            .expect("id taken from the map")
    }
}
