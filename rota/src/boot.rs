// Dependency-ordered initialization of stateful subsystems

use crate::errors::InitError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// A subsystem that must run its startup routine before the process is
/// ready. Dependencies are declared by component name; the bootstrapper
/// orders initialization so every component runs after all of its
/// dependencies.
#[async_trait]
pub trait Initializable: Send + Sync {
    /// Stable name, also used in other components' dependency declarations.
    fn name(&self) -> &str;

    /// Names of components that must initialize before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn initialize(&self) -> anyhow::Result<()>;
}

/// Produces a linear initialization order for an explicit edge set, where
/// each key maps a component to the components it depends on.
///
/// Depth-first post-order with a visited set: every component appears after
/// all of its dependencies, and components without dependencies keep no
/// particular relative order. A dependency cycle is a configuration error.
pub fn resolution_order(edges: &HashMap<String, Vec<String>>) -> Result<Vec<String>, InitError> {
    let mut order = Vec::with_capacity(edges.len());
    let mut visited = HashSet::new();
    let mut in_progress = Vec::new();
    for component in edges.keys() {
        visit(component, edges, &mut visited, &mut in_progress, &mut order)?;
    }
    Ok(order)
}

fn visit(
    component: &str,
    edges: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    in_progress: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<(), InitError> {
    if visited.contains(component) {
        return Ok(());
    }
    if in_progress.iter().any(|c| c == component) {
        let mut path = in_progress.clone();
        path.push(component.to_string());
        return Err(InitError::DependencyCycle {
            path: path.join(" -> "),
        });
    }
    let Some(dependencies) = edges.get(component) else {
        return Err(InitError::UnknownDependency {
            component: in_progress.last().cloned().unwrap_or_default(),
            dependency: component.to_string(),
        });
    };
    in_progress.push(component.to_string());
    for dependency in dependencies {
        visit(dependency, edges, visited, in_progress, order)?;
    }
    in_progress.pop();
    visited.insert(component.to_string());
    order.push(component.to_string());
    Ok(())
}

/// Collects initializable components and runs their startup routines
/// strictly sequentially in dependency order. Any failure is fatal.
#[derive(Default)]
pub struct Bootstrapper {
    components: Vec<Arc<dyn Initializable>>,
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, component: Arc<dyn Initializable>) -> Self {
        self.components.push(component);
        self
    }

    pub async fn initialize_all(&self) -> Result<(), InitError> {
        let mut edges = HashMap::new();
        for component in &self.components {
            if edges
                .insert(component.name().to_string(), component.dependencies())
                .is_some()
            {
                return Err(InitError::DuplicateComponent(component.name().to_string()));
            }
        }
        let by_name: HashMap<&str, &Arc<dyn Initializable>> = self
            .components
            .iter()
            .map(|component| (component.name(), component))
            .collect();
        for name in resolution_order(&edges)? {
            let component = by_name[name.as_str()];
            component
                .initialize()
                .await
                .map_err(|source| InitError::Component {
                    component: name.clone(),
                    source,
                })?;
            info!(component = %name, "initialized");
        }
        Ok(())
    }
}
