use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

/// Error type for topology operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError<K: Debug> {
    #[error("cycle detected: {path:?}")]
    CycleDetected { path: Vec<K> },
}

/// Topological sort of every node reachable from `roots` by following
/// dependency edges backwards.
///
/// # Arguments
/// * `roots` - Nodes whose dependencies must be scheduled
/// * `get_dependencies` - Returns the predecessors of a node
///
/// # Returns
/// The reachable nodes with every dependency ahead of its dependents, or
/// the nodes on the first cycle found.
///
/// Traversal is a depth-first post-order, so the result is deterministic
/// for a given root order and dependency order. The walk keeps its own
/// stack and runs in linear time regardless of graph depth.
pub fn topological_sort<K>(
    roots: impl IntoIterator<Item = K>,
    get_dependencies: impl Fn(&K) -> Vec<K>,
) -> Result<Vec<K>, TopologyError<K>>
where
    K: Hash + Eq + Clone + Debug,
{
    let mut sorted = Vec::new();
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    // (node, its dependencies, next dependency to visit)
    let mut stack: Vec<(K, Vec<K>, usize)> = Vec::new();

    for root in roots {
        if visited.contains(&root) {
            continue;
        }
        on_path.insert(root.clone());
        let dependencies = get_dependencies(&root);
        stack.push((root, dependencies, 0));

        while let Some((_, dependencies, next)) = stack.last_mut() {
            let Some(dependency) = dependencies.get(*next).cloned() else {
                if let Some((node, _, _)) = stack.pop() {
                    on_path.remove(&node);
                    visited.insert(node.clone());
                    sorted.push(node);
                }
                continue;
            };
            *next += 1;

            if on_path.contains(&dependency) {
                let start = stack
                    .iter()
                    .position(|(node, _, _)| *node == dependency)
                    .unwrap_or(0);
                return Err(TopologyError::CycleDetected {
                    path: stack[start..].iter().map(|(node, _, _)| node.clone()).collect(),
                });
            }
            if !visited.contains(&dependency) {
                on_path.insert(dependency.clone());
                let dependencies = get_dependencies(&dependency);
                stack.push((dependency, dependencies, 0));
            }
        }
    }

    Ok(sorted)
}
