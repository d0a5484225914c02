//! Error types for graph validation and traversal.

use std::path::PathBuf;

/// Errors raised when a graph violates its structural invariants.
///
/// All of these are input errors: fatal and not retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A target dependency does not resolve to any target in the graph.
    #[error(
        "dangling dependency: {from} depends on target '{name}' in {}, which is not in the graph",
        project.display()
    )]
    DanglingDependency {
        /// The node declaring the dependency.
        from: String,
        /// Name of the missing target.
        name: String,
        /// Project path of the missing target.
        project: PathBuf,
    },

    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    Cycle {
        /// The nodes on the cycle, first node repeated at the end.
        path: Vec<String>,
    },

    /// A query referred to a target that is not in the graph.
    #[error("unknown target '{name}' in {}", project.display())]
    UnknownTarget {
        /// Target name.
        name: String,
        /// Project path.
        project: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display() {
        let err = GraphError::Cycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: A -> B -> A");
    }

    #[test]
    fn dangling_display() {
        let err = GraphError::DanglingDependency {
            from: "target(App, /p)".into(),
            name: "Core".into(),
            project: PathBuf::from("/p"),
        };
        let msg = err.to_string();
        assert!(msg.contains("dangling dependency"));
        assert!(msg.contains("'Core'"));
        assert!(msg.contains("target(App, /p)"));
    }

    #[test]
    fn unknown_target_display() {
        let err = GraphError::UnknownTarget {
            name: "Core".into(),
            project: PathBuf::from("/p"),
        };
        assert_eq!(err.to_string(), "unknown target 'Core' in /p");
    }
}
