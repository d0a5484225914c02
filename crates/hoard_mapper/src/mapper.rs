//! Mapper traits and the pipeline that chains them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use hoard_graph::{Graph, Project};

use crate::error::MapperError;
use crate::side_effect::SideEffect;

/// A pure transformation of a whole graph.
pub trait GraphMapper: Send + Sync {
    /// Name reported when the mapper fails inside a pipeline.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Maps `graph` to a new graph plus the side effects it requires.
    fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError>;
}

impl<T: GraphMapper + ?Sized> GraphMapper for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
        (**self).map(graph)
    }
}

/// A pure transformation of a single project.
pub trait ProjectMapper: Send + Sync {
    /// Name reported when the mapper fails inside a pipeline.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Maps `project` to a new project plus the side effects it requires.
    fn map(&self, project: Project) -> Result<(Project, Vec<SideEffect>), MapperError>;
}

/// Lifts project mappers to a graph mapper.
///
/// Every project of the graph, in path order, goes through every project
/// mapper in order. The adjacency map is carried over unchanged.
#[derive(Default)]
pub struct ProjectMappersGraphMapper {
    mappers: Vec<Box<dyn ProjectMapper>>,
}

impl ProjectMappersGraphMapper {
    /// Creates a graph mapper running `mappers` over each project.
    pub fn new(mappers: Vec<Box<dyn ProjectMapper>>) -> Self {
        Self { mappers }
    }
}

impl GraphMapper for ProjectMappersGraphMapper {
    fn name(&self) -> &str {
        "project-mappers"
    }

    fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
        let mut side_effects = Vec::new();
        let mut projects = BTreeMap::<PathBuf, Project>::new();

        for project in graph.projects().values() {
            let mut project = project.clone();
            for mapper in &self.mappers {
                let (mapped, effects) =
                    mapper.map(project).map_err(|source| MapperError::Failed {
                        mapper: mapper.name().to_string(),
                        source: Box::new(source),
                    })?;
                project = mapped;
                side_effects.extend(effects);
            }
            projects.insert(project.path.clone(), project);
        }

        let mapped = Graph::new(
            graph.name(),
            graph.path(),
            projects,
            graph.dependencies().clone(),
        );
        Ok((mapped, side_effects))
    }
}

/// An ordered chain of graph mappers.
///
/// Each mapper receives the previous mapper's graph; side effects are
/// concatenated in mapper order. The first failure aborts the pipeline.
#[derive(Default)]
pub struct MapperPipeline {
    mappers: Vec<Box<dyn GraphMapper>>,
}

impl MapperPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mapper.
    pub fn with(mut self, mapper: impl GraphMapper + 'static) -> Self {
        self.mappers.push(Box::new(mapper));
        self
    }

    /// Appends an already boxed mapper.
    pub fn push(&mut self, mapper: Box<dyn GraphMapper>) {
        self.mappers.push(mapper);
    }

    /// Returns the number of mappers.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Returns `true` if the pipeline has no mappers.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Runs every mapper in order.
    pub fn run(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
        let mut graph = graph;
        let mut side_effects = Vec::new();

        for mapper in &self.mappers {
            let (mapped, effects) = mapper.map(graph).map_err(|source| {
                tracing::warn!(mapper = mapper.name(), error = %source, "mapper failed");
                MapperError::Failed {
                    mapper: mapper.name().to_string(),
                    source: Box::new(source),
                }
            })?;
            tracing::debug!(
                mapper = mapper.name(),
                side_effects = effects.len(),
                "mapper applied"
            );
            graph = mapped;
            side_effects.extend(effects);
        }

        Ok((graph, side_effects))
    }
}

impl GraphMapper for MapperPipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
        self.run(graph)
    }
}
