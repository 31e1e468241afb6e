// SPDX-License-Identifier: MIT OR Apache-2.0
//! Load a graph description and tick it.

use crate::inspector::TraceInspector;
use crate::settings::RunnerSettings;
use cinderflow_graph::nodes::create_standard_registry;
use cinderflow_graph::{
    ArchiveError, ArchiveWriter, DescriptionError, FlowGraph, FlowSystem, GraphDescription, RegistryError,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that stop a run
#[derive(Debug, Error)]
pub enum RunError {
    /// Node library failed to register
    #[error("node registry: {0}")]
    Registry(#[from] RegistryError),
    /// Graph description could not be loaded or built
    #[error("graph description: {0}")]
    Description(#[from] DescriptionError),
    /// Final state could not be written
    #[error("archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Ticks executed
    pub ticks: u32,
    /// Simulated seconds
    pub elapsed: f64,
    /// Edges traversed
    pub flows: usize,
    /// `Activate` events delivered
    pub activations: usize,
}

/// Run the configured graph; relative paths resolve against `base`
pub fn run(settings: &RunnerSettings, base: &Path) -> Result<RunSummary, RunError> {
    let graph_path = settings.graph_path(base);
    tracing::info!("Loading graph {}", graph_path.display());
    let description = GraphDescription::load(&graph_path)?;
    run_description(settings, &description, base)
}

/// Run an already parsed description
pub fn run_description(
    settings: &RunnerSettings,
    description: &GraphDescription,
    base: &Path,
) -> Result<RunSummary, RunError> {
    let registry = Arc::new(create_standard_registry()?);
    let mut system = FlowSystem::with_settings(registry, settings.graph_settings.clone());
    let id = system.load_description(description)?;
    let inspector = Arc::new(TraceInspector::new());
    if let Some(graph) = system.graph_mut(id) {
        graph.add_inspector(inspector.clone());
    }

    for _ in 0..settings.ticks {
        system.update(settings.tick_delta);
    }

    let elapsed = system.graph(id).map_or(0.0, FlowGraph::current_time);
    if let (Some(path), Some(output), Some(graph)) =
        (settings.archive_path(base), settings.archive.as_ref(), system.graph_mut(id))
    {
        let mut writer = ArchiveWriter::new();
        graph.serialize(&mut writer);
        writer.finish().save(&path, output.format)?;
        tracing::info!("Wrote graph state to {}", path.display());
    }
    system.uninitialize();

    for (address, count) in inspector.flow_counts() {
        tracing::debug!(%address, count, "output traffic");
    }
    let summary = RunSummary {
        ticks: settings.ticks,
        elapsed,
        flows: inspector.flow_counts().iter().map(|(_, count)| count).sum(),
        activations: inspector.activations(),
    };
    tracing::info!(
        graph = %description.name,
        ticks = summary.ticks,
        flows = summary.flows,
        activations = summary.activations,
        "run finished"
    );
    Ok(summary)
}
