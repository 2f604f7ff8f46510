//! The patch pipeline: build, multiply, propagate, finalize

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::storage::{RecordStore, Session, StoreError};

use super::builder::{GraphBuilder, RecordSignatures};
use super::graph::{ContainerRole, PatchGraph};
use super::multiply::{Multiplier, DEFAULT_CLONE_SUFFIX, DEFAULT_PROGRESS_INTERVAL};
use super::propagate::propagate;
use super::report::{PatchReport, TargetReport};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Knobs for one patch run
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOptions {
    pub clone_suffix: String,
    pub progress_interval: Duration,
    pub signatures: RecordSignatures,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            clone_suffix: DEFAULT_CLONE_SUFFIX.to_string(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            signatures: RecordSignatures::default(),
        }
    }
}

/// Grows every target in `targets` and writes the clones into `store`
///
/// Targets are processed in key order. Unknown or empty targets are
/// reported as warnings and skipped, as is the rest of a target whose clone
/// the store refuses. Any other store error abandons the run; the caller
/// should not save the patch in that case.
pub fn run_patch(
    store: &dyn RecordStore,
    targets: &BTreeMap<String, usize>,
    options: &PatchOptions,
) -> Result<PatchReport, PatchError> {
    let session = Session::new(store);

    let (mut graph, warnings) =
        GraphBuilder::build(session, options.signatures.clone(), targets)?;

    let mut multiplier =
        Multiplier::new(options.clone_suffix.as_str(), options.progress_interval);
    let grown = multiplier.multiply_all(&mut graph, session)?;

    let written = propagate(&graph, session)?;
    info!(
        clones = multiplier.created(),
        entries = written.entries,
        memberships = written.memberships,
        "Patch complete"
    );

    let mut report = describe(&graph);
    report.targets = grown
        .into_iter()
        .map(|(container, clones_created)| TargetReport {
            key: graph.editor_id(container).to_string(),
            container: graph.kind(container),
            leaves: graph.leaf_count(container),
            target_count: graph.target_count(container).unwrap_or(0),
            clones_created,
            final_count: graph.population(container),
        })
        .collect();
    report.entries_added = written.entries;
    report.memberships_added = written.memberships;
    report.warnings = warnings;
    report.warnings.extend(multiplier.take_warnings());

    graph.finalize();
    Ok(report)
}

fn describe(graph: &PatchGraph<'_>) -> PatchReport {
    PatchReport {
        related_lists: graph
            .lists()
            .filter(|(_, list)| list.role() == ContainerRole::Related)
            .map(|(_, list)| list.editor_id().to_string())
            .collect(),
        related_sets: graph
            .sets()
            .filter(|(_, set)| set.role() == ContainerRole::Related)
            .map(|(_, set)| set.editor_id().to_string())
            .collect(),
        clones: graph
            .clones()
            .map(|clone| clone.editor_id().to_string())
            .collect(),
        ..PatchReport::default()
    }
}
