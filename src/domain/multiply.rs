//! Least-loaded round-robin cloning
//!
//! A targeted container grows by cloning its own leaves until its
//! population (leaves plus attached clones) reaches the target count. The
//! set of leaves never changes; only their clone counts do.
//!
//! Each round visits the leaves in discovery order and clones every leaf
//! whose clone count equals the current threshold, the lowest clone count
//! among the container's leaves. Cloning stops mid-round once the target is
//! met, so when the clones don't divide evenly the earliest leaves get the
//! extra one. Clone counts of a fresh container never differ by more than
//! one.
//!
//! Only the graph is touched here. Clones are queued on every container that
//! references their leaf and written out later by the propagation step.
//!
//! A clone the store refuses to create stops that container where it is and
//! becomes a [`PatchWarning::CloneFailed`]; the remaining targets still grow.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::storage::{Session, StoreError};

use super::graph::{ContainerId, LeafId, PatchGraph};
use super::report::PatchWarning;

/// Clone editor ID suffix used by default (`<leaf><suffix><n>`)
pub const DEFAULT_CLONE_SUFFIX: &str = "_acot";

/// Default interval between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Grows targeted containers to their target counts
#[derive(Debug, Clone)]
pub struct Multiplier {
    clone_suffix: String,
    progress_interval: Duration,
    created: usize,
    warnings: Vec<PatchWarning>,
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::new(DEFAULT_CLONE_SUFFIX, DEFAULT_PROGRESS_INTERVAL)
    }
}

impl Multiplier {
    pub fn new(clone_suffix: impl Into<String>, progress_interval: Duration) -> Self {
        Self {
            clone_suffix: clone_suffix.into(),
            progress_interval,
            created: 0,
            warnings: Vec::new(),
        }
    }

    /// Total clones created by this multiplier
    pub fn created(&self) -> usize {
        self.created
    }

    /// Clones the store refused so far
    pub fn warnings(&self) -> &[PatchWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<PatchWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Grows every targeted container, lists first, and returns clones per container
    pub fn multiply_all<'s>(
        &mut self,
        graph: &mut PatchGraph<'s>,
        session: Session<'s>,
    ) -> Result<Vec<(ContainerId, usize)>, StoreError> {
        let mut created = Vec::new();
        for container in graph.targeted() {
            let count = self.multiply(graph, session, container)?;
            created.push((container, count));
        }
        Ok(created)
    }

    /// Grows one container to its target count and returns the number of clones made
    ///
    /// Containers without a target, or already at or above it, are left
    /// alone. Only errors other than a refused clone are returned.
    pub fn multiply<'s>(
        &mut self,
        graph: &mut PatchGraph<'s>,
        session: Session<'s>,
        container: ContainerId,
    ) -> Result<usize, StoreError> {
        let Some(target_count) = graph.target_count(container) else {
            return Ok(0);
        };
        let leaves = graph.leaves_of(container);
        let mut population = graph.population(container);
        if leaves.is_empty() || population >= target_count {
            return Ok(0);
        }

        info!(
            "Creating {} new leaves for {}",
            target_count - population,
            graph.long_name(container)
        );

        let mut progress_at = Instant::now() + self.progress_interval;
        let mut created = 0;
        let mut threshold = min_clone_count(graph, &leaves);

        'rounds: loop {
            for &leaf in &leaves {
                if graph.leaf(leaf).clone_count() != threshold {
                    continue;
                }

                match graph.spawn_clone(session, leaf, &self.clone_suffix) {
                    Ok(_) => {}
                    Err(StoreError::CreateFailed(editor_id, reason)) => {
                        let warning = PatchWarning::CloneFailed {
                            key: graph.editor_id(container).to_string(),
                            editor_id,
                            reason,
                        };
                        warn!("{}", warning);
                        self.warnings.push(warning);
                        break 'rounds;
                    }
                    Err(err) => return Err(err),
                }
                created += 1;
                self.created += 1;
                population += 1;

                if Instant::now() > progress_at {
                    info!("Created a total of {} new leaves...", self.created);
                    progress_at = Instant::now() + self.progress_interval;
                }
                if population >= target_count {
                    break 'rounds;
                }
            }
            threshold = min_clone_count(graph, &leaves);
        }

        Ok(created)
    }
}

fn min_clone_count(graph: &PatchGraph<'_>, leaves: &[LeafId]) -> usize {
    leaves
        .iter()
        .map(|&leaf| graph.leaf(leaf).clone_count())
        .min()
        .unwrap_or(0)
}
