//! Best-parameter selection over the lattice of nested models.

pub mod best;
pub mod bundle;
pub mod lattice;

pub use best::{Objective, Scored, ScoredRow, best_rows};
pub use bundle::{MetricTable, ResultBundle, extract_mles_and_maps, group_rows};
pub use lattice::{LatticeNode, ModelLattice, map_metric};
