// constellation_core/src/estimation/mod.rs

/// Where a filter sits in its predict -> update -> commit cycle.
///
/// `predict` moves the filter to `Predicted`, which is the only phase in
/// which measurement updates may be applied; `commit` folds the working
/// estimate into the prior and returns to `Ready`. Operations invoked in
/// the wrong phase fail with `InvalidSequence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// The prior is authoritative; no estimate in flight.
    Ready,
    /// A working estimate and sigma points exist; updates may be applied.
    Predicted,
}

pub mod filters;
pub mod unscented;
