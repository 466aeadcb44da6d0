// constellation_core/src/models/measurement.rs

use dyn_clone::DynClone;
use std::fmt::Debug;

use crate::types::{Observation, State};

// --- MEASUREMENT MODEL TRAIT ---
// Represents the mathematical model of a sensor. `z = h(x) + v`
pub trait MeasurementModel: DynClone + Debug + Send + Sync {
    /// Dimension of the measurement vector `z` this model produces.
    fn measurement_dim(&self) -> usize;

    /// Projects a state sigma point into measurement space: `z = h(x)`.
    ///
    /// Returning `None` reports that the state cannot be observed by this
    /// sensor (e.g. a marker that projects outside the camera frustum);
    /// the whole update is then rejected for the current cycle.
    fn measure(&self, x: &State) -> Option<Observation>;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn MeasurementModel>`.
dyn_clone::clone_trait_object!(MeasurementModel);
