// constellation_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::errors::{FilterError, FilterResult};
pub use crate::models::manifold::{Euclidean, Manifold, WrappedAngles};
pub use crate::models::measurement::MeasurementModel;
pub use crate::models::process::ProcessModel;
pub use crate::types::{Observation, SensorHandle, State};

// --- Estimation Engine (The "nouns" of the library) ---
pub use crate::estimation::filters::measurement::MeasurementUpdate;
pub use crate::estimation::filters::ukf::UnscentedKalmanFilter;
pub use crate::estimation::unscented::{SigmaParams, UnscentedTransform};
pub use crate::estimation::FilterPhase;

// --- Concrete Model Implementations (Export common ones for convenience) ---
pub use crate::models::generic::{ConstantVelocityModel, PositionSensorModel};
