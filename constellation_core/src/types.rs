// constellation_core/src/types.rs

use nalgebra::DVector;

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Observation = DVector<f64>;

// --- Core Identifier ---
// A generic, framework-agnostic identifier for the sensor that produced an
// observation. On a real device this is a hardware ID; a host application
// may pack whatever it likes into the u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SensorHandle(pub u64);
