// constellation_core/src/models/generic.rs

use nalgebra::DVector;

use crate::models::measurement::MeasurementModel;
use crate::models::process::ProcessModel;
use crate::types::{Observation, State};
use crate::utils::integrators::{Integrator, RK4};

// --- Constant Velocity Model ---
// Assumes the tracked body keeps moving with its current velocity. The
// state vector is [p_0..p_axes, v_0..v_axes]; velocity changes are left to
// the process noise Q.
#[derive(Debug, Default, Clone)]
pub struct ConstantVelocityModel {
    pub axes: usize,
}

impl ConstantVelocityModel {
    pub fn new(axes: usize) -> Self {
        Self { axes }
    }

    fn derivatives(&self, x: &State, _t: f64) -> State {
        let mut x_dot = DVector::zeros(2 * self.axes);
        // d(Position)/dt = Velocity
        for i in 0..self.axes {
            x_dot[i] = x[self.axes + i];
        }
        // d(Velocity)/dt = 0 (the "constant" part of the model)
        x_dot
    }
}

impl ProcessModel for ConstantVelocityModel {
    fn state_dim(&self) -> usize {
        2 * self.axes
    }

    fn propagate(&self, x: &State, dt: f64) -> Option<State> {
        let func = |func_x: &State, func_t: f64| -> State { self.derivatives(func_x, func_t) };
        Some(RK4.step(&func, x, 0.0, dt))
    }
}

// --- Position Sensor Model ---
// A sensor that observes the position components of a constant-velocity
// state directly, e.g. an optical fix already resolved to coordinates.
#[derive(Debug, Default, Clone)]
pub struct PositionSensorModel {
    pub axes: usize,
}

impl PositionSensorModel {
    pub fn new(axes: usize) -> Self {
        Self { axes }
    }
}

impl MeasurementModel for PositionSensorModel {
    fn measurement_dim(&self) -> usize {
        self.axes
    }

    fn measure(&self, x: &State) -> Option<Observation> {
        if x.nrows() < self.axes {
            return None;
        }
        Some(x.rows(0, self.axes).into_owned())
    }
}
