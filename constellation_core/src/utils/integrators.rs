// constellation_core/src/utils/integrators.rs

use nalgebra::DVector;

/// Fixed-step ODE integrator for `x_dot = f(x, t)`.
///
/// Process models that are written as continuous-time derivatives use one
/// of these to step a sigma point across a prediction interval.
pub trait Integrator<T> {
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T>;
}

/// First-order (Euler) integration. Cheap, adequate for short steps.
#[derive(Debug, Default)]
pub struct Euler;

impl<T> Integrator<T> for Euler
where
    T: Copy + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        x0.clone() + dt * func(x0, t0)
    }
}

/// Classic fourth-order Runge-Kutta integration.
#[derive(Debug, Default)]
pub struct RK4;

impl<T> Integrator<T> for RK4
where
    T: Copy + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        let half = T::from(0.5).unwrap();
        let sixth = T::from(1.0 / 6.0).unwrap();
        let two = T::from(2.0).unwrap();

        let k1 = func(x0, t0);
        let k2 = func(&(x0.clone() + half * dt * k1.clone()), t0 + half * dt);
        let k3 = func(&(x0.clone() + half * dt * k2.clone()), t0 + half * dt);
        let k4 = func(&(x0.clone() + dt * k3.clone()), tf);

        x0.clone() + dt * sixth * (k1 + two * k2 + two * k3 + k4)
    }
}
