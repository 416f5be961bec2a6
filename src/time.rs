use crate::Real;
use log::debug;

/// Time state seen by time derivative schemes and time-dependent boundary conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Time<T> {
    value: T,
    delta_t: T,
    delta_t0: T,
    last_step: Option<T>,
    time_index: usize,
    local_rdelta_t: Option<Vec<T>>,
}

impl<T: Real> Time<T> {
    pub fn new(start: T, delta_t: T) -> Self {
        assert!(delta_t > T::zero(), "Time step must be positive.");
        Self {
            value: start,
            delta_t,
            delta_t0: delta_t,
            last_step: None,
            time_index: 0,
            local_rdelta_t: None,
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn delta_t(&self) -> T {
        self.delta_t
    }

    /// The time step of the previous step.
    pub fn delta_t0(&self) -> T {
        self.delta_t0
    }

    pub fn rdelta_t(&self) -> T {
        T::one() / self.delta_t
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }

    /// Sets the time step used for the next call to [`advance`](Self::advance).
    pub fn set_delta_t(&mut self, delta_t: T) {
        assert!(delta_t > T::zero(), "Time step must be positive.");
        self.delta_t = delta_t;
    }

    pub fn advance(&mut self) {
        self.delta_t0 = self.last_step.unwrap_or(self.delta_t);
        self.last_step = Some(self.delta_t);
        self.value += self.delta_t;
        self.time_index += 1;
        debug!("Time = {} (index {}, deltaT = {})", self.value, self.time_index, self.delta_t);
    }

    /// Per-cell reciprocal time step for local time stepping.
    pub fn local_rdelta_t(&self) -> Option<&[T]> {
        self.local_rdelta_t.as_deref()
    }

    pub fn set_local_rdelta_t(&mut self, rdelta_t: Vec<T>) {
        self.local_rdelta_t = Some(rdelta_t);
    }

    pub fn clear_local_rdelta_t(&mut self) {
        self.local_rdelta_t = None;
    }
}

impl<T: Real> Default for Time<T> {
    fn default() -> Self {
        Self::new(T::zero(), T::one())
    }
}
