//! Global time-step selection: the minimum of the active components'
//! stability limits, reduced across ranks, with a bootstrap step to let
//! initial transients settle and a collapse guard that ends the run before
//! a vanishing step can stall it forever.

use log::error;

use crate::message::comm::Communicator;
use crate::partition::PartitionManager;

/// Candidate time steps reported by the active physics components. Inactive
/// components are `None`.
#[derive(Clone, Copy, Debug)]
pub struct ComponentTimeSteps {
    pub hydro: f64,
    pub radiation: Option<f64>,
    pub thermo: Option<f64>,
}

pub struct TimeStepper {
    dt_max: f64,
    tmax: f64,
    debug: bool,
    first_time: bool,
    quitting: bool,
}




// ============================================================================
impl TimeStepper {

    pub fn new(dt_max: f64, tmax: f64, debug: bool) -> Self {
        Self {
            dt_max,
            tmax,
            debug,
            first_time: true,
            quitting: false,
        }
    }

    /// Whether a collapse was detected; observed by the run loop between
    /// full steps.
    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub fn dt_max(&self) -> f64 {
        self.dt_max
    }

    /// Reduce the component candidates to the global step size. The very
    /// first call returns a vanishing step so the startup transients relax
    /// before the solution marches in earnest.
    pub fn reduce(
        &mut self,
        candidates: ComponentTimeSteps,
        partition: &mut PartitionManager,
        client: &dyn Communicator,
    ) -> f64 {
        let dt = if self.first_time {
            self.first_time = false;
            self.dt_max * 1.0e-20
        } else {
            let dt_hydro = candidates.hydro;
            let dt_rad = candidates.radiation.unwrap_or(dt_hydro);
            let dt_thermo = candidates.thermo.unwrap_or(dt_hydro);
            let dt = dt_hydro.min(dt_rad).min(dt_thermo);

            if self.debug {
                let thyd = partition.all_reduce_min(client, 100.0 * dt_hydro / self.tmax);
                let trad = partition.all_reduce_min(client, 100.0 * dt_rad / self.tmax);
                let ttherm = partition.all_reduce_min(client, 100.0 * dt_thermo / self.tmax);

                if thyd <= 1.0e-6 || trad <= 1.0e-6 || ttherm <= 1.0e-6 {
                    error!("integration deltas are too small");
                    self.quitting = true;
                }
            }
            dt
        };
        partition.all_reduce_min(client, dt)
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::message::channel::ChannelCommunicator;

    fn reduce_solo(stepper: &mut TimeStepper, candidates: ComponentTimeSteps) -> f64 {
        let bus = ChannelCommunicator::bus(1);
        let mut partition = PartitionManager::new(0);
        stepper.reduce(candidates, &mut partition, &bus[0])
    }

    fn candidates(hydro: f64, thermo: Option<f64>) -> ComponentTimeSteps {
        ComponentTimeSteps {
            hydro,
            radiation: None,
            thermo,
        }
    }

    #[test]
    fn first_call_bootstraps_with_a_vanishing_step() {
        let mut stepper = TimeStepper::new(1.0e10, 1.0e12, false);
        let dt = reduce_solo(&mut stepper, candidates(1.0, None));
        assert_eq!(dt, 1.0e10 * 1.0e-20);
        // The second call uses the candidates.
        let dt = reduce_solo(&mut stepper, candidates(1.0, None));
        assert_eq!(dt, 1.0);
    }

    #[test]
    fn the_smallest_active_component_wins() {
        let mut stepper = TimeStepper::new(1.0e10, 1.0e12, false);
        reduce_solo(&mut stepper, candidates(1.0, None));
        let dt = reduce_solo(&mut stepper, candidates(3.0, Some(0.5)));
        assert_eq!(dt, 0.5);
    }

    #[test]
    fn collapse_of_any_component_sets_the_quitting_flag() {
        let tmax = 1.0e12;
        let mut stepper = TimeStepper::new(1.0e10, tmax, true);
        reduce_solo(&mut stepper, candidates(1.0, None));
        assert!(!stepper.is_quitting());

        // A healthy hydro step with a collapsed thermo step must trip the
        // guard all the same.
        let collapsed = tmax * 1.0e-9;
        reduce_solo(&mut stepper, candidates(1.0e9, Some(collapsed)));
        assert!(stepper.is_quitting());
    }
}
