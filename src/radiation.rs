//! The ionising-radiation component. The transfer geometry (sight-line
//! path lengths, upstream weights, causal orders) is initialised here, and
//! the per-cell photoionisation rates are delegated to a `RadiationModel`
//! implementation, so a different transfer scheme can be swapped in
//! without touching the stepping machinery.

use crate::fluid::Fluid;
use crate::grid::{hid, tid, uid};
use crate::message::comm::Communicator;
use crate::partition::PartitionManager;
use crate::thermo::rates::Microphysics;
use crate::thermo::raytrace;
use crate::units::{Constants, EV};

/// Source terms for one cell, in code units.
#[derive(Clone, Copy, Debug, Default)]
pub struct RadiationRates {
    /// Rate of change of the ionised-hydrogen fraction.
    pub hii_rate: f64,

    /// Photoionisation heating rate (energy density per time).
    pub euv_heating: f64,

    /// Recombination cooling rate, entered negative.
    pub recombination_cooling: f64,
}

/// The callback surface for the transfer scheme: given the local state and
/// the optical depth already traced to the cell, produce its source terms.
pub trait RadiationModel {
    fn source_terms(&self, nh: f64, hiifrac: f64, temperature: f64, col_den: f64)
        -> RadiationRates;
}

/**
 * An on-the-spot equilibrium model: ionisation balance is assumed, so the
 * HII fraction is left to advection, while recombinations cool the gas and
 * each one is paid back with the mean excess photon energy.
 */
pub struct OnTheSpotModel {
    micro: Microphysics,
    excess_energy: f64,
    case_b: f64,
}

impl OnTheSpotModel {
    pub fn new(consts: &Constants) -> Self {
        Self {
            micro: Microphysics::new(consts),
            excess_energy: consts.converter.to_code_units(5.0 * EV, 1.0, 2.0, -2.0),
            case_b: consts.converter.to_code_units(2.59e-13, 0.0, 3.0, -1.0),
        }
    }
}

impl RadiationModel for OnTheSpotModel {
    fn source_terms(&self, nh: f64, hiifrac: f64, temperature: f64, _col_den: f64) -> RadiationRates {
        let recombination = self.micro.recombination_hii(nh, hiifrac, temperature);
        let ne = nh * hiifrac;
        RadiationRates {
            hii_rate: 0.0,
            euv_heating: self.excess_energy * self.case_b * ne * ne,
            recombination_cooling: -recombination,
        }
    }
}




/**
 * The radiation integrator: traces columns, asks the model for per-cell
 * rates, and folds the results into the conserved-variable derivatives.
 */
pub struct Radiation {
    model: Box<dyn RadiationModel>,
    hii_switch: f64,
    mass_fraction_h: f64,
    hydrogen_mass: f64,
    hii_rates: Vec<f64>,
}




// ============================================================================
impl Radiation {

    pub fn new(model: Box<dyn RadiationModel>, hii_switch: f64, mass_fraction_h: f64, consts: &Constants) -> Self {
        Self {
            model,
            hii_switch,
            mass_fraction_h,
            hydrogen_mass: consts.hydrogen_mass,
            hii_rates: Vec::new(),
        }
    }

    pub fn component_name(&self) -> &'static str {
        "radiation"
    }

    /// Initialise the transfer geometry. Called once after setup, and again
    /// whenever the star moves.
    pub fn init_field(&self, fluid: &mut Fluid) {
        let star = fluid.star.clone();
        fluid.grid.init_ray_geometry(&star);
    }

    pub fn pre_time_step_calculations(
        &mut self,
        fluid: &mut Fluid,
        partition: &mut PartitionManager,
        client: &dyn Communicator,
        consts: &Constants,
    ) {
        if fluid.star.on {
            raytrace::ray_trace(fluid, partition, client, consts);
        }
    }

    /// Evaluate the model on every active cell, storing heating into the
    /// diagnostic slots and the ionisation rate for the source-term fold.
    pub fn integrate(&mut self, _dt: f64, fluid: &mut Fluid) {
        self.hii_rates.resize(fluid.grid.num_cells(), 0.0);
        self.hii_rates.fill(0.0);

        let order: Vec<usize> = fluid.grid.causal_non_wind().to_vec();
        for id in order {
            let cell = fluid.grid.cell(id);
            if cell.q[uid::ADV] < self.hii_switch {
                let cell = fluid.grid.cell_mut(id);
                cell.h[hid::RHII] = 0.0;
                cell.h[hid::EUVH] = 0.0;
                continue;
            }
            let nh = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let t = fluid.calc_temperature(cell.q[uid::HII], cell.q[uid::PRE], cell.q[uid::DEN]);
            let rates =
                self.model
                    .source_terms(nh, cell.q[uid::HII], t, cell.t[tid::COL_DEN]);

            self.hii_rates[id] = rates.hii_rate;
            let cell = fluid.grid.cell_mut(id);
            cell.h[hid::EUVH] = rates.euv_heating;
            cell.h[hid::RHII] = rates.recombination_cooling;
        }
    }

    pub fn update_source_terms(&self, _dt: f64, fluid: &mut Fluid) {
        let order: Vec<usize> = fluid.grid.causal_non_wind().to_vec();
        for id in order {
            let hii_rate = self.hii_rates.get(id).copied().unwrap_or(0.0);
            let cell = fluid.grid.cell_mut(id);
            cell.udot[uid::PRE] += cell.h[hid::EUVH] + cell.h[hid::RHII];
            cell.udot[uid::HII] += cell.q[uid::DEN] * hii_rate;
        }
    }

    /// Fractional-pressure-change limit on the radiative heating rate.
    pub fn calculate_time_step(&self, dt_max: f64, fluid: &Fluid) -> f64 {
        let mut dt = dt_max;
        for &id in fluid.grid.grid_cells() {
            let cell = fluid.grid.cell(id);
            let rate = cell.h[hid::EUVH] + cell.h[hid::RHII];
            if rate != 0.0 {
                let dti = (0.1 * cell.u[uid::PRE] / rate).abs();
                if dti < dt {
                    dt = dti;
                }
            }
        }
        dt
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::Grid;
    use crate::star::Star;
    use crate::units::{Constants, Converter};

    #[test]
    fn on_the_spot_model_cools_by_recombination_and_heats_by_excess() {
        let consts = Constants::new(Converter::identity(), 1);
        let model = OnTheSpotModel::new(&consts);
        let rates = model.source_terms(100.0, 0.5, 8000.0, 0.0);
        assert!(rates.recombination_cooling < 0.0);
        assert!(rates.euv_heating > 0.0);
        assert_eq!(rates.hii_rate, 0.0);

        // Neutral gas neither recombines nor is heated.
        let neutral = model.source_terms(100.0, 0.0, 8000.0, 0.0);
        assert_eq!(neutral.recombination_cooling, 0.0);
        assert_eq!(neutral.euv_heating, 0.0);
    }

    #[test]
    fn integrate_fills_the_diagnostic_slots() {
        let consts = Constants::new(Converter::identity(), 1).with_floors(1e-30, 1e-30, 0.0);
        let grid = Grid::new(1, [4, 1, 1], 4.0, 0, 1);
        let mut fluid = Fluid::new(grid, Star::off(), 5.0 / 3.0, 1.0, &consts);
        for n in 0..fluid.grid.grid_cells().len() {
            let id = fluid.grid.grid_cells()[n];
            let cell = fluid.grid.cell_mut(id);
            cell.q[uid::DEN] = 100.0 * crate::units::HYDROGEN_MASS;
            cell.q[uid::PRE] = 1.0e-10;
            cell.q[uid::HII] = 1.0;
            cell.q[uid::ADV] = 1.0;
        }
        fluid.grid.init_ray_geometry(&Star::off());
        fluid.global_u_from_q();

        let model = Box::new(OnTheSpotModel::new(&consts));
        let mut radiation = Radiation::new(model, 1e-2, 1.0, &consts);
        radiation.integrate(1.0, &mut fluid);

        let id = fluid.grid.grid_cells()[0];
        assert!(fluid.grid.cell(id).h[hid::RHII] < 0.0);
        assert!(fluid.grid.cell(id).h[hid::EUVH] > 0.0);
        assert!(radiation.calculate_time_step(1.0e30, &fluid) < 1.0e30);
    }
}
