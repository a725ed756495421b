//! The time-integration orchestrator: composes the active physics
//! components into a symmetric operator-split full step, drives the run
//! loop and the checkpoint cadence, and polices the solution for
//! catastrophic states after every sub-step.

use std::error;
use std::fmt;

use log::{info, warn};

use crate::config::RunParameters;
use crate::fluid::Fluid;
use crate::grid::{uid, Grid};
use crate::hydro::{Hydrodynamics, RiemannSolver};
use crate::message::comm::Communicator;
use crate::output::{self, Checkpointer};
use crate::partition::PartitionManager;
use crate::radiation::{OnTheSpotModel, Radiation};
use crate::setup::InitialConditionsProvider;
use crate::star::{Location, Star};
use crate::thermo::Thermodynamics;
use crate::timestep::{ComponentTimeSteps, TimeStepper};
use crate::units::{Constants, Converter};

/**
 * A failure that ends the run. Numerical floors are not errors; anything
 * that reaches this type is either a broken solution state (reported with
 * a dump of the offending cells) or an output failure.
 */
#[derive(Debug)]
pub enum DriverError {
    CatastrophicState { context: String, dump: String },
    Io(std::io::Error),
}

impl fmt::Display for DriverError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            DriverError::CatastrophicState { context, dump } => {
                writeln!(fmt, "{} produced an invalid solution state", context)?;
                write!(fmt, "{}", dump)
            }
            DriverError::Io(e) => write!(fmt, "output error: {}", e),
        }
    }
}

impl error::Error for DriverError {}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Io(e)
    }
}




/// The closed set of physics components the orchestrator can drive, in
/// their fixed splitting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ComponentId {
    Hydro,
    Thermo,
    Rad,
}

impl ComponentId {
    fn name(&self) -> &'static str {
        match self {
            ComponentId::Hydro => "hydrodynamics",
            ComponentId::Thermo => "thermodynamics",
            ComponentId::Rad => "radiation",
        }
    }
}




pub struct Simulation {
    pub fluid: Fluid,
    consts: Constants,
    hydro: Hydrodynamics,
    thermo: Option<Thermodynamics>,
    radiation: Option<Radiation>,
    stepper: TimeStepper,
    checkpointer: Checkpointer,
    partition: PartitionManager,
    client: Box<dyn Communicator>,
    active: Vec<ComponentId>,
    step_counter: usize,
    steps: u64,
    tmax: f64,
    output_directory: String,
}




// ============================================================================
impl Simulation {

    pub fn new(params: &RunParameters, client: Box<dyn Communicator>) -> Result<Self, DriverError> {
        let converter = Converter::new(params.dscale, params.pscale, params.tscale);
        let consts = Constants::new(converter, params.grid.nd)
            .with_floors(params.dfloor, params.pfloor, params.tfloor);

        let side_length = consts
            .converter
            .to_code_units(params.grid.side_length, 0.0, 1.0, 0.0);
        let mut grid = Grid::new(
            params.grid.nd,
            params.grid.ncells,
            side_length,
            client.rank(),
            client.size(),
        );

        let star = if params.star.on {
            let ix = params.star.position[0];
            let location = if ix < grid.x_start {
                Location::Left
            } else if ix >= grid.x_end {
                Location::Right
            } else {
                Location::Here
            };
            Star {
                on: true,
                location,
                xc: [
                    params.star.position[0] as f64,
                    params.star.position[1] as f64,
                    params.star.position[2] as f64,
                ],
                photon_rate: consts
                    .converter
                    .to_code_units(params.star.photon_rate, 0.0, 0.0, -1.0),
                wind_velocity: consts
                    .converter
                    .to_code_units(params.star.wind_velocity, 0.0, 1.0, -1.0),
                mass_loss_rate: consts
                    .converter
                    .to_code_units(params.star.mass_loss_rate, 1.0, 0.0, -1.0),
                wind_cell_radius: params.star.wind_cell_radius,
            }
        } else {
            Star::off()
        };
        grid.init_ray_geometry(&star);

        let mut fluid = Fluid::new(
            grid,
            star,
            params.gamma,
            params.thermo.mass_fraction_h,
            &consts,
        );

        let provider = crate::setup::provider_from_params(&params.setup);
        apply_initial_conditions(&mut fluid, provider.as_ref(), &consts);
        to_code_units(&mut fluid, &consts);

        let thermo = if params.cooling_on {
            let thermo = Thermodynamics::new(&consts, &params.thermo);
            thermo.initialise_min_temp_field(&mut fluid);
            Some(thermo)
        } else {
            None
        };

        fluid.fix_primitives();
        fluid.global_u_from_q();

        let radiation = if params.radiation_on {
            Some(Radiation::new(
                Box::new(OnTheSpotModel::new(&consts)),
                params.thermo.thermo_hii_switch,
                params.thermo.mass_fraction_h,
                &consts,
            ))
        } else {
            None
        };

        warn_on_close_reverse_shock(&fluid, &consts, params.star.wind_cell_radius);

        let mut active = vec![ComponentId::Hydro];
        if thermo.is_some() {
            active.push(ComponentId::Thermo);
        }
        if radiation.is_some() {
            active.push(ComponentId::Rad);
        }

        let tmax = consts.converter.to_code_units(params.tmax, 0.0, 0.0, 1.0);
        let dt_max = consts.converter.to_code_units(params.dt_max, 0.0, 0.0, 1.0);
        let rank = client.rank();

        Ok(Self {
            fluid,
            hydro: Hydrodynamics::new(RiemannSolver::from_name(&params.riemann_solver)),
            thermo,
            radiation,
            stepper: TimeStepper::new(dt_max, tmax, params.debug),
            checkpointer: Checkpointer::new(tmax, params.ncheckpoints),
            partition: PartitionManager::new(rank),
            client,
            consts,
            active,
            step_counter: 0,
            steps: 0,
            tmax,
            output_directory: params.output_directory.clone(),
        })
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn constants(&self) -> &Constants {
        &self.consts
    }

    /// March the solution to the end time, dumping snapshots along the way.
    pub fn run(&mut self) -> Result<(), DriverError> {
        let init_time = self.fluid.grid.current_time;

        self.fluid.global_q_from_u();
        self.fluid.fix_primitives();

        info!("marching solution on rank {}", self.client.rank());

        self.fill_heating_arrays();
        self.checkpointer.update(init_time, self.stepper.dt_max());
        self.write_snapshot(0)?;

        while self.fluid.grid.current_time < self.tmax && !self.stepper.is_quitting() {
            let time = self.fluid.grid.current_time;
            let (print_now, dt_next) = self.checkpointer.update(time, self.stepper.dt_max());

            if print_now {
                self.fill_heating_arrays();
                let index = self.checkpointer.count() - 1;
                self.write_heating(index)?;
                self.write_snapshot(index)?;
            }

            let dt = self.full_step(dt_next)?;
            self.fluid.grid.delta_time = dt;
            self.fluid.grid.current_time += dt;
            self.steps += 1;
        }

        self.write_snapshot(self.checkpointer.ncheckpoints())?;
        info!(
            "run complete after {} steps at t = {:e}",
            self.steps, self.fluid.grid.current_time
        );
        Ok(())
    }

    /// Perform one full operator-split step no longer than
    /// `dt_next_checkpoint`, returning the step size taken.
    pub fn full_step(&mut self, dt_next_checkpoint: f64) -> Result<f64, DriverError> {
        self.fluid.global_q_from_u();
        self.fluid.fix_primitives();

        if let Some(thermo) = &self.thermo {
            thermo.pre_time_step_calculations(
                &mut self.fluid,
                &mut self.partition,
                &*self.client,
                &self.consts,
            );
        }
        if let Some(radiation) = &mut self.radiation {
            radiation.pre_time_step_calculations(
                &mut self.fluid,
                &mut self.partition,
                &*self.client,
                &self.consts,
            );
        }

        let dt_max = self.stepper.dt_max();
        let candidates = ComponentTimeSteps {
            hydro: self.hydro.calculate_time_step(dt_max, &self.fluid),
            radiation: self
                .radiation
                .as_ref()
                .map(|r| r.calculate_time_step(dt_max, &self.fluid)),
            thermo: self
                .thermo
                .as_ref()
                .map(|t| t.calculate_time_step(dt_max, &self.fluid)),
        };
        let dt = dt_next_checkpoint.min(self.stepper.reduce(
            candidates,
            &mut self.partition,
            &*self.client,
        ));

        let ncomps = self.active.len();
        if ncomps == 1 {
            self.hydro_step(dt)?;
            return Ok(dt);
        }

        // Rotating the starting component breaks the ordering bias of the
        // symmetric splitting across sequential steps.
        self.step_counter = (self.step_counter + 1) % ncomps;

        for i in 0..ncomps {
            let h = if i == ncomps - 1 { 1.0 } else { 0.5 };
            let comp = self.active[(i + self.step_counter) % ncomps];
            self.sub_step(h * dt, i == 0, comp)?;
        }
        for i in (0..ncomps - 1).rev() {
            let comp = self.active[(i + self.step_counter) % ncomps];
            self.sub_step(dt / 2.0, false, comp)?;
        }

        Ok(dt)
    }

    fn sub_step(&mut self, h: f64, first_of_sweep: bool, comp: ComponentId) -> Result<(), DriverError> {
        self.check_values(&format!("{} before", comp.name()))?;

        if !first_of_sweep {
            self.fluid.global_q_from_u();
            self.fluid.fix_primitives();
            match comp {
                ComponentId::Thermo => {
                    if let Some(thermo) = &self.thermo {
                        thermo.pre_time_step_calculations(
                            &mut self.fluid,
                            &mut self.partition,
                            &*self.client,
                            &self.consts,
                        );
                    }
                }
                ComponentId::Rad => {
                    if let Some(radiation) = &mut self.radiation {
                        radiation.pre_time_step_calculations(
                            &mut self.fluid,
                            &mut self.partition,
                            &*self.client,
                            &self.consts,
                        );
                    }
                }
                // The hydro component refreshes its own ghost planes when
                // it integrates.
                ComponentId::Hydro => {}
            }
        }

        match comp {
            ComponentId::Hydro => {
                self.hydro
                    .integrate(h, &mut self.fluid, &mut self.partition, &*self.client);
                self.hydro.update_source_terms(h, &mut self.fluid);
            }
            ComponentId::Thermo => {
                let thermo = self.thermo.as_ref().expect("thermo listed but absent");
                thermo.integrate(h, &mut self.fluid);
                thermo.update_source_terms(h, &mut self.fluid);
            }
            ComponentId::Rad => {
                let radiation = self.radiation.as_mut().expect("radiation listed but absent");
                radiation.integrate(h, &mut self.fluid);
                radiation.update_source_terms(h, &mut self.fluid);
            }
        }

        self.fluid.adv_solution(h);
        self.fluid.fix_solution();

        self.check_values(&format!("{} after", comp.name()))
    }

    /// The single-component path: a predictor/corrector (midpoint) advance
    /// of the gas alone.
    fn hydro_step(&mut self, dt: f64) -> Result<(), DriverError> {
        self.check_values("hydrodynamics before")?;

        self.fluid.global_w_from_u();
        self.hydro
            .integrate(dt, &mut self.fluid, &mut self.partition, &*self.client);
        self.hydro.update_source_terms(dt, &mut self.fluid);
        self.fluid.adv_solution(dt / 2.0);
        self.fluid.fix_solution();

        // Corrector: fluxes from the half-advanced state, applied to the
        // saved solution.
        self.fluid.global_q_from_u();
        self.fluid.global_u_from_w();
        self.hydro
            .integrate(dt, &mut self.fluid, &mut self.partition, &*self.client);
        self.hydro.update_source_terms(dt, &mut self.fluid);
        self.fluid.adv_solution(dt);
        self.fluid.fix_solution();
        Ok(())
    }

    /// Abort on NaN/Inf conservatives or vanished density/pressure. The
    /// error carries a dump of any cells whose velocity has blown up.
    fn check_values(&self, context: &str) -> Result<(), DriverError> {
        let mut broken = false;
        for &id in self.fluid.grid.grid_cells() {
            let cell = self.fluid.grid.cell(id);
            for i in 0..uid::N {
                if !cell.u[i].is_finite() {
                    broken = true;
                }
            }
            if cell.q[uid::DEN] == 0.0 || cell.q[uid::PRE] == 0.0 {
                broken = true;
            }
            if broken {
                break;
            }
        }
        if !broken {
            return Ok(());
        }

        let mut dump = String::new();
        for &id in self.fluid.grid.grid_cells() {
            let cell = self.fluid.grid.cell(id);
            if cell.q[uid::VEL].abs() > 1.0e50 || cell.q[uid::VEL + 1].abs() > 1.0e50 {
                dump.push_str(&format!(
                    "cell at {:?}: q = {:?}, u = {:?}\n",
                    cell.xc, cell.q, cell.u
                ));
            }
        }
        Err(DriverError::CatastrophicState {
            context: context.to_string(),
            dump,
        })
    }

    fn fill_heating_arrays(&mut self) {
        if let Some(thermo) = &self.thermo {
            thermo.fill_heating_arrays(
                &mut self.fluid,
                &mut self.partition,
                &*self.client,
                &self.consts,
            );
        }
    }

    fn write_snapshot(&self, index: usize) -> Result<(), DriverError> {
        output::write_snapshot(
            &self.output_directory,
            &output::format_suffix(index),
            self.fluid.grid.current_time,
            self.client.rank(),
            &self.fluid,
            &self.consts,
        )?;
        Ok(())
    }

    fn write_heating(&self, index: usize) -> Result<(), DriverError> {
        output::write_heating(
            &self.output_directory,
            &output::format_suffix(index),
            self.fluid.grid.current_time,
            self.client.rank(),
            &self.fluid,
            &self.consts,
        )?;
        Ok(())
    }
}




/// Evaluate the provider at every cell centre and store the CGS state.
fn apply_initial_conditions(
    fluid: &mut Fluid,
    provider: &dyn InitialConditionsProvider,
    consts: &Constants,
) {
    let conv = &consts.converter;
    let gamma = fluid.heat_capacity_ratio;
    let ids: Vec<usize> = fluid.grid.grid_cells().to_vec();
    for id in ids {
        let (xc, xs) = {
            let cell = fluid.grid.cell(id);
            let mut xc = [0.0; 3];
            let mut xs = [0.0; 3];
            for i in 0..3 {
                xc[i] = conv.from_code_units(cell.xc[i] * fluid.grid.dx[i], 0.0, 1.0, 0.0);
                xs[i] = conv.from_code_units(fluid.star.xc[i] * fluid.grid.dx[i], 0.0, 1.0, 0.0);
            }
            (xc, xs)
        };
        let state = provider.initialise(xc, xs);
        let cell = fluid.grid.cell_mut(id);
        cell.q[uid::DEN] = state.den;
        cell.q[uid::PRE] = state.pre;
        cell.q[uid::HII] = state.hii;
        cell.q[uid::ADV] = state.adv;
        for k in 0..3 {
            cell.q[uid::VEL + k] = state.vel[k];
            cell.grav[k] = state.grav[k];
        }
        cell.heat_capacity_ratio = gamma;
    }
}

/// Convert the freshly initialised CGS state into code units.
fn to_code_units(fluid: &mut Fluid, consts: &Constants) {
    let nd = consts.nd;
    let ids: Vec<usize> = fluid.grid.grid_cells().to_vec();
    for id in ids {
        let cell = fluid.grid.cell_mut(id);
        cell.q[uid::DEN] = consts
            .converter
            .to_code_units(cell.q[uid::DEN], 1.0, -3.0, 0.0);
        cell.q[uid::PRE] = consts
            .converter
            .to_code_units(cell.q[uid::PRE], 1.0, -1.0, -2.0);
        for k in 0..nd {
            cell.q[uid::VEL + k] =
                consts
                    .converter
                    .to_code_units(cell.q[uid::VEL + k], 0.0, 1.0, -1.0);
            cell.grav[k] = consts.converter.to_code_units(cell.grav[k], 0.0, 1.0, -2.0);
        }
    }
}

/// Warn when the star's predicted wind reverse shock sits within or close
/// to the injection region, where it cannot be resolved.
fn warn_on_close_reverse_shock(fluid: &Fluid, consts: &Constants, wind_cell_radius: f64) {
    let star = &fluid.star;
    if !star.on || wind_cell_radius <= 0.0 || star.location != Location::Here {
        return;
    }
    let id = match fluid.grid.global_to_id(
        star.xc[0] as i64,
        star.xc[1] as i64,
        star.xc[2] as i64,
    ) {
        Some(id) => id,
        None => return,
    };
    let pre = fluid.grid.cell(id).q[uid::PRE];
    if pre <= 0.0 {
        return;
    }
    let edot = 0.5 * star.mass_loss_rate * star.wind_velocity * star.wind_velocity;
    let reverse2 = (2.0 * edot * star.mass_loss_rate).sqrt() / (4.0 * consts.pi * pre);
    let reverse = reverse2.sqrt() / fluid.grid.dx[0];
    if reverse < 5.0 + wind_cell_radius {
        warn!(
            "reverse shock within or close to wind injection region [rs = {:.2}, wir = {}]",
            reverse, wind_cell_radius
        );
    }
}
