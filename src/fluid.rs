//! The fluid façade over the grid: primitive/conservative conversions,
//! numerical floors, and the solution advance applied after each physics
//! sub-step.

use crate::grid::{uid, Grid, GridCell};
use crate::star::Star;
use crate::units::Constants;

pub struct Fluid {
    pub grid: Grid,
    pub star: Star,

    /// Default heat-capacity ratio assigned to new cells.
    pub heat_capacity_ratio: f64,

    mass_fraction_h: f64,
    specific_gas_constant: f64,
    dfloor: f64,
    pfloor: f64,
    tfloor: f64,
}




// ============================================================================
impl Fluid {

    pub fn new(grid: Grid, star: Star, heat_capacity_ratio: f64, mass_fraction_h: f64, consts: &Constants) -> Self {
        Self {
            grid,
            star,
            heat_capacity_ratio,
            mass_fraction_h,
            specific_gas_constant: consts.specific_gas_constant,
            dfloor: consts.dfloor,
            pfloor: consts.pfloor,
            tfloor: consts.tfloor,
        }
    }

    /// Inverse mean molecular weight for a given ionised-hydrogen fraction.
    /// Helium and metals are carried as a fixed neutral contribution.
    pub fn mu_inv(&self, hii: f64) -> f64 {
        self.mass_fraction_h * (hii + 1.0) + (1.0 - self.mass_fraction_h) * 0.25
    }

    /// Gas temperature [K] from the primitive state.
    pub fn calc_temperature(&self, hii: f64, pre: f64, den: f64) -> f64 {
        pre / (self.mu_inv(hii) * self.specific_gas_constant * den)
    }

    pub fn mass_fraction_h(&self) -> f64 {
        self.mass_fraction_h
    }

    pub fn specific_gas_constant(&self) -> f64 {
        self.specific_gas_constant
    }

    pub fn pfloor(&self) -> f64 {
        self.pfloor
    }

    pub fn dfloor(&self) -> f64 {
        self.dfloor
    }

    fn u_from_q(cell: &mut GridCell, nd: usize) {
        let den = cell.q[uid::DEN];
        let mut vsq = 0.0;
        for k in 0..nd {
            cell.u[uid::VEL + k] = den * cell.q[uid::VEL + k];
            vsq += cell.q[uid::VEL + k] * cell.q[uid::VEL + k];
        }
        for k in nd..3 {
            cell.u[uid::VEL + k] = 0.0;
        }
        cell.u[uid::DEN] = den;
        cell.u[uid::PRE] = cell.q[uid::PRE] / (cell.heat_capacity_ratio - 1.0) + 0.5 * den * vsq;
        cell.u[uid::HII] = den * cell.q[uid::HII];
        cell.u[uid::ADV] = den * cell.q[uid::ADV];
    }

    fn q_from_u(cell: &mut GridCell, nd: usize) {
        let den = cell.u[uid::DEN];
        let mut ke = 0.0;
        for k in 0..nd {
            let v = cell.u[uid::VEL + k] / den;
            cell.q[uid::VEL + k] = v;
            ke += 0.5 * den * v * v;
        }
        for k in nd..3 {
            cell.q[uid::VEL + k] = 0.0;
        }
        cell.q[uid::DEN] = den;
        cell.q[uid::PRE] = (cell.u[uid::PRE] - ke) * (cell.heat_capacity_ratio - 1.0);
        cell.q[uid::HII] = cell.u[uid::HII] / den;
        cell.q[uid::ADV] = cell.u[uid::ADV] / den;
    }

    /// Recompute conservatives from primitives on every interior cell.
    pub fn global_u_from_q(&mut self) {
        let nd = self.grid.nd;
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            Self::u_from_q(self.grid.cell_mut(id), nd);
        }
    }

    /// Recompute primitives from conservatives on every interior cell.
    pub fn global_q_from_u(&mut self) {
        let nd = self.grid.nd;
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            Self::q_from_u(self.grid.cell_mut(id), nd);
        }
    }

    /// Save the conservative state, for the predictor half of the
    /// predictor/corrector hydro step.
    pub fn global_w_from_u(&mut self) {
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            let cell = self.grid.cell_mut(id);
            cell.w = cell.u;
        }
    }

    /// Restore the conservative state saved by `global_w_from_u`.
    pub fn global_u_from_w(&mut self) {
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            let cell = self.grid.cell_mut(id);
            cell.u = cell.w;
        }
    }

    /// Clamp primitives to the floors: density, pressure, the temperature
    /// floor (global or per-cell, whichever is higher), and tracer
    /// fractions to [0, 1].
    pub fn fix_primitives(&mut self) {
        let (dfloor, pfloor, tfloor) = (self.dfloor, self.pfloor, self.tfloor);
        let (xh, rs) = (self.mass_fraction_h, self.specific_gas_constant);
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            let cell = self.grid.cell_mut(id);
            if cell.q[uid::DEN] < dfloor {
                cell.q[uid::DEN] = dfloor;
            }
            cell.q[uid::HII] = cell.q[uid::HII].clamp(0.0, 1.0);
            cell.q[uid::ADV] = cell.q[uid::ADV].clamp(0.0, 1.0);

            let mu_inv = xh * (cell.q[uid::HII] + 1.0) + (1.0 - xh) * 0.25;
            let temp2pre = mu_inv * rs * cell.q[uid::DEN];
            let floor = pfloor.max(cell.t_min.max(tfloor) * temp2pre);
            if cell.q[uid::PRE] < floor {
                cell.q[uid::PRE] = floor;
            }
        }
    }

    /// Advance the conservative state by `dt` along the accumulated time
    /// derivative, then clear the derivative.
    pub fn adv_solution(&mut self, dt: f64) {
        for n in 0..self.grid.grid_cells().len() {
            let id = self.grid.grid_cells()[n];
            let cell = self.grid.cell_mut(id);
            for i in 0..uid::N {
                cell.u[i] += cell.udot[i] * dt;
                cell.udot[i] = 0.0;
            }
        }
    }

    /// Re-derive primitives, apply the floors, and push the repaired state
    /// back into the conservatives.
    pub fn fix_solution(&mut self) {
        self.global_q_from_u();
        self.fix_primitives();
        self.global_u_from_q();
    }
}
