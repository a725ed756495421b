//! The compressible-gas component: a finite-volume flux-difference update
//! on the slab, with ghost-plane exchange across rank boundaries and
//! zero-gradient outer boundaries. Tracers (the ionisation fraction and
//! the advected thermodynamics gate) ride on the upwinded mass flux.

pub mod euler;

use log::warn;

use crate::fluid::Fluid;
use crate::geometry::Direction;
use crate::grid::uid;
use crate::hydro::euler::{riemann_hlle, riemann_hllc, Primitive};
use crate::message::comm::Communicator;
use crate::partition::{PartitionManager, Payload};

/// The closed set of face flux solvers. An unrecognised name in the
/// parameter file falls back to HLLE with a warning rather than stopping
/// the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiemannSolver {
    Hlle,
    Hllc,
}

impl RiemannSolver {
    pub fn from_name(name: &str) -> Self {
        match name {
            "hlle" => RiemannSolver::Hlle,
            "hllc" => RiemannSolver::Hllc,
            other => {
                warn!("unknown riemann solver '{}', falling back to hlle", other);
                RiemannSolver::Hlle
            }
        }
    }
}




pub struct Hydrodynamics {
    solver: RiemannSolver,
    cfl: f64,
}




// ============================================================================
impl Hydrodynamics {

    pub fn new(solver: RiemannSolver) -> Self {
        Self { solver, cfl: 0.3 }
    }

    pub fn component_name(&self) -> &'static str {
        "hydrodynamics"
    }

    /// Exchange ghost-plane primitives with the neighbouring ranks and fill
    /// the outer-boundary ghost planes by zero-gradient extrapolation.
    pub fn pre_time_step_calculations(
        &self,
        fluid: &mut Fluid,
        partition: &mut PartitionManager,
        client: &dyn Communicator,
    ) {
        let rank = client.rank();
        let num_ranks = client.size();

        let gather = |fluid: &Fluid, ids: &[usize]| -> Vec<[f64; uid::N]> {
            ids.iter().map(|&id| fluid.grid.cell(id).q).collect()
        };

        if rank > 0 {
            let records = gather(fluid, &fluid.grid.left_edge_cells());
            partition.send(client, rank - 1, Payload::Hydro(records));
        }
        if rank + 1 < num_ranks {
            let records = gather(fluid, &fluid.grid.right_edge_cells());
            partition.send(client, rank + 1, Payload::Hydro(records));
        }

        if rank > 0 {
            let records = partition.recv_hydro(client, rank - 1);
            let ghosts = fluid.grid.left_partition_cells().to_vec();
            for (id, q) in ghosts.into_iter().zip(records) {
                fluid.grid.cell_mut(id).q = q;
            }
        }
        if rank + 1 < num_ranks {
            let records = partition.recv_hydro(client, rank + 1);
            let ghosts = fluid.grid.right_partition_cells().to_vec();
            for (id, q) in ghosts.into_iter().zip(records) {
                fluid.grid.cell_mut(id).q = q;
            }
        }

        // Outer x-boundaries: copy the edge plane outward.
        if rank == 0 {
            let edge = fluid.grid.left_edge_cells();
            for id in edge {
                let q = fluid.grid.cell(id).q;
                let xc = fluid.grid.cell(id).xc;
                if let Some(ghost) =
                    fluid
                        .grid
                        .global_to_id(xc[0] as i64 - 1, xc[1] as i64, xc[2] as i64)
                {
                    fluid.grid.cell_mut(ghost).q = q;
                }
            }
        }
        if rank == num_ranks - 1 {
            let edge = fluid.grid.right_edge_cells();
            for id in edge {
                let q = fluid.grid.cell(id).q;
                let xc = fluid.grid.cell(id).xc;
                if let Some(ghost) =
                    fluid
                        .grid
                        .global_to_id(xc[0] as i64 + 1, xc[1] as i64, xc[2] as i64)
                {
                    fluid.grid.cell_mut(ghost).q = q;
                }
            }
        }
    }

    fn face_flux(&self, ql: &[f64; uid::N], qr: &[f64; uid::N], direction: Direction, gamma: f64) -> [f64; uid::N] {
        let pl = Primitive {
            density: ql[uid::DEN],
            velocity: [ql[uid::VEL], ql[uid::VEL + 1], ql[uid::VEL + 2]],
            pressure: ql[uid::PRE],
        };
        let pr = Primitive {
            density: qr[uid::DEN],
            velocity: [qr[uid::VEL], qr[uid::VEL + 1], qr[uid::VEL + 2]],
            pressure: qr[uid::PRE],
        };
        let f = match self.solver {
            RiemannSolver::Hlle => riemann_hlle(pl, pr, direction, gamma),
            RiemannSolver::Hllc => riemann_hllc(pl, pr, direction, gamma),
        };

        let mut flux = [0.0; uid::N];
        flux[uid::DEN] = f.density;
        flux[uid::VEL] = f.momentum[0];
        flux[uid::VEL + 1] = f.momentum[1];
        flux[uid::VEL + 2] = f.momentum[2];
        flux[uid::PRE] = f.energy;

        // Tracers ride on the upwinded mass flux.
        let upwind = if f.density >= 0.0 { ql } else { qr };
        flux[uid::HII] = upwind[uid::HII] * f.density;
        flux[uid::ADV] = upwind[uid::ADV] * f.density;
        flux
    }

    /// The primitive state of the neighbour one step along `axis`, clamped
    /// to the domain on the undecomposed axes (zero-gradient).
    fn neighbour_q(fluid: &Fluid, xc: &[f64; 3], axis: usize, step: i64) -> [f64; uid::N] {
        let mut ix = xc[0] as i64;
        let mut iy = xc[1] as i64;
        let mut iz = xc[2] as i64;
        match axis {
            0 => ix += step,
            1 => iy = (iy + step).clamp(0, fluid.grid.ncells[1] as i64 - 1),
            _ => iz = (iz + step).clamp(0, fluid.grid.ncells[2] as i64 - 1),
        }
        let id = fluid
            .grid
            .global_to_id(ix, iy, iz)
            .expect("flux neighbour outside the extended slab");
        fluid.grid.cell(id).q
    }

    /// Accumulate the flux-difference time derivative on every interior
    /// cell from the current primitives. The ghost planes are refreshed
    /// first, so the fluxes always see the neighbour state matching the
    /// primitives of this sub-step.
    pub fn integrate(
        &self,
        _dt: f64,
        fluid: &mut Fluid,
        partition: &mut PartitionManager,
        client: &dyn Communicator,
    ) {
        self.pre_time_step_calculations(fluid, partition, client);

        let nd = fluid.grid.nd;
        let order: Vec<usize> = fluid.grid.grid_cells().to_vec();

        for id in order {
            let (q, xc, gamma) = {
                let cell = fluid.grid.cell(id);
                (cell.q, cell.xc, cell.heat_capacity_ratio)
            };

            let mut dudt = [0.0; uid::N];
            for axis in 0..nd {
                let direction = Direction::from_axis(axis);
                let dx = fluid.grid.dx[axis];
                let qm = Self::neighbour_q(fluid, &xc, axis, -1);
                let qp = Self::neighbour_q(fluid, &xc, axis, 1);
                let fm = self.face_flux(&qm, &q, direction, gamma);
                let fp = self.face_flux(&q, &qp, direction, gamma);
                for i in 0..uid::N {
                    dudt[i] -= (fp[i] - fm[i]) / dx;
                }
            }

            let cell = fluid.grid.cell_mut(id);
            for i in 0..uid::N {
                cell.udot[i] += dudt[i];
            }
        }
    }

    /// Body-force sources: gravity enters the momentum and energy
    /// derivatives.
    pub fn update_source_terms(&self, _dt: f64, fluid: &mut Fluid) {
        let nd = fluid.grid.nd;
        let order: Vec<usize> = fluid.grid.grid_cells().to_vec();
        for id in order {
            let cell = fluid.grid.cell_mut(id);
            let den = cell.q[uid::DEN];
            for k in 0..nd {
                cell.udot[uid::VEL + k] += den * cell.grav[k];
                cell.udot[uid::PRE] += den * cell.q[uid::VEL + k] * cell.grav[k];
            }
        }
    }

    /// CFL limit over the slab.
    pub fn calculate_time_step(&self, dt_max: f64, fluid: &Fluid) -> f64 {
        let nd = fluid.grid.nd;
        let mut dt = dt_max;
        for &id in fluid.grid.grid_cells() {
            let cell = fluid.grid.cell(id);
            let p = Primitive {
                density: cell.q[uid::DEN],
                velocity: [cell.q[uid::VEL], cell.q[uid::VEL + 1], cell.q[uid::VEL + 2]],
                pressure: cell.q[uid::PRE],
            };
            let signal = p.max_signal_speed(cell.heat_capacity_ratio);
            if signal > 0.0 {
                for axis in 0..nd {
                    let candidate = self.cfl * fluid.grid.dx[axis] / signal;
                    if candidate < dt {
                        dt = candidate;
                    }
                }
            }
        }
        dt
    }
}
