//! The causal column-density sweep. Starting from the star and walking
//! outward, each cell's column density is interpolated from the upstream
//! neighbours its sight-line passes through, so a single pass over the
//! causal orders produces the optical depth to every cell. Across slab
//! boundaries the sweep is stitched together by a ghost-cell handoff that
//! always flows from the star side to the anti-star side.

use crate::fluid::Fluid;
use crate::grid::{tid, uid, Grid};
use crate::message::comm::Communicator;
use crate::partition::{ColumnRecord, PartitionManager, Payload};
use crate::star::Location;
use crate::units::Constants;

/// Squared index radius inside which the column density is pinned to zero.
const WIND_RADIUS_SQUARED: f64 = 0.95 * 0.95;

/// Update one cell's column density from its upstream neighbours. The
/// neighbour contributions are weighted by the crossing weights divided by
/// the neighbour columns (shadowed sight-lines dominate less), normalised
/// over the neighbours present.
fn update_col_den(grid: &mut Grid, id: usize, dist2: f64, hydrogen_mass: f64) {
    let new_col_den = if dist2 > WIND_RADIUS_SQUARED {
        let (neighbour_ids, neighbour_weights) = {
            let cell = grid.cell(id);
            (cell.neighbour_ids, cell.neighbour_weights)
        };

        let mut colden = [0.0f64; 4];
        let mut w_raga = [0.0f64; 4];
        for i in 0..4 {
            if neighbour_ids[i] != -1 {
                let n = grid.cell(neighbour_ids[i] as usize);
                colden[i] = n.t[tid::COL_DEN] + n.t[tid::DCOL_DEN];
            }
            w_raga[i] = if colden[i] == 0.0 {
                0.0
            } else {
                neighbour_weights[i] / colden[i]
            };
        }
        let sum_w: f64 = w_raga.iter().sum();

        let mut value = 0.0;
        if sum_w != 0.0 {
            for i in 0..4 {
                value += w_raga[i] / sum_w * colden[i];
            }
        }
        value
    } else {
        0.0
    };

    let cell = grid.cell_mut(id);
    cell.t[tid::COL_DEN] = new_col_den;
    cell.t[tid::DCOL_DEN] = (cell.q[uid::DEN] / hydrogen_mass) * cell.ds;
}

/// Sweep the whole slab. Receives upstream ghost columns first when the
/// star lives on another rank, then visits wind cells and the rest in
/// causal order, and finally hands the boundary columns onward.
pub fn ray_trace(
    fluid: &mut Fluid,
    partition: &mut PartitionManager,
    client: &dyn Communicator,
    consts: &Constants,
) {
    let rank = client.rank();
    let num_ranks = client.size();
    let star_location = fluid.star.location;

    if star_location != Location::Here {
        let source = match star_location {
            Location::Left => rank - 1,
            _ => rank + 1,
        };
        let records = partition.recv_thermo(client, source);
        let ghosts: Vec<usize> = match star_location {
            Location::Left => fluid.grid.left_partition_cells().to_vec(),
            _ => fluid.grid.right_partition_cells().to_vec(),
        };
        assert_eq!(records.len(), ghosts.len(), "ghost column message length mismatch");
        for (id, record) in ghosts.into_iter().zip(records) {
            let ghost = fluid.grid.cell_mut(id);
            ghost.t[tid::COL_DEN] = record.col_den;
            ghost.t[tid::DCOL_DEN] = record.dcol_den;
        }
    }

    let nd = fluid.grid.nd;
    let order: Vec<usize> = fluid
        .grid
        .causal_wind()
        .iter()
        .chain(fluid.grid.causal_non_wind())
        .copied()
        .collect();
    for id in order {
        let dist2 = fluid.star.dist_squared(&fluid.grid.cell(id).xc, nd);
        update_col_den(&mut fluid.grid, id, dist2, consts.hydrogen_mass);
    }

    // Hand the edge columns onward, away from the star.
    if !(rank == 0 || star_location == Location::Left) {
        let records: Vec<ColumnRecord> = fluid
            .grid
            .left_edge_cells()
            .into_iter()
            .map(|id| {
                let cell = fluid.grid.cell(id);
                ColumnRecord {
                    col_den: cell.t[tid::COL_DEN],
                    dcol_den: cell.t[tid::DCOL_DEN],
                }
            })
            .collect();
        partition.send(client, rank - 1, Payload::Thermo(records));
    }
    if !(rank == num_ranks - 1 || star_location == Location::Right) {
        let records: Vec<ColumnRecord> = fluid
            .grid
            .right_edge_cells()
            .into_iter()
            .map(|id| {
                let cell = fluid.grid.cell(id);
                ColumnRecord {
                    col_den: cell.t[tid::COL_DEN],
                    dcol_den: cell.t[tid::DCOL_DEN],
                }
            })
            .collect();
        partition.send(client, rank + 1, Payload::Thermo(records));
    }
}
