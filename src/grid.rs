//! The per-rank slab of the Cartesian mesh: cell storage, iteration orders,
//! and the ray geometry (path lengths and upstream neighbour weights) used
//! by the column-density sweep. Each rank owns a contiguous range of the
//! x-axis plus one ghost plane on either face.

use crate::star::Star;

/// Indices into the primitive (`q`) and conservative (`u`) state vectors.
/// The same slots are used for both: in `u`, `PRE` holds the total energy
/// density and `HII`/`ADV` hold density-weighted tracers.
pub mod uid {
    pub const DEN: usize = 0;
    pub const PRE: usize = 1;
    pub const HII: usize = 2;
    pub const ADV: usize = 3;
    pub const VEL: usize = 4;
    pub const N: usize = 7;
}

/// Indices into the thermodynamic workspace `t`.
pub mod tid {
    pub const HEAT: usize = 0;
    pub const RATE: usize = 1;
    pub const COL_DEN: usize = 2;
    pub const DCOL_DEN: usize = 3;
    pub const N: usize = 4;
}

/// Indices into the per-process heating/cooling breakdown `h`, kept for
/// diagnostic output only.
pub mod hid {
    pub const FUVH: usize = 0;
    pub const IRH: usize = 1;
    pub const CRH: usize = 2;
    pub const IMLC: usize = 3;
    pub const NMLC: usize = 4;
    pub const CEHI: usize = 5;
    pub const CIEC: usize = 6;
    pub const NMC: usize = 7;
    pub const RHII: usize = 8;
    pub const EUVH: usize = 9;
    pub const TOT: usize = 10;
    pub const N: usize = 11;
}




/**
 * The per-cell record. Primitive and conservative state, the thermodynamic
 * workspace written by the ray tracer and the source-term integrator, and
 * the upstream neighbour topology toward the star.
 */
#[derive(Clone, Debug)]
pub struct GridCell {
    pub q: [f64; uid::N],
    pub u: [f64; uid::N],
    pub udot: [f64; uid::N],

    /// Saved copy of `u`, used by the predictor/corrector hydro step.
    pub w: [f64; uid::N],

    pub t: [f64; tid::N],
    pub h: [f64; hid::N],

    /// Body-force acceleration, in code units.
    pub grav: [f64; 3],

    /// Cell centre in global index coordinates.
    pub xc: [f64; 3],

    /// Path length of the stellar sight-line across this cell.
    pub ds: f64,

    pub heat_capacity_ratio: f64,

    /// The up-to-four upstream neighbours toward the star; -1 means absent.
    pub neighbour_ids: [i64; 4],
    pub neighbour_weights: [f64; 4],

    /// Per-cell temperature floor [K], set once at initialisation.
    pub t_min: f64,
}




// ============================================================================
impl GridCell {
    fn new(xc: [f64; 3]) -> Self {
        Self {
            q: [0.0; uid::N],
            u: [0.0; uid::N],
            udot: [0.0; uid::N],
            w: [0.0; uid::N],
            t: [0.0; tid::N],
            h: [0.0; hid::N],
            grav: [0.0; 3],
            xc,
            ds: 0.0,
            heat_capacity_ratio: 5.0 / 3.0,
            neighbour_ids: [-1; 4],
            neighbour_weights: [0.0; 4],
            t_min: 0.0,
        }
    }
}




/**
 * The slab of cells owned by one rank, plus one ghost plane on each x-face.
 * Ghost planes adjacent to a peer rank are partition cells filled by
 * message exchange; ghost planes on the domain boundary are filled by the
 * boundary condition. Iteration orders over the interior are precomputed:
 * the causal orders visit cells from the star outward, so that a cell's
 * upstream neighbours are always up to date when it is reached.
 */
pub struct Grid {
    cells: Vec<GridCell>,

    pub nd: usize,

    /// Global cell counts per axis (unused axes have extent 1).
    pub ncells: [usize; 3],

    /// Cell size per axis, in code units.
    pub dx: [f64; 3],

    pub current_time: f64,
    pub delta_time: f64,

    pub rank: usize,
    pub num_ranks: usize,

    /// Global x-range of the interior owned by this rank: [x_start, x_end).
    pub x_start: usize,
    pub x_end: usize,

    interior: Vec<usize>,
    causal_wind: Vec<usize>,
    causal_non_wind: Vec<usize>,
    left_partition: Vec<usize>,
    right_partition: Vec<usize>,
}




// ============================================================================
impl Grid {

    /// Build the slab owned by `rank` of a global grid with `ncells` zones
    /// per axis and a physical side length (code units) along x.
    pub fn new(nd: usize, ncells: [usize; 3], side_length: f64, rank: usize, num_ranks: usize) -> Self {
        assert!(nd >= 1 && nd <= 3);
        assert!(ncells[0] >= num_ranks, "more ranks than x-zones");

        let dx0 = side_length / ncells[0] as f64;
        let x_start = rank * ncells[0] / num_ranks;
        let x_end = (rank + 1) * ncells[0] / num_ranks;
        let (ny, nz) = (ncells[1], ncells[2]);

        let mut cells = Vec::with_capacity((x_end - x_start + 2) * ny * nz);
        for ix in (x_start as i64 - 1)..(x_end as i64 + 1) {
            for iy in 0..ny {
                for iz in 0..nz {
                    cells.push(GridCell::new([ix as f64, iy as f64, iz as f64]));
                }
            }
        }

        let mut grid = Self {
            cells,
            nd,
            ncells,
            dx: [dx0; 3],
            current_time: 0.0,
            delta_time: 0.0,
            rank,
            num_ranks,
            x_start,
            x_end,
            interior: Vec::new(),
            causal_wind: Vec::new(),
            causal_non_wind: Vec::new(),
            left_partition: Vec::new(),
            right_partition: Vec::new(),
        };
        grid.build_orders();
        grid
    }

    fn build_orders(&mut self) {
        let (ny, nz) = (self.ncells[1], self.ncells[2]);
        self.interior.clear();
        for ix in self.x_start..self.x_end {
            for iy in 0..ny {
                for iz in 0..nz {
                    self.interior.push(self.id_of(ix as i64, iy, iz));
                }
            }
        }
        self.left_partition.clear();
        self.right_partition.clear();
        if self.rank > 0 {
            for iy in 0..ny {
                for iz in 0..nz {
                    self.left_partition.push(self.id_of(self.x_start as i64 - 1, iy, iz));
                }
            }
        }
        if self.rank + 1 < self.num_ranks {
            for iy in 0..ny {
                for iz in 0..nz {
                    self.right_partition.push(self.id_of(self.x_end as i64, iy, iz));
                }
            }
        }
    }

    fn id_of(&self, ix: i64, iy: usize, iz: usize) -> usize {
        let (ny, nz) = (self.ncells[1], self.ncells[2]);
        let ix_ext = (ix - (self.x_start as i64 - 1)) as usize;
        (ix_ext * ny + iy) * nz + iz
    }

    /// Map global index coordinates into a local cell id, or None when the
    /// coordinates fall outside this rank's extended slab.
    pub fn global_to_id(&self, ix: i64, iy: i64, iz: i64) -> Option<usize> {
        if ix < self.x_start as i64 - 1 || ix >= self.x_end as i64 + 1 {
            return None;
        }
        if iy < 0 || iy >= self.ncells[1] as i64 || iz < 0 || iz >= self.ncells[2] as i64 {
            return None;
        }
        Some(self.id_of(ix, iy as usize, iz as usize))
    }

    pub fn cell(&self, id: usize) -> &GridCell {
        &self.cells[id]
    }

    pub fn cell_mut(&mut self, id: usize) -> &mut GridCell {
        &mut self.cells[id]
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// All interior cells, in natural (x, y, z) order.
    pub fn grid_cells(&self) -> &[usize] {
        &self.interior
    }

    /// Wind-region cells in causal (near-to-star-first) order.
    pub fn causal_wind(&self) -> &[usize] {
        &self.causal_wind
    }

    /// Remaining cells in causal order.
    pub fn causal_non_wind(&self) -> &[usize] {
        &self.causal_non_wind
    }

    /// Ghost cells on the left slab face, present when a peer rank owns the
    /// slab to the left.
    pub fn left_partition_cells(&self) -> &[usize] {
        &self.left_partition
    }

    pub fn right_partition_cells(&self) -> &[usize] {
        &self.right_partition
    }

    /// Interior cells adjacent to the left slab face, in the iteration
    /// order of `left_partition_cells`.
    pub fn left_edge_cells(&self) -> Vec<usize> {
        let (ny, nz) = (self.ncells[1], self.ncells[2]);
        let mut ids = Vec::with_capacity(ny * nz);
        for iy in 0..ny {
            for iz in 0..nz {
                ids.push(self.id_of(self.x_start as i64, iy, iz));
            }
        }
        ids
    }

    pub fn right_edge_cells(&self) -> Vec<usize> {
        let (ny, nz) = (self.ncells[1], self.ncells[2]);
        let mut ids = Vec::with_capacity(ny * nz);
        for iy in 0..ny {
            for iz in 0..nz {
                ids.push(self.id_of(self.x_end as i64 - 1, iy, iz));
            }
        }
        ids
    }

    /// Initialise the sight-line geometry toward the star: the path length
    /// `ds` across each cell, the up-to-four upstream neighbours behind the
    /// cell's star-facing face with their bilinear crossing weights, and the
    /// causal iteration orders. Must be called again if the star moves.
    pub fn init_ray_geometry(&mut self, star: &Star) {
        let nd = self.nd;
        let dx0 = self.dx[0];

        for n in 0..self.interior.len() {
            let id = self.interior[n];
            let xc = self.cells[id].xc;

            let mut delta = [0.0; 3];
            for d in 0..nd {
                delta[d] = xc[d] - star.xc[d];
            }

            // Dominant axis of the sight-line.
            let mut m = 0;
            for d in 1..nd {
                if delta[d].abs() > delta[m].abs() {
                    m = d;
                }
            }

            let dm = delta[m].abs();
            let dist = (delta.iter().map(|d| d * d).sum::<f64>()).sqrt();

            let mut ids = [-1i64; 4];
            let mut weights = [0.0f64; 4];

            if dm == 0.0 {
                // The source cell itself has no upstream neighbours.
                self.cells[id].ds = dx0;
            } else {
                self.cells[id].ds = dx0 * dist / dm;

                // The ray enters through the face one step toward the star
                // along the dominant axis. Where it crosses that face picks
                // out up to four cells behind it, weighted bilinearly.
                let mut base = [xc[0] as i64, xc[1] as i64, xc[2] as i64];
                base[m] -= delta[m].signum() as i64;

                let transverse: Vec<usize> = (0..nd).filter(|&d| d != m).collect();
                let mut offs = [0i64; 2];
                let mut fracs = [0.0f64; 2];
                for (k, &t) in transverse.iter().enumerate() {
                    let b = -delta[t] * 0.5 / dm;
                    offs[k] = if b > 0.0 { 1 } else if b < 0.0 { -1 } else { 0 };
                    fracs[k] = b.abs();
                }

                let combos: &[(i64, i64, f64)] = match transverse.len() {
                    0 => &[(0, 0, 1.0)],
                    1 => &[(0, 0, 0.0), (1, 0, 0.0)],
                    _ => &[(0, 0, 0.0), (1, 0, 0.0), (0, 1, 0.0), (1, 1, 0.0)],
                };

                for (slot, &(a, b, unit)) in combos.iter().enumerate() {
                    let mut coords = base;
                    let mut weight = if transverse.is_empty() { unit } else { 1.0 };
                    if let Some(&t1) = transverse.first() {
                        coords[t1] += a * offs[0];
                        weight *= if a == 0 { 1.0 - fracs[0] } else { fracs[0] };
                    }
                    if let Some(&t2) = transverse.get(1) {
                        coords[t2] += b * offs[1];
                        weight *= if b == 0 { 1.0 - fracs[1] } else { fracs[1] };
                    }
                    if weight == 0.0 {
                        continue;
                    }
                    if let Some(nid) = self.global_to_id(coords[0], coords[1], coords[2]) {
                        ids[slot] = nid as i64;
                        weights[slot] = weight;
                    }
                }
            }

            let cell = &mut self.cells[id];
            cell.neighbour_ids = ids;
            cell.neighbour_weights = weights;
        }

        // Causal orders: wind-region cells first, each set sorted from the
        // star outward. Upstream neighbours are strictly closer to the star,
        // so ascending distance is a valid topological order.
        let wind2 = star.wind_cell_radius * star.wind_cell_radius;
        let mut wind: Vec<(f64, usize)> = Vec::new();
        let mut non_wind: Vec<(f64, usize)> = Vec::new();
        for &id in &self.interior {
            let d2 = star.dist_squared(&self.cells[id].xc, nd);
            if d2 <= wind2 {
                wind.push((d2, id));
            } else {
                non_wind.push((d2, id));
            }
        }
        wind.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
        non_wind.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
        self.causal_wind = wind.into_iter().map(|(_, id)| id).collect();
        self.causal_non_wind = non_wind.into_iter().map(|(_, id)| id).collect();
    }
}
