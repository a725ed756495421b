//! Snapshot output. The run loop asks the checkpointer when the next dump
//! is due and clamps the step so it never overshoots a dump time; the
//! writers serialize per-rank CBOR files that post-processing stitches
//! together.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::fluid::Fluid;
use crate::grid::{hid, tid, uid};
use crate::units::Constants;

/**
 * Tracks evenly spaced dump times over the run and clamps the step size
 * against the next one.
 */
pub struct Checkpointer {
    interval: f64,
    next_time: f64,
    count: usize,
    ncheckpoints: usize,
}




// ============================================================================
impl Checkpointer {

    pub fn new(tmax: f64, ncheckpoints: usize) -> Self {
        let interval = tmax / ncheckpoints.max(1) as f64;
        Self {
            interval,
            next_time: 0.0,
            count: 0,
            ncheckpoints,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn ncheckpoints(&self) -> usize {
        self.ncheckpoints
    }

    /// Advance past any dump time reached by `time`. Returns whether a dump
    /// is due now, and the largest step that will not overshoot the next
    /// dump time.
    pub fn update(&mut self, time: f64, dt_max: f64) -> (bool, f64) {
        let mut due = false;
        while time >= self.next_time && self.count <= self.ncheckpoints {
            self.count += 1;
            self.next_time += self.interval;
            due = true;
        }
        let dt_next = (self.next_time - time).min(dt_max).max(0.0);
        (due, dt_next)
    }
}




/// One cell of a solution snapshot, in CGS.
#[derive(Serialize)]
struct CellRecord {
    xc: [f64; 3],
    den: f64,
    pre: f64,
    hii: f64,
    adv: f64,
    vel: [f64; 3],
    temperature: f64,
    col_den: f64,
}

#[derive(Serialize)]
struct Snapshot {
    time: f64,
    rank: usize,
    cells: Vec<CellRecord>,
}

/// One cell of a heating diagnostic dump: the per-process rate breakdown,
/// in code units.
#[derive(Serialize)]
struct HeatingRecord {
    xc: [f64; 3],
    rates: [f64; hid::N],
}

#[derive(Serialize)]
struct HeatingDump {
    time: f64,
    rank: usize,
    cells: Vec<HeatingRecord>,
}

fn write_cbor<T: Serialize>(path: &Path, value: &T) -> Result<(), std::io::Error> {
    let file = File::create(path)?;
    let mut buffer = BufWriter::new(file);
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

pub fn format_suffix(i: usize) -> String {
    format!("{:06}", i)
}

/// Write the primitive solution, converted back to CGS.
pub fn write_snapshot(
    directory: &str,
    suffix: &str,
    time: f64,
    rank: usize,
    fluid: &Fluid,
    consts: &Constants,
) -> Result<(), std::io::Error> {
    let conv = &consts.converter;
    let cells = fluid
        .grid
        .grid_cells()
        .iter()
        .map(|&id| {
            let cell = fluid.grid.cell(id);
            let mut vel = [0.0; 3];
            for k in 0..consts.nd {
                vel[k] = conv.from_code_units(cell.q[uid::VEL + k], 0.0, 1.0, -1.0);
            }
            CellRecord {
                xc: cell.xc,
                den: conv.from_code_units(cell.q[uid::DEN], 1.0, -3.0, 0.0),
                pre: conv.from_code_units(cell.q[uid::PRE], 1.0, -1.0, -2.0),
                hii: cell.q[uid::HII],
                adv: cell.q[uid::ADV],
                vel,
                temperature: fluid.calc_temperature(
                    cell.q[uid::HII],
                    cell.q[uid::PRE],
                    cell.q[uid::DEN],
                ),
                col_den: conv.from_code_units(cell.t[tid::COL_DEN], 0.0, -2.0, 0.0),
            }
        })
        .collect();
    let snapshot = Snapshot {
        time: conv.from_code_units(time, 0.0, 0.0, 1.0),
        rank,
        cells,
    };
    let path = Path::new(directory).join(format!("snap_{}_r{}.cbor", suffix, rank));
    write_cbor(&path, &snapshot)
}

/// Write the per-process heating/cooling breakdown.
pub fn write_heating(
    directory: &str,
    suffix: &str,
    time: f64,
    rank: usize,
    fluid: &Fluid,
    consts: &Constants,
) -> Result<(), std::io::Error> {
    let cells = fluid
        .grid
        .grid_cells()
        .iter()
        .map(|&id| {
            let cell = fluid.grid.cell(id);
            HeatingRecord {
                xc: cell.xc,
                rates: cell.h,
            }
        })
        .collect();
    let dump = HeatingDump {
        time: consts.converter.from_code_units(time, 0.0, 0.0, 1.0),
        rank,
        cells,
    };
    let path = Path::new(directory).join(format!("heat_{}_r{}.cbor", suffix, rank));
    write_cbor(&path, &dump)
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn checkpointer_spaces_dumps_evenly() {
        let mut cp = Checkpointer::new(10.0, 5);
        // Time zero is itself a dump.
        let (due, dt) = cp.update(0.0, 100.0);
        assert!(due);
        assert_eq!(cp.count(), 1);
        assert_eq!(dt, 2.0);

        let (due, dt) = cp.update(1.0, 100.0);
        assert!(!due);
        assert_eq!(dt, 1.0);

        let (due, _) = cp.update(2.0, 100.0);
        assert!(due);
        assert_eq!(cp.count(), 2);
    }

    #[test]
    fn step_is_clamped_by_dt_max_far_from_a_dump() {
        let mut cp = Checkpointer::new(10.0, 5);
        cp.update(0.0, 100.0);
        let (_, dt) = cp.update(0.5, 0.25);
        assert_eq!(dt, 0.25);
    }

    #[test]
    fn a_long_stall_consumes_multiple_dumps_at_once() {
        let mut cp = Checkpointer::new(10.0, 5);
        cp.update(0.0, 100.0);
        let (due, _) = cp.update(7.0, 100.0);
        assert!(due);
        assert_eq!(cp.count(), 4);
    }
}
