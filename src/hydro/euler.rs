use std::error;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use crate::geometry::Direction;

/**
 * The conserved gas state of one zone: mass density, momentum density per
 * axis, and total energy density.
 */
#[derive(Clone, Copy, Debug)]
pub struct Conserved {
    pub density: f64,
    pub momentum: [f64; 3],
    pub energy: f64,
}

/**
 * The primitive gas state: mass density, velocity per axis, and gas
 * pressure.
 */
#[derive(Clone, Copy, Debug)]
pub struct Primitive {
    pub density: f64,
    pub velocity: [f64; 3],
    pub pressure: f64,
}

/**
 * Primitive recovery failure. Carries the conserved state that produced
 * it, so the offending zone can be dumped alongside the orchestrator's
 * catastrophic-state diagnostics.
 */
#[derive(Clone, Copy, Debug)]
pub enum RecoveryError {
    NegativeMassDensity(Conserved),
    NegativeGasPressure { pressure: f64, state: Conserved },
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            RecoveryError::NegativeMassDensity(state) => {
                write!(fmt, "mass density {} is unphysical in {:?}", state.density, state)
            }
            RecoveryError::NegativeGasPressure { pressure, state } => {
                write!(fmt, "recovered gas pressure {} is negative in {:?}", pressure, state)
            }
        }
    }
}

impl error::Error for RecoveryError {}




// ============================================================================
impl Conserved {

    pub fn momentum_squared(&self) -> f64 {
        self.momentum.iter().map(|m| m * m).sum()
    }

    /// Recover the primitive state, rejecting unphysical inputs with the
    /// state that produced them.
    pub fn to_primitive(&self, gamma_law_index: f64) -> Result<Primitive, RecoveryError> {
        if self.density <= 0.0 {
            return Err(RecoveryError::NegativeMassDensity(*self));
        }
        let velocity = [
            self.momentum[0] / self.density,
            self.momentum[1] / self.density,
            self.momentum[2] / self.density,
        ];
        let kinetic = 0.5 * self.momentum_squared() / self.density;
        let pressure = (self.energy - kinetic) * (gamma_law_index - 1.0);
        if pressure < 0.0 {
            return Err(RecoveryError::NegativeGasPressure { pressure, state: *self });
        }
        Ok(Primitive {
            density: self.density,
            velocity,
            pressure,
        })
    }
}




// ============================================================================
impl Primitive {

    pub fn velocity_squared(&self) -> f64 {
        self.velocity.iter().map(|v| v * v).sum()
    }

    pub fn sound_speed(&self, gamma_law_index: f64) -> f64 {
        (gamma_law_index * self.pressure / self.density).sqrt()
    }

    pub fn max_signal_speed(&self, gamma_law_index: f64) -> f64 {
        self.velocity_squared().sqrt() + self.sound_speed(gamma_law_index)
    }

    /// Slowest and fastest characteristic speeds along `direction`.
    pub fn signal_range(&self, direction: Direction, gamma_law_index: f64) -> (f64, f64) {
        let vn = self.velocity[direction.axis()];
        let cs = self.sound_speed(gamma_law_index);
        (vn - cs, vn + cs)
    }

    pub fn to_conserved(&self, gamma_law_index: f64) -> Conserved {
        Conserved {
            density: self.density,
            momentum: [
                self.density * self.velocity[0],
                self.density * self.velocity[1],
                self.density * self.velocity[2],
            ],
            energy: self.pressure / (gamma_law_index - 1.0)
                + 0.5 * self.density * self.velocity_squared(),
        }
    }

    /// Physical flux through a face normal to `direction`: the conserved
    /// state carried at the normal velocity, plus the pressure terms on
    /// the normal momentum and the energy.
    pub fn flux(&self, direction: Direction, gamma_law_index: f64) -> Conserved {
        let u = self.to_conserved(gamma_law_index);
        let vn = self.velocity[direction.axis()];
        let mut momentum = [
            u.momentum[0] * vn,
            u.momentum[1] * vn,
            u.momentum[2] * vn,
        ];
        momentum[direction.axis()] += self.pressure;
        Conserved {
            density: u.density * vn,
            momentum,
            energy: (u.energy + self.pressure) * vn,
        }
    }
}




// ============================================================================
impl Add<Conserved> for Conserved {
    type Output = Conserved;
    fn add(self, u: Conserved) -> Conserved {
        Conserved {
            density: self.density + u.density,
            momentum: [
                self.momentum[0] + u.momentum[0],
                self.momentum[1] + u.momentum[1],
                self.momentum[2] + u.momentum[2],
            ],
            energy: self.energy + u.energy,
        }
    }
}

impl Sub<Conserved> for Conserved {
    type Output = Conserved;
    fn sub(self, u: Conserved) -> Conserved {
        Conserved {
            density: self.density - u.density,
            momentum: [
                self.momentum[0] - u.momentum[0],
                self.momentum[1] - u.momentum[1],
                self.momentum[2] - u.momentum[2],
            ],
            energy: self.energy - u.energy,
        }
    }
}

impl Mul<f64> for Conserved {
    type Output = Conserved;
    fn mul(self, a: f64) -> Conserved {
        Conserved {
            density: self.density * a,
            momentum: [self.momentum[0] * a, self.momentum[1] * a, self.momentum[2] * a],
            energy: self.energy * a,
        }
    }
}

impl Div<f64> for Conserved {
    type Output = Conserved;
    fn div(self, a: f64) -> Conserved {
        self * (1.0 / a)
    }
}




// ============================================================================
pub fn riemann_hlle(
    pl: Primitive,
    pr: Primitive,
    direction: Direction,
    gamma_law_index: f64,
) -> Conserved {
    let (left_m, left_p) = pl.signal_range(direction, gamma_law_index);
    let (right_m, right_p) = pr.signal_range(direction, gamma_law_index);
    let sr = left_p.max(right_p).max(0.0);
    let sl = left_m.min(right_m).min(0.0);

    let ul = pl.to_conserved(gamma_law_index);
    let ur = pr.to_conserved(gamma_law_index);
    let fl = pl.flux(direction, gamma_law_index);
    let fr = pr.flux(direction, gamma_law_index);

    (fl * sr - fr * sl + (ur - ul) * (sr * sl)) / (sr - sl)
}




// ============================================================================
pub fn riemann_hllc(
    pl: Primitive,
    pr: Primitive,
    direction: Direction,
    gamma_law_index: f64,
) -> Conserved {
    let axis = direction.axis();
    let vl = pl.velocity[axis];
    let vr = pr.velocity[axis];

    let (left_m, left_p) = pl.signal_range(direction, gamma_law_index);
    let (right_m, right_p) = pr.signal_range(direction, gamma_law_index);
    let sl = left_m.min(right_m);
    let sr = left_p.max(right_p);

    if sl >= 0.0 {
        return pl.flux(direction, gamma_law_index);
    }
    if sr <= 0.0 {
        return pr.flux(direction, gamma_law_index);
    }

    // Contact wave speed (Toro's pressure-based estimate).
    let coef_l = pl.density * (sl - vl);
    let coef_r = pr.density * (sr - vr);
    let sc = (pr.pressure - pl.pressure + coef_l * vl - coef_r * vr) / (coef_l - coef_r);

    let starred = |p: &Primitive, u: &Conserved, s: f64, v: f64, coef: f64| -> Conserved {
        let factor = coef / (s - sc);
        let mut momentum = [
            factor * p.velocity[0],
            factor * p.velocity[1],
            factor * p.velocity[2],
        ];
        momentum[axis] = factor * sc;
        Conserved {
            density: factor,
            momentum,
            energy: factor * (u.energy / p.density + (sc - v) * (sc + p.pressure / coef)),
        }
    };

    if sc >= 0.0 {
        let ul = pl.to_conserved(gamma_law_index);
        pl.flux(direction, gamma_law_index) + (starred(&pl, &ul, sl, vl, coef_l) - ul) * sl
    } else {
        let ur = pr.to_conserved(gamma_law_index);
        pr.flux(direction, gamma_law_index) + (starred(&pr, &ur, sr, vr, coef_r) - ur) * sr
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Direction;

    const GAMMA: f64 = 5.0 / 3.0;

    fn prim(density: f64, vx: f64, pressure: f64) -> Primitive {
        Primitive {
            density,
            velocity: [vx, 0.0, 0.0],
            pressure,
        }
    }

    #[test]
    fn primitive_conserved_round_trip() {
        let p = Primitive {
            density: 1.5,
            velocity: [0.3, -0.2, 0.1],
            pressure: 0.75,
        };
        let q = p.to_conserved(GAMMA).to_primitive(GAMMA).unwrap();
        assert!((q.density - 1.5).abs() < 1e-14);
        assert!((q.velocity[0] - 0.3).abs() < 1e-14);
        assert!((q.velocity[1] + 0.2).abs() < 1e-14);
        assert!((q.pressure - 0.75).abs() < 1e-14);
    }

    #[test]
    fn unphysical_states_are_rejected_with_their_cause() {
        let u = Conserved {
            density: 1.0,
            momentum: [10.0, 0.0, 0.0],
            energy: 1.0,
        };
        match u.to_primitive(GAMMA) {
            Err(RecoveryError::NegativeGasPressure { pressure, .. }) => assert!(pressure < 0.0),
            other => panic!("expected a pressure recovery failure, got {:?}", other),
        }

        let u = Conserved {
            density: -1.0,
            momentum: [0.0; 3],
            energy: 1.0,
        };
        assert!(matches!(
            u.to_primitive(GAMMA),
            Err(RecoveryError::NegativeMassDensity(_))
        ));
    }

    #[test]
    fn resting_uniform_state_only_carries_pressure_flux() {
        let p = prim(1.0, 0.0, 1.0);
        let f = riemann_hlle(p, p, Direction::X, GAMMA);
        assert!(f.density.abs() < 1e-14);
        assert!((f.momentum[0] - 1.0).abs() < 1e-14);
        assert!(f.energy.abs() < 1e-14);
    }

    #[test]
    fn hllc_matches_the_exact_flux_for_a_uniform_moving_state() {
        let p = prim(1.0, 0.5, 1.0);
        let f = riemann_hllc(p, p, Direction::X, GAMMA);
        let exact = p.flux(Direction::X, GAMMA);
        assert!((f.density - exact.density).abs() < 1e-12);
        assert!((f.momentum[0] - exact.momentum[0]).abs() < 1e-12);
        assert!((f.energy - exact.energy).abs() < 1e-12);
    }

    #[test]
    fn supersonic_flow_takes_the_upwind_flux() {
        let pl = prim(1.0, 5.0, 1.0);
        let pr = prim(0.5, 5.0, 0.5);
        let f = riemann_hllc(pl, pr, Direction::X, GAMMA);
        let exact = pl.flux(Direction::X, GAMMA);
        assert!((f.density - exact.density).abs() < 1e-12);
    }
}
