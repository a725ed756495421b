//! Per-process heating and cooling rates, following the atomic and PDR
//! fits of Henney et al. (2009). Every function is pure in the local cell
//! state; the coefficients are dimensioned CGS values converted to code
//! units once at construction.

use crate::spline::{LinearSplineData, LogSplineData};
use crate::thermo::tables;
use crate::units::{Constants, Converter};

/// Metallicity scale of the metal line coolants.
const Z0: f64 = 5.0e-4;

/// Width [K] of the soft-landing ramp above the temperature floor.
const SOFT_LANDING_BAND: f64 = 200.0;

pub struct Microphysics {
    t1: f64,
    t2: f64,
    t3: f64,
    t4: f64,
    imlc: f64,
    nmlc: f64,
    ciec_min_t: f64,
    ciec: f64,
    cxhi_damp: f64,
    n0: f64,
    nmc: f64,
    fuvh_a: f64,
    fuvh_b: f64,
    fuvh_c: f64,
    irh_a: f64,
    irh_b: f64,
    crh: f64,
    boltzmann: f64,
    pi: f64,
    cehi_rates: LogSplineData,
    rhii_rates: LinearSplineData,
}




// ============================================================================
impl Microphysics {

    pub fn new(consts: &Constants) -> Self {
        let conv: &Converter = &consts.converter;
        Self {
            t1: 33610.0,
            t2: 2180.0,
            t3: 28390.0,
            t4: 1780.0,
            imlc: conv.to_code_units(2.905e-19, 1.0, 5.0, -3.0),
            nmlc: conv.to_code_units(4.477e-20, 1.0, 5.0, -3.0),
            ciec_min_t: 5.0e4,
            ciec: conv.to_code_units(3.485e-15, 1.0, 5.0, -3.0),
            cxhi_damp: 5.0e5,
            n0: conv.to_code_units(1.0e6, 0.0, -3.0, 0.0),
            nmc: conv.to_code_units(3.981e-27, 1.0, 3.8, -3.0),
            fuvh_a: conv.to_code_units(1.9e-26, 1.0, 4.0, -2.0),
            fuvh_b: conv.to_code_units(1.0, 0.0, 0.0, -1.0),
            fuvh_c: conv.to_code_units(6.4, 0.0, -1.0, 0.0),
            irh_a: conv.to_code_units(7.7e-32, 1.0, 4.0, -2.0),
            irh_b: conv.to_code_units(3.0e4, 0.0, -3.0, 0.0),
            crh: conv.to_code_units(5.0e-27, 1.0, 2.0, -3.0),
            boltzmann: consts.boltzmann,
            pi: consts.pi,
            cehi_rates: tables::collisional_excitation_hi(conv),
            rhii_rates: tables::recombination_hii(conv),
        }
    }

    /// FUV photon flux at a squared distance from the source.
    pub fn flux_fuv(&self, q_fuv: f64, dist_sqrd: f64) -> f64 {
        if dist_sqrd != 0.0 {
            q_fuv / (1.2e7 * 4.0 * self.pi * dist_sqrd)
        } else {
            0.0
        }
    }

    /// Collisionally excited optical lines of ionised metals (eq. A9).
    pub fn ionised_metal_line_cooling(&self, ne: f64, t: f64) -> f64 {
        self.imlc * Z0 * ne * ne * (-self.t1 / t - (self.t2 / t) * (self.t2 / t)).exp()
    }

    /// Collisionally excited lines of neutral metals (eq. A10).
    pub fn neutral_metal_line_cooling(&self, ne: f64, nn: f64, t: f64) -> f64 {
        self.nmlc * Z0 * ne * nn * (-self.t3 / t - (self.t4 / t) * (self.t4 / t)).exp()
    }

    /// Collisional ionisation equilibrium cooling curve (eq. A13), brought
    /// in over a 20,000 K linear ramp above its 5e4 K threshold.
    pub fn collisional_ionisation_equilibrium_cooling(&self, ne: f64, t: f64) -> f64 {
        if t > self.ciec_min_t {
            let cie_rate = self.ciec
                * ne
                * ne
                * Z0
                * (-0.63 * t.ln()).exp()
                * (1.0 - (-(1.0e-5 * t).powf(1.63)).exp());
            let smoothing = 1.0f64.min((t - 5.0e4) / 2.0e4);
            cie_rate * smoothing
        } else {
            0.0
        }
    }

    /// Neutral and molecular cooling from CLOUDY PDR models (eq. A14).
    pub fn neutral_molecular_line_cooling(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let t0 = 70.0 + 220.0 * (nh / self.n0).powf(0.2);
        self.nmc * (1.0 - hiifrac) * (1.0 - hiifrac) * nh.powf(1.6) * t.sqrt() * (-t0 / t).exp()
    }

    /// Collisionally excited lines of neutral hydrogen. The tabulated curve
    /// is fit in log-log space, so the interpolant returns log10(rate); the
    /// gaussian factor damps the fit's high-temperature tail.
    pub fn collisional_excitation_hi(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let rate = self.cehi_rates.interpolate(t.log10());
        hiifrac
            * (1.0 - hiifrac)
            * nh
            * nh
            * (std::f64::consts::LN_10 * rate - (t / self.cxhi_damp) * (t / self.cxhi_damp)).exp()
    }

    /// Free-free and free-bound transitions of ionised hydrogen (eq. A11).
    pub fn recombination_hii(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let rate = self.rhii_rates.interpolate(t);
        hiifrac * hiifrac * nh * nh * self.boltzmann * t * rate
    }

    /// FUV heating by dust-grain photoelectrons (eq. A3).
    pub fn far_ultra_violet_heating(&self, nh: f64, av_fuv: f64, f_fuv: f64) -> f64 {
        let attenuated = f_fuv * (-1.9 * av_fuv).exp();
        self.fuvh_a * nh * attenuated / (self.fuvh_b + self.fuvh_c * attenuated / nh)
    }

    /// Heating by reprocessed stellar radiation in dense gas (eq. A6).
    pub fn infra_red_heating(&self, nh: f64, av_fuv: f64, f_fuv: f64) -> f64 {
        self.irh_a
            * nh
            * f_fuv
            * (-0.05 * av_fuv).exp()
            * (-2.0 * (1.0 + self.irh_b / nh).ln()).exp()
    }

    /// Cosmic ray heating (eq. A7), scaled 10x to stand in for the absent
    /// X-ray term.
    pub fn cosmic_ray_heating(&self, nh: f64) -> f64 {
        self.crh * nh
    }

    /// "Soft landing" to the equilibrium neutral gas temperature: a net
    /// cooling rate is ramped off linearly over the band above the floor
    /// and suppressed entirely at or below it.
    pub fn soft_landing(&self, rate: f64, t: f64, t_min: f64) -> f64 {
        if rate < 0.0 {
            if t <= t_min {
                0.0
            } else if t <= t_min + SOFT_LANDING_BAND {
                rate * (t - t_min) / SOFT_LANDING_BAND
            } else {
                rate
            }
        } else {
            rate
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::units::{Constants, Converter};

    fn micro() -> Microphysics {
        Microphysics::new(&Constants::new(Converter::identity(), 3))
    }

    #[test]
    fn cooling_rates_vanish_without_their_driving_species() {
        let m = micro();
        let t = 8000.0;
        assert_eq!(m.ionised_metal_line_cooling(0.0, t), 0.0);
        assert_eq!(m.neutral_metal_line_cooling(0.0, 50.0, t), 0.0);
        assert_eq!(m.neutral_metal_line_cooling(50.0, 0.0, t), 0.0);
        // A fully ionised or fully neutral cell has no H I excitation losses.
        assert_eq!(m.collisional_excitation_hi(50.0, 1.0, t), 0.0);
        assert_eq!(m.collisional_excitation_hi(50.0, 0.0, t), 0.0);
        assert_eq!(m.recombination_hii(0.0, 1.0, t), 0.0);
        assert_eq!(m.neutral_molecular_line_cooling(0.0, 0.0, t), 0.0);
    }

    #[test]
    fn cooling_rates_are_non_negative() {
        let m = micro();
        for &t in &[200.0, 5000.0, 3.0e4, 2.0e5, 8.0e5] {
            assert!(m.ionised_metal_line_cooling(10.0, t) >= 0.0);
            assert!(m.neutral_metal_line_cooling(10.0, 10.0, t) >= 0.0);
            assert!(m.collisional_ionisation_equilibrium_cooling(10.0, t) >= 0.0);
            assert!(m.neutral_molecular_line_cooling(20.0, 0.5, t) >= 0.0);
            assert!(m.collisional_excitation_hi(20.0, 0.5, t) >= 0.0);
            assert!(m.recombination_hii(20.0, 0.5, t) >= 0.0);
        }
    }

    #[test]
    fn heating_rates_are_non_negative_and_scale_with_density() {
        let m = micro();
        assert!(m.far_ultra_violet_heating(10.0, 0.5, 1e-6) > 0.0);
        assert!(m.infra_red_heating(10.0, 0.5, 1e-6) > 0.0);
        assert!(m.cosmic_ray_heating(10.0) > 0.0);
        assert_eq!(m.far_ultra_violet_heating(10.0, 0.0, 0.0), 0.0);
        assert!((m.cosmic_ray_heating(20.0) / m.cosmic_ray_heating(10.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ciec_switches_on_over_the_smoothing_band() {
        let m = micro();
        let ne = 10.0;
        assert_eq!(m.collisional_ionisation_equilibrium_cooling(ne, 5.0e4), 0.0);
        assert!(m.collisional_ionisation_equilibrium_cooling(ne, 5.0e4 + 1.0) > 0.0);

        // At 7e4 K the ramp saturates: the rate is continuous there and
        // matches the unramped curve.
        let just_below = m.collisional_ionisation_equilibrium_cooling(ne, 7.0e4 - 1e-3);
        let just_above = m.collisional_ionisation_equilibrium_cooling(ne, 7.0e4 + 1e-3);
        assert!((just_below / just_above - 1.0).abs() < 1e-4);
    }

    #[test]
    fn soft_landing_ramps_cooling_off_near_the_floor() {
        let m = micro();
        let t_min = 100.0;
        // At or below the floor no further cooling is allowed.
        assert_eq!(m.soft_landing(-3.0, t_min, t_min), 0.0);
        assert_eq!(m.soft_landing(-3.0, t_min - 50.0, t_min), 0.0);
        // Fifty kelvin into the 200 K band keeps a quarter of the rate.
        assert!((m.soft_landing(-3.0, t_min + 50.0, t_min) + 0.75).abs() < 1e-12);
        // Heating always passes through.
        assert_eq!(m.soft_landing(3.0, t_min - 50.0, t_min), 3.0);
        assert_eq!(m.soft_landing(-3.0, t_min + 500.0, t_min), -3.0);
    }

    #[test]
    fn flux_fuv_follows_inverse_square() {
        let m = micro();
        let near = m.flux_fuv(1.0, 1.0);
        let far = m.flux_fuv(1.0, 4.0);
        assert!((near / far - 4.0).abs() < 1e-12);
        assert_eq!(m.flux_fuv(1.0, 0.0), 0.0);
    }
}
