//! Compiled-in atomic rate tabulations. The knot grids and coefficients are
//! a compatibility contract with the published datasets they were digitised
//! from; do not retune them here.

use crate::spline::{LinearSplineData, LogSplineData};
use crate::units::Converter;

/// Temperatures [K] for the collisionally excited H I cooling curve,
/// 10^(3.5 + 0.1 i) for i = 0..26.
const CEHI_TEMPS: [f64; 26] = [
    3162.2776602,
    3981.0717055,
    5011.8723363,
    6309.5734448,
    7943.2823472,
    10000.0000000,
    12589.2541179,
    15848.9319246,
    19952.6231497,
    25118.8643151,
    31622.7766017,
    39810.7170553,
    50118.7233627,
    63095.7344480,
    79432.8234724,
    100000.0000000,
    125892.5411794,
    158489.3192461,
    199526.2314969,
    251188.6431510,
    316227.7660168,
    398107.1705535,
    501187.2336273,
    630957.3444802,
    794328.2347243,
    1000000.0000000,
];

/// Volumetric cooling rates [erg cm^3 / s] matching `CEHI_TEMPS`.
const CEHI_RATES: [f64; 26] = [
    1.150800e-34,
    2.312065e-31,
    9.571941e-29,
    1.132400e-26,
    4.954502e-25,
    9.794900e-24,
    1.035142e-22,
    6.652732e-22,
    2.870781e-21,
    9.036495e-21,
    2.218196e-20,
    4.456562e-20,
    7.655966e-20,
    1.158777e-19,
    1.588547e-19,
    2.013724e-19,
    2.393316e-19,
    2.710192e-19,
    2.944422e-19,
    3.104560e-19,
    3.191538e-19,
    3.213661e-19,
    3.191538e-19,
    3.126079e-19,
    3.033891e-19,
    2.917427e-19,
];

/// Hummer (1994) H II recombination cooling coefficients [cm^3 / s],
/// tabulated at 10^(1 + 0.2 i). Only the first 26 entries are loaded.
const RHII_COEFFS: [f64; 31] = [
    8.287e-11, 7.821e-11, 7.356e-11, 6.892e-11, 6.430e-11, 5.971e-11, 5.515e-11, 5.062e-11,
    4.614e-11, 4.170e-11, 3.734e-11, 3.306e-11, 2.888e-11, 2.484e-11, 2.098e-11, 1.736e-11,
    1.402e-11, 1.103e-11, 8.442e-12, 6.279e-12, 4.539e-12, 3.192e-12, 2.185e-12, 1.458e-12,
    9.484e-13, 6.023e-13, 3.738e-13, 2.268e-13, 1.348e-13, 7.859e-14, 4.499e-14,
];

const RHII_LOADED: usize = 26;

/// Cubic log-log fit of the collisionally excited H I cooling rates, with
/// the rates converted to code units before taking logs.
pub fn collisional_excitation_hi(converter: &Converter) -> LogSplineData {
    let pairs: Vec<(f64, f64)> = CEHI_TEMPS
        .iter()
        .zip(CEHI_RATES.iter())
        .map(|(&t, &r)| {
            (
                t.log10(),
                converter.to_code_units(r, 1.0, 5.0, -3.0).log10(),
            )
        })
        .collect();
    LogSplineData::new(&pairs)
}

/// Linear fit of the Hummer (1994) recombination cooling coefficients,
/// each divided by sqrt(T) and converted to code units.
pub fn recombination_hii(converter: &Converter) -> LinearSplineData {
    let pairs: Vec<(f64, f64)> = (0..RHII_LOADED)
        .map(|i| {
            let t = (std::f64::consts::LN_10 * (1.0 + 0.2 * i as f64)).exp();
            let r = converter.to_code_units(RHII_COEFFS[i] / t.sqrt(), 0.0, 3.0, -1.0);
            (t, r)
        })
        .collect();
    LinearSplineData::new(&pairs)
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::units::Converter;

    #[test]
    fn cehi_spline_reproduces_the_knots() {
        let spline = collisional_excitation_hi(&Converter::identity());
        // With an identity converter the spline holds log10 of the raw rates.
        let y = spline.interpolate(10000.0f64.log10());
        assert!((y - 9.794900e-24f64.log10()).abs() < 1e-10);
    }

    #[test]
    fn rhii_table_loads_26_knots_up_to_1e6_kelvin() {
        let spline = recombination_hii(&Converter::identity());
        // The topmost loaded knot sits at 10^6 K; beyond it the value clamps.
        let top = (std::f64::consts::LN_10 * 6.0).exp();
        let clamped = spline.interpolate(top * 100.0);
        assert!((spline.interpolate(top) - clamped).abs() < 1e-25);
        let expected = RHII_COEFFS[25] / top.sqrt();
        assert!((spline.interpolate(top) / expected - 1.0).abs() < 1e-12);
    }
}
