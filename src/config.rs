//! Run configuration. Everything here is plain data deserialized from a
//! TOML parameter file (or assembled by tests); physical quantities are
//! given in CGS and converted to code units during initialisation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParameters {
    /// Number of active spatial dimensions.
    pub nd: usize,

    /// Global zone counts per axis; unused axes must be 1.
    pub ncells: [usize; 3],

    /// Physical side length along x [cm].
    pub side_length: f64,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            nd: 1,
            ncells: [64, 1, 1],
            side_length: 3.09e18,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StarParameters {
    pub on: bool,

    /// Global cell indices of the source.
    pub position: [usize; 3],

    /// Ionising photon rate [1/s].
    pub photon_rate: f64,

    /// Wind terminal velocity [cm/s].
    pub wind_velocity: f64,

    /// Wind mass-loss rate [g/s].
    pub mass_loss_rate: f64,

    /// Radius of the wind injection region, in cells.
    pub wind_cell_radius: f64,
}

impl Default for StarParameters {
    fn default() -> Self {
        Self {
            on: false,
            position: [0, 0, 0],
            photon_rate: 1.0e49,
            wind_velocity: 2.0e8,
            mass_loss_rate: 1.0e19,
            wind_cell_radius: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoParameters {
    /// Enable the internal stiff-cooling subcycle.
    pub thermo_subcycling: bool,

    /// Advected-indicator threshold below which thermodynamics is inactive.
    pub thermo_hii_switch: f64,

    /// Final multiplier on the net source rate.
    pub heating_amplification: f64,

    /// Hydrogen mass fraction X_H.
    pub mass_fraction_h: f64,

    /// Take the per-cell temperature floor from the initial state (true)
    /// or use a flat 100 K floor (false).
    pub min_temp_initial_state: bool,
}

impl Default for ThermoParameters {
    fn default() -> Self {
        Self {
            thermo_subcycling: true,
            thermo_hii_switch: 1.0e-2,
            heating_amplification: 1.0,
            mass_fraction_h: 1.0,
            min_temp_initial_state: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupParameters {
    /// Initial-conditions provider: "uniform" or "clump".
    pub provider: String,

    /// Ambient density [g/cm3].
    pub density: f64,

    /// Ambient pressure [dyn/cm2].
    pub pressure: f64,

    /// Ambient ionised-hydrogen fraction.
    pub hii: f64,

    /// Clump overdensity factor and radius [cm], for the "clump" provider.
    pub clump_overdensity: f64,
    pub clump_radius: f64,
}

impl Default for SetupParameters {
    fn default() -> Self {
        Self {
            provider: "uniform".to_string(),
            density: 1.0e-22,
            pressure: 1.0e-12,
            hii: 0.0,
            clump_overdensity: 100.0,
            clump_radius: 3.0e17,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParameters {
    pub grid: GridParameters,
    pub star: StarParameters,
    pub thermo: ThermoParameters,
    pub setup: SetupParameters,

    /// Heat-capacity ratio of the gas.
    pub gamma: f64,

    /// Density, pressure and time scales defining the code units.
    pub dscale: f64,
    pub pscale: f64,
    pub tscale: f64,

    /// Numerical floors, in CGS.
    pub dfloor: f64,
    pub pfloor: f64,
    pub tfloor: f64,

    /// End time and largest permitted step [s].
    pub tmax: f64,
    pub dt_max: f64,

    pub ncheckpoints: usize,

    pub cooling_on: bool,
    pub radiation_on: bool,

    /// Enables the per-step time-step collapse check.
    pub debug: bool,

    /// Riemann solver selected by name; unknown names fall back to the
    /// default with a warning.
    pub riemann_solver: String,

    pub output_directory: String,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            grid: GridParameters::default(),
            star: StarParameters::default(),
            thermo: ThermoParameters::default(),
            setup: SetupParameters::default(),
            gamma: 5.0 / 3.0,
            dscale: 1.0e-21,
            pscale: 1.0e-9,
            tscale: 3.16e10,
            dfloor: 1.0e-27,
            pfloor: 1.0e-16,
            tfloor: 10.0,
            tmax: 3.16e11,
            dt_max: 3.16e8,
            ncheckpoints: 10,
            cooling_on: true,
            radiation_on: false,
            debug: false,
            riemann_solver: "hlle".to_string(),
            output_directory: ".".to_string(),
        }
    }
}




// ============================================================================
impl RunParameters {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let p = RunParameters::from_toml("").unwrap();
        assert_eq!(p.riemann_solver, "hlle");
        assert!(p.cooling_on);
        assert!(p.thermo.thermo_subcycling);
    }

    #[test]
    fn nested_sections_deserialize() {
        let text = r#"
            gamma = 1.4
            [thermo]
            thermo_subcycling = false
            heating_amplification = 0.5
            [star]
            on = true
            position = [4, 0, 0]
        "#;
        let p = RunParameters::from_toml(text).unwrap();
        assert_eq!(p.gamma, 1.4);
        assert!(!p.thermo.thermo_subcycling);
        assert_eq!(p.thermo.heating_amplification, 0.5);
        assert!(p.star.on);
        assert_eq!(p.star.position, [4, 0, 0]);
        // Untouched sections keep their defaults.
        assert_eq!(p.setup.provider, "uniform");
    }
}
