//! Scaling between physical (CGS) quantities and the dimensionless code
//! units used internally. Working in scaled units keeps the arithmetic away
//! from the extremes of double precision: interstellar densities are
//! ~1e-22 g/cm3 and photon rates ~1e49 /s, which would otherwise meet in
//! the same expressions.

/// Boltzmann constant [erg / K]
pub const BOLTZMANN: f64 = 1.3806485e-16;

/// Mass of a hydrogen atom [g]
pub const HYDROGEN_MASS: f64 = 1.6738232e-24;

/// Dust extinction cross-section per hydrogen nucleus [cm2]
pub const DUST_EXTINCTION_CROSS_SECTION: f64 = 5.0e-22;

/// Electron-volt in ergs
pub const EV: f64 = 1.602176634e-12;




/**
 * Maps physical CGS values to internal code units along (mass, length,
 * time) exponents. The three scale factors are derived from a reference
 * density, pressure and time, which the parameter file chooses to be
 * representative of the problem.
 */
#[derive(Clone, Debug)]
pub struct Converter {
    mass_scale: f64,
    length_scale: f64,
    time_scale: f64,
}




// ============================================================================
impl Converter {

    /// Build a converter from a density [g/cm3], pressure [dyn/cm2] and
    /// time [s] scale.
    pub fn new(dscale: f64, pscale: f64, tscale: f64) -> Self {
        let vscale = (pscale / dscale).sqrt();
        let length_scale = vscale * tscale;
        Self {
            mass_scale: dscale * length_scale * length_scale * length_scale,
            length_scale,
            time_scale: tscale,
        }
    }

    /// An identity converter, useful when a problem is already dimensionless.
    pub fn identity() -> Self {
        Self {
            mass_scale: 1.0,
            length_scale: 1.0,
            time_scale: 1.0,
        }
    }

    fn scale(&self, m: f64, l: f64, t: f64) -> f64 {
        self.mass_scale.powf(m) * self.length_scale.powf(l) * self.time_scale.powf(t)
    }

    /// Convert a CGS quantity with dimensions mass^m length^l time^t into
    /// code units.
    pub fn to_code_units(&self, value: f64, m: f64, l: f64, t: f64) -> f64 {
        value / self.scale(m, l, t)
    }

    /// Convert a code-units quantity back to CGS.
    pub fn from_code_units(&self, value: f64, m: f64, l: f64, t: f64) -> f64 {
        value * self.scale(m, l, t)
    }
}




/**
 * Physical constants pre-converted to code units, plus the numerical floors
 * shared by every component. Built once at startup and passed by reference;
 * nothing here mutates after construction.
 */
#[derive(Clone, Debug)]
pub struct Constants {
    pub converter: Converter,

    /// Number of active spatial dimensions (1, 2 or 3).
    pub nd: usize,

    /// Hydrogen atom mass in code units.
    pub hydrogen_mass: f64,

    /// Boltzmann constant in code units (per kelvin).
    pub boltzmann: f64,

    /// k_B / m_H in code units (per kelvin).
    pub specific_gas_constant: f64,

    /// Dust extinction cross-section per hydrogen nucleus in code units.
    pub dust_extinction_cross_section: f64,

    pub pi: f64,

    /// Density floor in code units.
    pub dfloor: f64,

    /// Pressure floor in code units.
    pub pfloor: f64,

    /// Temperature floor [K].
    pub tfloor: f64,
}




// ============================================================================
impl Constants {
    pub fn new(converter: Converter, nd: usize) -> Self {
        let hydrogen_mass = converter.to_code_units(HYDROGEN_MASS, 1.0, 0.0, 0.0);
        let boltzmann = converter.to_code_units(BOLTZMANN, 1.0, 2.0, -2.0);
        let specific_gas_constant =
            converter.to_code_units(BOLTZMANN / HYDROGEN_MASS, 0.0, 2.0, -2.0);
        let dust_extinction_cross_section =
            converter.to_code_units(DUST_EXTINCTION_CROSS_SECTION, 0.0, 2.0, 0.0);
        Self {
            converter,
            nd,
            hydrogen_mass,
            boltzmann,
            specific_gas_constant,
            dust_extinction_cross_section,
            pi: std::f64::consts::PI,
            dfloor: 0.0,
            pfloor: 0.0,
            tfloor: 0.0,
        }
    }

    pub fn with_floors(mut self, dfloor: f64, pfloor: f64, tfloor: f64) -> Self {
        self.dfloor = self.converter.to_code_units(dfloor, 1.0, -3.0, 0.0);
        self.pfloor = self.converter.to_code_units(pfloor, 1.0, -1.0, -2.0);
        self.tfloor = tfloor;
        self
    }
}
