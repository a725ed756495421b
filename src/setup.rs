//! Initial conditions. A provider is a capability mapping a cell centre
//! (and the star position) to the starting state of that cell, in CGS;
//! analytic providers cover the common ambient-medium setups, and anything
//! richer can implement the trait.

use log::warn;

use crate::config::SetupParameters;

/// The starting state of one cell, in CGS.
#[derive(Clone, Copy, Debug)]
pub struct CellState {
    pub den: f64,
    pub pre: f64,
    pub hii: f64,
    pub adv: f64,
    pub vel: [f64; 3],
    pub grav: [f64; 3],
}

pub trait InitialConditionsProvider {
    /// State at cell centre `xc` [cm] given the star position `xs` [cm].
    fn initialise(&self, xc: [f64; 3], xs: [f64; 3]) -> CellState;
}




/**
 * A uniform ambient medium at rest.
 */
pub struct UniformAmbient {
    pub density: f64,
    pub pressure: f64,
    pub hii: f64,
}

impl InitialConditionsProvider for UniformAmbient {
    fn initialise(&self, _xc: [f64; 3], _xs: [f64; 3]) -> CellState {
        CellState {
            den: self.density,
            pre: self.pressure,
            hii: self.hii,
            adv: 1.0,
            vel: [0.0; 3],
            grav: [0.0; 3],
        }
    }
}




/**
 * A pressure-matched overdense clump centred on the star, embedded in a
 * uniform ambient medium.
 */
pub struct OverdenseClump {
    pub ambient: UniformAmbient,
    pub overdensity: f64,
    pub radius: f64,
}

impl InitialConditionsProvider for OverdenseClump {
    fn initialise(&self, xc: [f64; 3], xs: [f64; 3]) -> CellState {
        let mut state = self.ambient.initialise(xc, xs);
        let r2: f64 = (0..3).map(|i| (xc[i] - xs[i]) * (xc[i] - xs[i])).sum();
        if r2 < self.radius * self.radius {
            state.den *= self.overdensity;
        }
        state
    }
}




/// Build the provider selected by the parameter file. An unknown name
/// falls back to the uniform medium with a warning.
pub fn provider_from_params(setup: &SetupParameters) -> Box<dyn InitialConditionsProvider> {
    let ambient = UniformAmbient {
        density: setup.density,
        pressure: setup.pressure,
        hii: setup.hii,
    };
    match setup.provider.as_str() {
        "uniform" => Box::new(ambient),
        "clump" => Box::new(OverdenseClump {
            ambient,
            overdensity: setup.clump_overdensity,
            radius: setup.clump_radius,
        }),
        other => {
            warn!("unknown initial conditions provider '{}', using uniform", other);
            Box::new(ambient)
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clump_is_overdense_inside_its_radius_only() {
        let provider = OverdenseClump {
            ambient: UniformAmbient {
                density: 1.0e-22,
                pressure: 1.0e-12,
                hii: 0.0,
            },
            overdensity: 10.0,
            radius: 2.0,
        };
        let xs = [0.0; 3];
        let inside = provider.initialise([1.0, 0.0, 0.0], xs);
        let outside = provider.initialise([3.0, 0.0, 0.0], xs);
        assert!((inside.den / outside.den - 10.0).abs() < 1e-12);
        assert_eq!(inside.pre, outside.pre);
    }

    #[test]
    fn unknown_provider_name_falls_back_to_uniform() {
        let setup = SetupParameters {
            provider: "vortex".to_string(),
            ..SetupParameters::default()
        };
        let provider = provider_from_params(&setup);
        let state = provider.initialise([0.0; 3], [0.0; 3]);
        assert_eq!(state.den, setup.density);
        assert_eq!(state.adv, 1.0);
    }
}
