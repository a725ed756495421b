use serde::{Deserialize, Serialize};

/// Where a star sits relative to the slab of grid owned by this rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Here,
    Left,
    Right,
}




/**
 * A single ionising point source. Positions are stored in global grid index
 * coordinates; rates and velocities are in code units.
 */
#[derive(Clone, Debug)]
pub struct Star {
    pub on: bool,
    pub location: Location,

    /// Global index coordinates of the source.
    pub xc: [f64; 3],

    /// Ionising photon emission rate.
    pub photon_rate: f64,

    /// Terminal velocity of the stellar wind.
    pub wind_velocity: f64,

    /// Wind mass-loss rate.
    pub mass_loss_rate: f64,

    /// Radius of the wind injection region, in cells.
    pub wind_cell_radius: f64,
}




// ============================================================================
impl Star {
    pub fn off() -> Self {
        Self {
            on: false,
            location: Location::Here,
            xc: [0.0; 3],
            photon_rate: 0.0,
            wind_velocity: 0.0,
            mass_loss_rate: 0.0,
            wind_cell_radius: 0.0,
        }
    }

    /// Squared distance from the source to a cell centre, in index units.
    pub fn dist_squared(&self, xc: &[f64; 3], nd: usize) -> f64 {
        let mut d2 = 0.0;
        for i in 0..nd {
            d2 += (xc[i] - self.xc[i]) * (xc[i] - self.xc[i]);
        }
        d2
    }
}
