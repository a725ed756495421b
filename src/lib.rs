//! Radiation-hydrodynamics of ionised nebulae on a distributed Cartesian
//! grid. A compressible fluid is evolved under the combined influence of
//! gas dynamics, ionising radiation from a point-source star, and stiff
//! microphysical heating/cooling, with the domain split into 1-D slabs
//! across message-passing ranks.

pub mod config;
pub mod driver;
pub mod fluid;
pub mod geometry;
pub mod grid;
pub mod hydro;
pub mod message;
pub mod output;
pub mod partition;
pub mod radiation;
pub mod setup;
pub mod spline;
pub mod star;
pub mod thermo;
pub mod timestep;
pub mod units;
