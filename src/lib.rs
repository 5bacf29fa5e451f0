pub mod config;
pub mod geometry;
pub mod io;
pub mod stats;
pub mod system;
pub mod tracking;
pub mod ttc;
