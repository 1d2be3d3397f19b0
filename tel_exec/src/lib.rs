//! # Telescope library.
//!
//! Command and control of the BTA alt-azimuth mount: angle and coordinate handling, the astrometric
//! reductions needed to point at a catalogue object, and the orchestration of commands sent to the
//! telescope's automatic control system (ACS).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Angle codec - parses and formats sexagesimal angles
pub mod angle;

/// Spherical transforms between the equatorial and horizontal frames
pub mod sphere;

/// Astrometric reductions - calendar dates and apparent places
pub mod astrom;

/// ACS client - access to the telescope state and command queue
pub mod acs_client;

/// Single background timer used to bound every wait
pub mod timer;

/// Poll-wait and retry primitives
pub mod wait;

/// Command orchestrator - validates, dispatches and supervises telescope operations
pub mod orchestrator;

/// Emulated ACS used for dry runs and tests
pub mod sim;

/// Executes the requested operations in order and folds their outcomes into an exit status
pub mod dispatch;

/// Coordinate summary of the telescope state
pub mod report;

/// Executable parameters
pub mod params;
