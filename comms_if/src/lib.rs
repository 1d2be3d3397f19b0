//! # Communications interface crate.
//!
//! Provides the interface to the telescope's automatic control system (ACS): the state snapshot it
//! publishes, the commands it accepts, and the network plumbing used to exchange them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// State and command definitions for equipment (the ACS)
pub mod eqpt;

/// Network module
pub mod net;
