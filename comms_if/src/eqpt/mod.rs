//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the telescope's control
//! system.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod acs;
