//! # Communications interface crate.
//!
//! Provides the bus abstraction, the records exchanged over it, and the network layer used to
//! reach the bus server.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Key/value bus with publish/subscribe, and the records carried on it
pub mod bus;

/// Network module
pub mod net;
