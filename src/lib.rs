//! Traffic Simulation Library
//!
//! A microscopic, discrete-time traffic simulation over a directed road
//! network, together with its input documents and topology generators.

pub mod config;
pub mod error;
pub mod generator;
pub mod simulation;
