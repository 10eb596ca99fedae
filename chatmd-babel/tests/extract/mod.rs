//! Extraction direction tests
//!
//! Full capture cycles through a stand-in converter, plus properties that
//! must hold for arbitrary input.

mod capture;
mod properties;
