//! Rendering direction tests

mod properties;
mod scenarios;
