#[macro_use] extern crate log;

pub mod clock;
pub mod config;
pub mod interpolator;
pub mod mapper;
pub mod orchestrator;
pub mod overlay;
pub mod runtime;
pub mod stats;
