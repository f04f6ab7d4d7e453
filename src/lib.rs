//! Canvas Pilot - natural-language automation for a raster editor host

pub mod context;
pub mod core;
pub mod exec;
pub mod history;
pub mod host;
pub mod llm;
pub mod pipeline;
pub mod script;
