pub mod cleaning;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod predict;
pub mod report;
pub mod split;
