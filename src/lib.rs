//! Technical report generation.
//!
//! The crate synthesizes sample data, renders it as ASCII art or PNG figures, substitutes the
//! text artifacts into an HTML template and exports the result to PDF through a chain of
//! converters, falling back to manual instructions when none is available.
//!
//! [`pipeline`] ties the stages together; [`config::RunConfig`] locates every file.

pub mod ascii;
pub mod assemble;
pub mod builder;
pub mod config;
pub mod elements;
pub mod error;
pub mod export;
pub mod fonts;
pub mod graphics;
pub mod html;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod richtext;
pub mod synth;
pub mod table;

pub use config::RunConfig;
pub use error::{ReportError, Result};
pub use pipeline::RenderMode;
