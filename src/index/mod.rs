//! Input indexing: unique-id translation and per-timestep lookup tables
//!
//! - [`mapping`] - Unique id ↔ traxel translation
//! - [`timestep`] - Detections, links, divisions and mergers grouped by frame

pub mod mapping;
pub mod timestep;

pub use mapping::TraxelMapping;
pub use timestep::{LinkPair, TimestepIndex};
