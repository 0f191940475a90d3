//! Services that keep filesystem access out of the authoring core

pub mod io;

pub use io::ImageIOService;
