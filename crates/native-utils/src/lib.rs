//! Native audio plumbing: the cpal + hound implementation of the core's
//! `AudioBackend`, plus device discovery helpers.

pub mod backend;
pub mod device;

pub use backend::CpalAudioBackend;
