//! Core types: rigid math helpers and the particle store.

pub mod particles;
pub mod types;

pub use particles::{Particle, ParticleFlags, ParticleStore};
pub use types::{InertiaTensorExt, MassProperties, Transform, Velocity};
