//! Types shared between the stardust world host and its collaborators
//! (renderer, room transport).

pub mod config;
pub mod protocol;
pub mod vec2;
