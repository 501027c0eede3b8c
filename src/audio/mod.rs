//! Audio playback system.
//!
//! The playback engine proper is the control loop in [`engine`], driven
//! through the [`player::Player`] facade. Decoding uses symphonia and output
//! uses cpal with an rtrb ring buffer between them.

pub mod backend;
pub mod decoder;
pub mod engine;
pub mod events;
#[cfg(test)]
pub mod mock;
pub mod output;
pub mod player;
pub mod queue;
pub mod track;
pub mod volume;
