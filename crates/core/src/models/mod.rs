//! Data models for Lets Try

mod ballot;
mod game;
mod proposal;

pub use ballot::*;
pub use game::*;
pub use proposal::*;
