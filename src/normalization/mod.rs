pub mod candidate;
pub mod game;
