pub mod analyzer;
pub mod battle_controller;

pub use analyzer::*;
