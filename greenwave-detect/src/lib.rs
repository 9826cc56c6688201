pub mod error;
pub mod parse;
pub mod profile;
pub mod runner;
