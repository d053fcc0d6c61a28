pub mod cli;
pub mod driver;
pub mod output;
pub mod probe;
