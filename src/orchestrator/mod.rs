//! 编排层

pub mod runner;

pub use runner::Runner;
