#![forbid(unsafe_code)]

//! Contract tests for the pipeline compiler. Everything here runs without a
//! GL context: finalize is pure, and the `testing` mocks stand in for real
//! effects.

mod determinism;
mod partition;
mod repair;
mod shaders;
#[cfg(test)]
mod support;
