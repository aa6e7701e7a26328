//! Jaeger custom resource types

pub mod jaeger;

pub use jaeger::{Jaeger, JaegerSpec, JaegerStatus, LABEL_OPERATED_BY};

#[cfg(test)]
#[path = "jaeger_test.rs"]
mod tests;
