// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Error
//! The error type for the response evaluators

use crate::distributed::CollectiveError;
use elph_mesher::MeshError;
use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// General error for evaluator construction and evaluation
pub enum ResponseError {
    #[error(transparent)]
    #[diagnostic(code(elph_response::mesh))]
    Mesh(#[from] MeshError),
    #[error("inconsistent input shapes: {0}")]
    #[diagnostic(code(elph_response::shape_mismatch))]
    ShapeMismatch(String),
    #[error(transparent)]
    Array(#[from] ndarray::ShapeError),
    #[error("invalid regulariser: {0}")]
    #[diagnostic(
        code(elph_response::regulariser),
        help("the regulariser must be finite and non-zero to keep every energy denominator away from zero")
    )]
    InvalidRegulariser(String),
    #[error("invalid temperature: {0}")]
    #[diagnostic(code(elph_response::temperature))]
    InvalidTemperature(String),
    #[error("q-path index {index} is out of range for a path of {length} points")]
    OutOfPath { index: usize, length: usize },
    #[error(transparent)]
    Collective(#[from] CollectiveError),
    #[error(transparent)]
    #[diagnostic(code(elph_response::configuration))]
    Configuration(#[from] config::ConfigError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(String),
}

/// Checks that a temperature in Kelvin is finite and strictly positive
pub(crate) fn validate_temperature(temperature: f64) -> Result<f64, ResponseError> {
    if temperature.is_finite() && temperature > 0_f64 {
        Ok(temperature)
    } else {
        Err(ResponseError::InvalidTemperature(format!(
            "{temperature} K is not a finite, positive temperature"
        )))
    }
}

/// Checks that a broadening or imaginary regulariser is finite and non-zero
pub(crate) fn validate_regulariser(name: &str, value: f64) -> Result<f64, ResponseError> {
    if value.is_finite() && value != 0_f64 {
        Ok(value)
    } else {
        Err(ResponseError::InvalidRegulariser(format!(
            "{name} = {value}"
        )))
    }
}
