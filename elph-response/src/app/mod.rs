// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # App
//!
//! Configuration and telemetry shared by callers driving the evaluators
mod configuration;
mod telemetry;

pub use configuration::{
    Configuration, GlobalConfiguration, PolarizationConfiguration, SelfEnergyConfiguration,
    SusceptibilityConfiguration,
};
pub use telemetry::{get_subscriber, init_subscriber};
