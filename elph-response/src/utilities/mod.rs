// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Utilities
//!
//! Common utility methods, either utilised by multiple sub-modules or too small to
//! warrant their own sub-module

mod matrices;

pub use matrices::{is_hermitian, is_real_symmetric};
