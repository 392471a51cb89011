// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

//! Runtime GLSL preprocessing.
//!
//! Resolves `#include` directives against an [`IncludeRegistry`] and a list of
//! [`IncludePaths`], expands `@define`/`@match` variant blocks and `$NAME`
//! substitutions, and records a [`LineMap`] so driver logs can be pointed
//! back at the file and line that produced them.

mod include;
mod line_map;
mod preprocessor;
mod validate;

pub use include::{IncludeError, IncludePaths, IncludeRegistry};
pub use line_map::{LineId, LineMap};
pub use preprocessor::{PreprocError, PreprocErrorType, Preprocessor, SourceSpan};
pub use validate::{validate_shader, ValidationError};
