// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge errors.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup errors. Recoverable outcomes (publish, subscribe) are
/// reported as plain booleans instead.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Type support error ({}): {reason}", path.display())]
    TypeSupport { path: PathBuf, reason: String },

    #[error("Bus error: {0}")]
    Bus(#[from] chatbus::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, InitError>;
