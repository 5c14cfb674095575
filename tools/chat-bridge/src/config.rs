// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Environment configuration: where the chat type definition lives.

use std::path::{Path, PathBuf};

use crate::error::{InitError, Result};

/// Environment variable naming the chat installation root.
pub const CHAT_ROOT_VAR: &str = "CHAT_ROOT";

/// Location of the type definition relative to the root.
const TYPE_SUPPORT_FILE: &str = "idl/Chat.idl";

/// Resolved chat installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoot {
    root: PathBuf,
}

impl ChatRoot {
    /// Read `CHAT_ROOT` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve the root through `lookup`. Unset and empty are both errors.
    pub fn resolve<F>(lookup: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(CHAT_ROOT_VAR) {
            Some(value) if !value.trim().is_empty() => Ok(Self {
                root: PathBuf::from(value),
            }),
            Some(_) => Err(InitError::Configuration(format!(
                "{} is set but empty",
                CHAT_ROOT_VAR
            ))),
            None => Err(InitError::Configuration(format!(
                "{} is not set",
                CHAT_ROOT_VAR
            ))),
        }
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `$CHAT_ROOT/idl/Chat.idl`
    pub fn type_support_path(&self) -> PathBuf {
        self.root.join(TYPE_SUPPORT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_set() {
        let root = ChatRoot::resolve(|_| Some("/opt/chat".into())).expect("root");
        assert_eq!(root.path(), Path::new("/opt/chat"));
        assert_eq!(
            root.type_support_path(),
            PathBuf::from("/opt/chat/idl/Chat.idl")
        );
    }

    #[test]
    fn test_resolve_missing_names_variable() {
        let err = ChatRoot::resolve(|_| None).expect_err("missing");
        assert!(matches!(&err, InitError::Configuration(msg) if msg.contains("CHAT_ROOT")));
    }

    #[test]
    fn test_resolve_empty() {
        let err = ChatRoot::resolve(|_| Some("  ".into())).expect_err("empty");
        assert!(matches!(&err, InitError::Configuration(msg) if msg.contains("CHAT_ROOT")));
    }

    #[test]
    fn test_lookup_uses_variable_name() {
        let root = ChatRoot::resolve(|name| {
            assert_eq!(name, CHAT_ROOT_VAR);
            Some("/srv".into())
        })
        .expect("root");
        assert_eq!(root, ChatRoot::new("/srv"));
    }
}
