// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type support: structural type descriptors and IDL-backed type libraries.
//!
//! A participant only creates writers and readers for types that were
//! registered on it. Registration normally comes from a
//! [`TypeSupportLibrary`] loaded from an IDL file at startup; the Rust type's
//! own [`TypeDescriptor`] (via the `DDS` trait) must match the loaded one.

mod idl;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub use idl::IdlError;

/// Compute 32-bit FNV-1a hash for fully qualified type names.
#[must_use]
pub fn compute_type_id(fqn: &str) -> u32 {
    const FNV_PRIME: u32 = 16_777_619;
    const FNV_OFFSET: u32 = 2_166_136_261;

    let mut hash = FNV_OFFSET;
    for byte in fqn.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Member type of a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Octet,
    Char,
    Short,
    UShort,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    /// `string` or `string<N>`.
    String { bound: Option<u32> },
    /// `sequence<T>` or `sequence<T, N>`.
    Sequence {
        element: Box<FieldKind>,
        bound: Option<u32>,
    },
    /// Reference to another (scoped) type by name.
    Named(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "boolean"),
            FieldKind::Octet => write!(f, "octet"),
            FieldKind::Char => write!(f, "char"),
            FieldKind::Short => write!(f, "short"),
            FieldKind::UShort => write!(f, "unsigned short"),
            FieldKind::Long => write!(f, "long"),
            FieldKind::ULong => write!(f, "unsigned long"),
            FieldKind::LongLong => write!(f, "long long"),
            FieldKind::ULongLong => write!(f, "unsigned long long"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::String { bound: None } => write!(f, "string"),
            FieldKind::String { bound: Some(n) } => write!(f, "string<{}>", n),
            FieldKind::Sequence {
                element,
                bound: None,
            } => write!(f, "sequence<{}>", element),
            FieldKind::Sequence {
                element,
                bound: Some(n),
            } => write!(f, "sequence<{}, {}>", element, n),
            FieldKind::Named(name) => write!(f, "{}", name),
        }
    }
}

/// One struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Structural description of a topic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Fully qualified name, e.g. `Chat::UserMessage`.
    pub type_name: String,
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_name: impl Into<String>, members: Vec<MemberDescriptor>) -> Self {
        Self {
            type_name: type_name.into(),
            members,
        }
    }

    pub fn type_id(&self) -> u32 {
        compute_type_id(&self.type_name)
    }

    /// Structural equality: same name and same members in the same order.
    pub fn is_compatible_with(&self, other: &TypeDescriptor) -> bool {
        self == other
    }
}

/// Errors raised while loading a type-support library.
#[derive(Debug)]
pub enum TypeSupportError {
    /// The definition file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// The definition file is not valid IDL (for the supported subset).
    Parse { path: PathBuf, source: IdlError },
}

impl fmt::Display for TypeSupportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSupportError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            TypeSupportError::Parse { path, source } => {
                write!(f, "cannot parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for TypeSupportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TypeSupportError::Io { source, .. } => Some(source),
            TypeSupportError::Parse { source, .. } => Some(source),
        }
    }
}

/// Set of struct types loaded from one IDL definition.
#[derive(Debug, Clone, Default)]
pub struct TypeSupportLibrary {
    types: BTreeMap<String, TypeDescriptor>,
}

impl TypeSupportLibrary {
    /// Load and parse an IDL file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TypeSupportError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TypeSupportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::parse(&source).map_err(|source| TypeSupportError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "[TypeSupport] loaded {} type(s) from {}",
            library.types.len(),
            path.display()
        );
        Ok(library)
    }

    /// Parse IDL source text.
    pub fn parse(source: &str) -> Result<Self, IdlError> {
        let types = idl::parse(source)?
            .into_iter()
            .map(|desc| (desc.type_name.clone(), desc))
            .collect();
        Ok(Self { types })
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
