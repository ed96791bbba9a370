//! Unit identity and role types.
//!
//! `UnitType` forms a shallow chain of base types so callers can ask "is this
//! a source?" without a class hierarchy. Equality and hashing are structural.
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Role of a unit in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseKind {
    Source,
    Hidden,
    Sink,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitType {
    kind: BaseKind,
    name: String,
    base: Option<Box<UnitType>>,
}

static SOURCE: Lazy<UnitType> = Lazy::new(|| UnitType::root(BaseKind::Source, "Source"));
static HIDDEN: Lazy<UnitType> = Lazy::new(|| UnitType::root(BaseKind::Hidden, "Hidden"));
static SINK: Lazy<UnitType> = Lazy::new(|| UnitType::root(BaseKind::Sink, "Sink"));
static COPY: Lazy<UnitType> = Lazy::new(|| UnitType::root(BaseKind::Copy, "Copy"));

pub const CONSTANT: &str = "Constant";
pub const PLACEHOLDER: &str = "PlaceHolder";
pub const DENSE: &str = "Dense";
pub const ACTIVATION: &str = "Activation";
pub const LOSS: &str = "Loss";

impl UnitType {
    fn root(kind: BaseKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            base: None,
        }
    }

    /// Derive a new type from `base`; the base kind is inherited.
    pub fn derived(name: &str, base: &UnitType) -> Self {
        Self {
            kind: base.kind,
            name: name.to_string(),
            base: Some(Box::new(base.clone())),
        }
    }

    pub fn source() -> Self {
        SOURCE.clone()
    }

    pub fn hidden() -> Self {
        HIDDEN.clone()
    }

    pub fn sink() -> Self {
        SINK.clone()
    }

    pub fn copy() -> Self {
        COPY.clone()
    }

    pub fn constant() -> Self {
        Self::derived(CONSTANT, &SOURCE)
    }

    pub fn placeholder() -> Self {
        Self::derived(PLACEHOLDER, &SOURCE)
    }

    pub fn dense() -> Self {
        Self::derived(DENSE, &HIDDEN)
    }

    pub fn activation() -> Self {
        Self::derived(ACTIVATION, &HIDDEN)
    }

    pub fn loss() -> Self {
        Self::derived(LOSS, &SINK)
    }

    pub fn kind(&self) -> BaseKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&UnitType> {
        self.base.as_deref()
    }

    /// True if `self` appears strictly above `other` in `other`'s base chain.
    pub fn is_base_of(&self, other: &UnitType) -> bool {
        let mut current = other.base();
        while let Some(ty) = current {
            if ty == self {
                return true;
            }
            current = ty.base();
        }
        false
    }

    pub fn is_derived_from(&self, base: &UnitType) -> bool {
        base.is_base_of(self)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Identity of a unit: role, numeric id and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub unit_type: UnitType,
    pub id: usize,
    pub name: String,
}

impl UnitId {
    pub fn new(unit_type: UnitType, id: usize, name: impl Into<String>) -> Self {
        Self {
            unit_type,
            id,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> BaseKind {
        self.unit_type.kind()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.unit_type, self.name, self.id)
    }
}
