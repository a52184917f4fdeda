//! Closed enumerations the patterns dispatch on.
//!
//! Every value a model may produce for a classification or a plan is one of
//! these variants. Anything else fails deserialization, so an unknown key is
//! caught before any handler lookup happens.

use serde::{Deserialize, Serialize};

/// Category of a customer query, used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    General,
    Refund,
    Technical,
}

impl QueryCategory {
    pub const ALL: [Self; 3] = [Self::General, Self::Refund, Self::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Refund => "refund",
            Self::Technical => "technical",
        }
    }
}

/// How hard a query is; selects the model tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Complex,
}

impl QueryComplexity {
    pub const ALL: [Self; 2] = [Self::Simple, Self::Complex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
        }
    }
}

/// The kind of change a planned task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Create,
    Modify,
    Delete,
}

impl TaskKind {
    pub const ALL: [Self; 3] = [Self::Create, Self::Modify, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }

    /// Parse a kind as the model spells it. Returns `None` for anything
    /// outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

/// A planner's estimate of overall effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatedComplexity {
    Low,
    Medium,
    High,
}

impl EstimatedComplexity {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(QueryCategory, QueryComplexity, TaskKind, EstimatedComplexity);

/// JSON values of every variant, for building `enum` constraints in schemas.
pub fn enum_values<T: Serialize>(variants: &[T]) -> Vec<serde_json::Value> {
    variants
        .iter()
        .filter_map(|v| serde_json::to_value(v).ok())
        .collect()
}
