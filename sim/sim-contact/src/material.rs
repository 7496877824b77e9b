//! Materials and pairwise contact rules.
//!
//! A material is an opaque identity. It carries no friction or restitution of
//! its own; those live in a [`ContactRule`] bound to an unordered pair of
//! materials. Pairs without a rule fall back to the table's default rule.
//!
//! # Example
//!
//! ```
//! use sim_contact::{ContactRule, ContactRuleTable, MaterialId, MaterialRegistry};
//!
//! let mut materials = MaterialRegistry::new();
//! let ground = materials.add("ground");
//! let ice = materials.add("ice");
//!
//! let mut rules = ContactRuleTable::default();
//! rules.insert(ground, ice, ContactRule::frictionless());
//!
//! // Lookup is symmetric.
//! assert_eq!(rules.lookup(ice, ground).friction, 0.0);
//! // Unregistered pairs use the default rule.
//! assert_eq!(rules.lookup(MaterialId::DEFAULT, ice).friction, 1.0);
//! ```

use hashbrown::HashMap;
use sim_types::{SimError, SolverConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Material assigned to bodies that do not name one.
    pub const DEFAULT: Self = Self(0);

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Material({})", self.0)
    }
}

/// Friction and restitution used when two materials touch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactRule {
    /// Coulomb friction coefficient, `≥ 0`.
    pub friction: f64,
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
}

impl Default for ContactRule {
    /// Sticky and perfectly inelastic: friction 1, restitution 0.
    fn default() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.0,
        }
    }
}

impl ContactRule {
    /// Create a validated rule.
    pub fn new(friction: f64, restitution: f64) -> sim_types::Result<Self> {
        let rule = Self {
            friction,
            restitution,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// No friction, no bounce.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            friction: 0.0,
            restitution: 0.0,
        }
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set the restitution coefficient.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Check the coefficient ranges.
    pub fn validate(&self) -> sim_types::Result<()> {
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(SimError::invalid_config(format!(
                "friction must be finite and non-negative (got {})",
                self.friction
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config(format!(
                "restitution must be in [0, 1] (got {})",
                self.restitution
            )));
        }
        Ok(())
    }
}

impl From<&SolverConfig> for ContactRule {
    fn from(config: &SolverConfig) -> Self {
        Self {
            friction: config.default_friction,
            restitution: config.default_restitution,
        }
    }
}

/// Unordered pair of materials, used as the rule table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialPair {
    /// Lower id of the pair.
    a: MaterialId,
    /// Higher id of the pair.
    b: MaterialId,
}

impl MaterialPair {
    /// Create a pair; argument order does not matter.
    #[must_use]
    pub fn new(first: MaterialId, second: MaterialId) -> Self {
        if first <= second {
            Self {
                a: first,
                b: second,
            }
        } else {
            Self {
                a: second,
                b: first,
            }
        }
    }

    /// Both materials, lower id first.
    #[must_use]
    pub const fn materials(&self) -> (MaterialId, MaterialId) {
        (self.a, self.b)
    }
}

/// Names of the materials known to a world.
///
/// [`MaterialId::DEFAULT`] is always present under the name `"default"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRegistry {
    names: Vec<String>,
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialRegistry {
    /// Registry holding only the default material.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: vec!["default".to_string()],
        }
    }

    /// Register a new material. Names need not be unique.
    pub fn add(&mut self, name: impl Into<String>) -> MaterialId {
        // A world never holds anywhere near u32::MAX materials.
        #[allow(clippy::cast_possible_truncation)]
        let id = MaterialId(self.names.len() as u32);
        self.names.push(name.into());
        id
    }

    /// Whether the id was handed out by this registry.
    #[must_use]
    pub fn contains(&self, id: MaterialId) -> bool {
        (id.0 as usize) < self.names.len()
    }

    /// Name of a material.
    #[must_use]
    pub fn name(&self, id: MaterialId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Number of registered materials, default included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: the default material is always registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Contact rules keyed by unordered material pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactRuleTable {
    rules: HashMap<MaterialPair, ContactRule>,
    fallback: ContactRule,
}

impl ContactRuleTable {
    /// Empty table with the given fallback rule.
    #[must_use]
    pub fn with_default(fallback: ContactRule) -> Self {
        Self {
            rules: HashMap::new(),
            fallback,
        }
    }

    /// Register the rule for `{a, b}`, returning the rule it replaced.
    pub fn insert(&mut self, a: MaterialId, b: MaterialId, rule: ContactRule) -> Option<ContactRule> {
        self.rules.insert(MaterialPair::new(a, b), rule)
    }

    /// Remove the rule for `{a, b}`.
    pub fn remove(&mut self, a: MaterialId, b: MaterialId) -> Option<ContactRule> {
        self.rules.remove(&MaterialPair::new(a, b))
    }

    /// Registered rule for `{a, b}`, if any.
    #[must_use]
    pub fn get(&self, a: MaterialId, b: MaterialId) -> Option<&ContactRule> {
        self.rules.get(&MaterialPair::new(a, b))
    }

    /// Effective rule for `{a, b}`: the registered one, else the fallback.
    #[must_use]
    pub fn lookup(&self, a: MaterialId, b: MaterialId) -> ContactRule {
        self.get(a, b).copied().unwrap_or(self.fallback)
    }

    /// Rule used for unregistered pairs.
    #[must_use]
    pub fn fallback(&self) -> ContactRule {
        self.fallback
    }

    /// Replace the rule used for unregistered pairs.
    pub fn set_fallback(&mut self, rule: ContactRule) {
        self.fallback = rule;
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
