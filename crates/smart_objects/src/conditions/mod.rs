//! # Selection Preconditions
//!
//! Boolean condition trees that gate whether an object or a slot can be
//! selected. Each definition carries one [`PreconditionSet`] for the object
//! and one per slot; every runtime object and slot tracks its own
//! [`PreconditionState`].
//!
//! ## Activation
//!
//! Custom conditions may hold external subscriptions, so they are activated
//! before first use and deactivated when the object is destroyed.
//! Activation only happens once the object's owner is resolvable. Until
//! then the state stays [`PreconditionState::ActivationPending`], evaluation
//! fails closed and activation is retried on the next evaluation.
//!
//! Results are never cached: every evaluation walks the tree again.

mod context;

pub use context::{AlwaysResolvable, ConditionContext, OwnerResolver};

use crate::tags::{TagContainer, TagQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A condition implemented in code.
///
/// One instance may be shared by many objects; the context identifies which
/// object and slot an activation or evaluation is for.
pub trait WorldCondition: Send + Sync + fmt::Debug {
    /// Prepares the condition for `context`. Returning false leaves the
    /// owning state pending.
    fn activate(&self, _context: &ConditionContext<'_>) -> bool {
        true
    }

    fn is_true(&self, context: &ConditionContext<'_>) -> bool;

    /// Releases whatever `activate` acquired.
    fn deactivate(&self, _context: &ConditionContext<'_>) {}
}

// ============================================================================
// Expressions
// ============================================================================

/// Condition expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionExpr {
    All(Vec<ConditionExpr>),
    Any(Vec<ConditionExpr>),
    Not(Box<ConditionExpr>),
    ObjectTagsMatch(TagQuery),
    SlotTagsMatch(TagQuery),
    UserTagsMatch(TagQuery),
    #[serde(skip)]
    Custom(Arc<dyn WorldCondition>),
}

impl ConditionExpr {
    pub fn custom(condition: impl WorldCondition + 'static) -> Self {
        ConditionExpr::Custom(Arc::new(condition))
    }

    pub fn evaluate(&self, context: &ConditionContext<'_>) -> bool {
        match self {
            ConditionExpr::All(children) => children.iter().all(|c| c.evaluate(context)),
            ConditionExpr::Any(children) => children.iter().any(|c| c.evaluate(context)),
            ConditionExpr::Not(child) => !child.evaluate(context),
            ConditionExpr::ObjectTagsMatch(query) => query.matches(context.object_tags),
            ConditionExpr::SlotTagsMatch(query) => match context.slot_tags {
                Some(tags) => query.matches(tags),
                None => query.matches(&TagContainer::new()),
            },
            ConditionExpr::UserTagsMatch(query) => query.matches(context.user_tags),
            ConditionExpr::Custom(condition) => condition.is_true(context),
        }
    }

    fn for_each_custom(&self, f: &mut dyn FnMut(&Arc<dyn WorldCondition>) -> bool) -> bool {
        match self {
            ConditionExpr::All(children) | ConditionExpr::Any(children) => {
                children.iter().all(|c| c.for_each_custom(&mut *f))
            }
            ConditionExpr::Not(child) => child.for_each_custom(&mut *f),
            ConditionExpr::Custom(condition) => f(condition),
            _ => true,
        }
    }
}

/// Keyed condition entry of a [`PreconditionSet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedCondition {
    pub key: String,
    pub condition: ConditionExpr,
}

/// Ordered list of conditions that must all hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreconditionSet {
    conditions: Vec<KeyedCondition>,
}

impl PreconditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, condition: ConditionExpr) -> Self {
        self.add(key, condition);
        self
    }

    /// Adds a condition, replacing one with the same key.
    pub fn add(&mut self, key: impl Into<String>, condition: ConditionExpr) {
        let key = key.into();
        match self.conditions.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.condition = condition,
            None => self.conditions.push(KeyedCondition { key, condition }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|c| c.key.as_str())
    }

    /// True when every condition holds. An empty set always holds.
    pub fn evaluate(&self, context: &ConditionContext<'_>) -> bool {
        self.conditions.iter().all(|c| c.condition.evaluate(context))
    }

    /// Activates every custom condition, stopping at the first refusal.
    pub fn activate(&self, context: &ConditionContext<'_>) -> bool {
        self.conditions
            .iter()
            .all(|c| {
                c.condition
                    .for_each_custom(&mut |condition: &Arc<dyn WorldCondition>| condition.activate(context))
            })
    }

    pub fn deactivate(&self, context: &ConditionContext<'_>) {
        for entry in &self.conditions {
            entry.condition.for_each_custom(&mut |condition: &Arc<dyn WorldCondition>| {
                condition.deactivate(context);
                true
            });
        }
    }
}

// ============================================================================
// Activation state
// ============================================================================

/// Activation state of one object's or slot's condition set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreconditionState {
    /// Not initialized, or deactivated on destruction
    #[default]
    Inactive,
    /// Waiting for the owner to become resolvable
    ActivationPending,
    Active,
}

impl PreconditionState {
    /// Activates `set` if the owner is resolvable.
    ///
    /// # Returns
    ///
    /// `true` if the state is `Active` afterwards.
    pub fn try_activate(&mut self, set: &PreconditionSet, resolvable: bool, context: &ConditionContext<'_>) -> bool {
        if *self == PreconditionState::Active {
            return true;
        }
        if set.is_empty() {
            *self = PreconditionState::Active;
            return true;
        }
        if resolvable && set.activate(context) {
            *self = PreconditionState::Active;
            true
        } else {
            *self = PreconditionState::ActivationPending;
            false
        }
    }

    /// Evaluates `set`, activating it first if needed.
    ///
    /// Fails closed while the owner cannot be resolved.
    pub fn evaluate(&mut self, set: &PreconditionSet, resolvable: bool, context: &ConditionContext<'_>) -> bool {
        if set.is_empty() {
            return true;
        }
        if !self.try_activate(set, resolvable, context) {
            return false;
        }
        set.evaluate(context)
    }

    /// Deactivates `set` if it was active and resets to `Inactive`.
    pub fn deactivate(&mut self, set: &PreconditionSet, context: &ConditionContext<'_>) {
        if *self == PreconditionState::Active && !set.is_empty() {
            set.deactivate(context);
        }
        *self = PreconditionState::Inactive;
    }
}
