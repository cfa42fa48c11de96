//! Composite counter keys.

use std::fmt;

use super::policy::{Action, AuthAction, Category, GameAction};

/// Identifies one counter: a registered action plus the caller's identifier.
///
/// Renders as `category:action:identifier`, e.g. `auth:sign-in:alice@example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    pub category: Category,
    pub action: Action,
    pub identifier: String,
}

impl LimitKey {
    pub fn new(category: Category, action: Action, identifier: impl Into<String>) -> Self {
        Self {
            category,
            action,
            identifier: identifier.into(),
        }
    }

    /// Key for an authentication action, namespaced under `auth:`.
    pub fn auth(action: AuthAction, identifier: impl Into<String>) -> Self {
        Self::new(Category::Auth, action.into(), identifier)
    }

    /// Key for a game mutation, namespaced under `games:`.
    pub fn games(action: GameAction, user_id: impl Into<String>) -> Self {
        Self::new(Category::Games, action.into(), user_id)
    }

    /// The string form used as the counter store key.
    pub fn to_string_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.category, self.action, self.identifier)
    }
}
