//! Rate limit policies and the registry that resolves them.
//!
//! Every throttled operation is named by a fixed `(Category, Action)` pair.
//! Both halves are closed enumerations so a typo is a compile error (or a
//! parse error at startup) rather than a silently unthrottled action.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SjoelguardError};

/// Namespace of a throttled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Authentication flows
    Auth,
    /// Game mutations
    Games,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Auth => "auth",
            Category::Games => "games",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SjoelguardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auth" => Ok(Category::Auth),
            "games" => Ok(Category::Games),
            other => Err(SjoelguardError::unknown_policy(other, "*")),
        }
    }
}

/// A throttled action within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    SignIn,
    SignUp,
    PasswordReset,
    Create,
    ScoreSubmit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SignIn => "sign-in",
            Action::SignUp => "sign-up",
            Action::PasswordReset => "password-reset",
            Action::Create => "create",
            Action::ScoreSubmit => "score-submit",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Action {
    type Err = SjoelguardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sign-in" => Ok(Action::SignIn),
            "sign-up" => Ok(Action::SignUp),
            "password-reset" => Ok(Action::PasswordReset),
            "create" => Ok(Action::Create),
            "score-submit" => Ok(Action::ScoreSubmit),
            other => Err(SjoelguardError::unknown_policy("*", other)),
        }
    }
}

/// Actions registered under [`Category::Auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthAction {
    SignIn,
    SignUp,
    PasswordReset,
}

impl From<AuthAction> for Action {
    fn from(action: AuthAction) -> Self {
        match action {
            AuthAction::SignIn => Action::SignIn,
            AuthAction::SignUp => Action::SignUp,
            AuthAction::PasswordReset => Action::PasswordReset,
        }
    }
}

/// Actions registered under [`Category::Games`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameAction {
    Create,
    ScoreSubmit,
}

impl From<GameAction> for Action {
    fn from(action: GameAction) -> Self {
        match action {
            GameAction::Create => Action::Create,
            GameAction::ScoreSubmit => Action::ScoreSubmit,
        }
    }
}

/// Longest accepted policy window.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// At most `max_count` actions per identifier within one `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    window: Duration,
    max_count: u32,
}

impl Policy {
    /// Create a policy. Both the window and the limit must be non-zero, and
    /// the window may not exceed [`MAX_WINDOW`].
    pub fn new(window: Duration, max_count: u32) -> Result<Self> {
        if window.is_zero() {
            return Err(SjoelguardError::InvalidPolicy(
                "window duration must be positive".to_string(),
            ));
        }
        if window > MAX_WINDOW {
            return Err(SjoelguardError::InvalidPolicy(format!(
                "window duration {}s exceeds the maximum of {}s",
                window.as_secs(),
                MAX_WINDOW.as_secs()
            )));
        }
        if max_count == 0 {
            return Err(SjoelguardError::InvalidPolicy(
                "max count must be positive".to_string(),
            ));
        }
        Ok(Self { window, max_count })
    }

    const fn minutes(minutes: u64, max_count: u32) -> Self {
        Self {
            window: Duration::from_secs(minutes * 60),
            max_count,
        }
    }

    /// Length of one window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Maximum number of admitted actions per window.
    pub fn max_count(&self) -> u32 {
        self.max_count
    }
}

/// Startup-time replacement of a registered policy's window and limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    pub category: Category,
    pub action: Action,
    /// Window length in seconds
    pub window_secs: u64,
    pub max_count: u32,
}

/// One row of the effective policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    pub category: Category,
    pub action: Action,
    pub window_secs: u64,
    pub max_count: u32,
}

const DEFAULT_POLICIES: [(Category, Action, Policy); 5] = [
    (Category::Auth, Action::SignIn, Policy::minutes(15, 5)),
    (Category::Auth, Action::SignUp, Policy::minutes(60, 3)),
    (Category::Auth, Action::PasswordReset, Policy::minutes(60, 3)),
    (Category::Games, Action::Create, Policy::minutes(60, 10)),
    (Category::Games, Action::ScoreSubmit, Policy::minutes(1, 30)),
];

/// Immutable table of registered policies.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<(Category, Action), Policy>,
}

impl PolicyRegistry {
    /// Create the registry with the built-in policy table.
    pub fn new() -> Self {
        let policies = DEFAULT_POLICIES
            .iter()
            .map(|(category, action, policy)| ((*category, *action), *policy))
            .collect();
        Self { policies }
    }

    /// Create the registry with the built-in table and apply overrides.
    ///
    /// Overrides may only replace registered pairs; anything else is an
    /// `UnknownPolicy` error.
    pub fn with_overrides(overrides: &[PolicyOverride]) -> Result<Self> {
        let mut registry = Self::new();

        for o in overrides {
            let slot = registry
                .policies
                .get_mut(&(o.category, o.action))
                .ok_or_else(|| {
                    SjoelguardError::unknown_policy(o.category.as_str(), o.action.as_str())
                })?;
            *slot = Policy::new(Duration::from_secs(o.window_secs), o.max_count)?;

            info!(
                category = %o.category,
                action = %o.action,
                window_secs = o.window_secs,
                max_count = o.max_count,
                "Applied rate limit policy override"
            );
        }

        Ok(registry)
    }

    /// Look up the policy for a category/action pair.
    pub fn get_policy(&self, category: Category, action: Action) -> Result<Policy> {
        self.policies
            .get(&(category, action))
            .copied()
            .ok_or_else(|| SjoelguardError::unknown_policy(category.as_str(), action.as_str()))
    }

    /// Policy for an authentication action.
    pub fn auth_policy(&self, action: AuthAction) -> Policy {
        // every typed pair is part of the built-in table and overrides never remove entries
        self.policies[&(Category::Auth, action.into())]
    }

    /// Policy for a game mutation.
    pub fn game_policy(&self, action: GameAction) -> Policy {
        self.policies[&(Category::Games, action.into())]
    }

    /// All registered policies in a stable order.
    pub fn policies(&self) -> impl Iterator<Item = (Category, Action, Policy)> + '_ {
        self.policies
            .iter()
            .map(|((category, action), policy)| (*category, *action, *policy))
    }

    /// The effective table as serializable rows.
    pub fn entries(&self) -> Vec<PolicyEntry> {
        self.policies()
            .map(|(category, action, policy)| PolicyEntry {
                category,
                action,
                window_secs: policy.window().as_secs(),
                max_count: policy.max_count(),
            })
            .collect()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let registry = PolicyRegistry::new();

        let sign_in = registry.get_policy(Category::Auth, Action::SignIn).unwrap();
        assert_eq!(sign_in.window(), Duration::from_secs(15 * 60));
        assert_eq!(sign_in.max_count(), 5);

        let sign_up = registry.get_policy(Category::Auth, Action::SignUp).unwrap();
        assert_eq!(sign_up.window(), Duration::from_secs(3600));
        assert_eq!(sign_up.max_count(), 3);

        let reset = registry
            .get_policy(Category::Auth, Action::PasswordReset)
            .unwrap();
        assert_eq!(reset.window(), Duration::from_secs(3600));
        assert_eq!(reset.max_count(), 3);

        let create = registry.get_policy(Category::Games, Action::Create).unwrap();
        assert_eq!(create.window(), Duration::from_secs(3600));
        assert_eq!(create.max_count(), 10);

        let score = registry
            .get_policy(Category::Games, Action::ScoreSubmit)
            .unwrap();
        assert_eq!(score.window(), Duration::from_secs(60));
        assert_eq!(score.max_count(), 30);

        assert_eq!(registry.policies().count(), 5);
    }

    #[test]
    fn test_typed_lookups_match_table() {
        let registry = PolicyRegistry::new();
        assert_eq!(
            registry.auth_policy(AuthAction::SignIn),
            registry.get_policy(Category::Auth, Action::SignIn).unwrap()
        );
        assert_eq!(
            registry.game_policy(GameAction::ScoreSubmit),
            registry.get_policy(Category::Games, Action::ScoreSubmit).unwrap()
        );
    }

    #[test]
    fn test_unregistered_pair_is_unknown() {
        let registry = PolicyRegistry::new();

        let err = registry
            .get_policy(Category::Games, Action::SignIn)
            .unwrap_err();
        assert!(matches!(
            err,
            SjoelguardError::UnknownPolicy { ref category, ref action }
                if category == "games" && action == "sign-in"
        ));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("auth".parse::<Category>().unwrap(), Category::Auth);
        assert_eq!("games".parse::<Category>().unwrap(), Category::Games);
        assert_eq!("password-reset".parse::<Action>().unwrap(), Action::PasswordReset);
        assert_eq!("score-submit".parse::<Action>().unwrap(), Action::ScoreSubmit);

        assert!(matches!(
            "game".parse::<Category>(),
            Err(SjoelguardError::UnknownPolicy { .. })
        ));
        assert!(matches!(
            "signin".parse::<Action>(),
            Err(SjoelguardError::UnknownPolicy { .. })
        ));
    }

    #[test]
    fn test_display_matches_parse() {
        for (category, action, _) in PolicyRegistry::new().policies() {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn test_policy_rejects_zero_values() {
        assert!(matches!(
            Policy::new(Duration::ZERO, 5),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
        assert!(matches!(
            Policy::new(Duration::from_secs(60), 0),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
        assert!(Policy::new(Duration::from_secs(60), 1).is_ok());
    }

    #[test]
    fn test_policy_rejects_oversized_window() {
        assert!(matches!(
            Policy::new(Duration::MAX, 5),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
        assert!(matches!(
            Policy::new(MAX_WINDOW + Duration::from_secs(1), 5),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
        assert!(Policy::new(MAX_WINDOW, 5).is_ok());
    }

    #[test]
    fn test_override_with_oversized_window_fails() {
        let overrides = vec![PolicyOverride {
            category: Category::Auth,
            action: Action::SignIn,
            window_secs: u64::MAX,
            max_count: 5,
        }];

        assert!(matches!(
            PolicyRegistry::with_overrides(&overrides),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_overrides_replace_registered_policy() {
        let overrides = vec![PolicyOverride {
            category: Category::Auth,
            action: Action::SignIn,
            window_secs: 300,
            max_count: 2,
        }];

        let registry = PolicyRegistry::with_overrides(&overrides).unwrap();
        let policy = registry.get_policy(Category::Auth, Action::SignIn).unwrap();
        assert_eq!(policy.window(), Duration::from_secs(300));
        assert_eq!(policy.max_count(), 2);

        // Untouched entries keep their defaults
        let sign_up = registry.get_policy(Category::Auth, Action::SignUp).unwrap();
        assert_eq!(sign_up.max_count(), 3);
    }

    #[test]
    fn test_override_of_unregistered_pair_fails() {
        let overrides = vec![PolicyOverride {
            category: Category::Games,
            action: Action::PasswordReset,
            window_secs: 60,
            max_count: 1,
        }];

        assert!(matches!(
            PolicyRegistry::with_overrides(&overrides),
            Err(SjoelguardError::UnknownPolicy { .. })
        ));
    }

    #[test]
    fn test_override_with_zero_limit_fails() {
        let overrides = vec![PolicyOverride {
            category: Category::Games,
            action: Action::Create,
            window_secs: 60,
            max_count: 0,
        }];

        assert!(matches!(
            PolicyRegistry::with_overrides(&overrides),
            Err(SjoelguardError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_entries_serialize_with_kebab_names() {
        let entries = PolicyRegistry::new().entries();
        let json = serde_json::to_string(&entries[0]).unwrap();
        assert_eq!(
            json,
            r#"{"category":"auth","action":"sign-in","window_secs":900,"max_count":5}"#
        );
    }
}
