//! Lifecycle transition predicates
//!
//! Pure functions over [`ModuleState`]; the manager consults these before every
//! state-changing operation and treats a `false` as a rejected no-op.

use crate::module::traits::ModuleState;

/// A module may start loading only from `UNLOADED`.
pub fn can_load(state: ModuleState) -> bool {
    matches!(state, ModuleState::Unloaded)
}

/// `enable` retries from `DISABLED` or `FAILED`.
pub fn can_enable(state: ModuleState) -> bool {
    matches!(state, ModuleState::Disabled | ModuleState::Failed)
}

/// Only an `ENABLED` module can be disabled.
pub fn can_disable(state: ModuleState) -> bool {
    matches!(state, ModuleState::Enabled)
}

/// Only an `ENABLED` module can be reloaded.
pub fn can_reload(state: ModuleState) -> bool {
    matches!(state, ModuleState::Enabled)
}

/// Whether a module in this state receives health notifications.
pub fn receives_health(state: ModuleState) -> bool {
    matches!(state, ModuleState::Enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ModuleState; 5] = [
        ModuleState::Unloaded,
        ModuleState::Loading,
        ModuleState::Enabled,
        ModuleState::Disabled,
        ModuleState::Failed,
    ];

    #[test]
    fn test_enable_predicate() {
        assert!(!can_enable(ModuleState::Enabled));
        assert!(can_enable(ModuleState::Disabled));
        assert!(can_enable(ModuleState::Failed));
        assert!(!can_enable(ModuleState::Loading));
        assert!(!can_enable(ModuleState::Unloaded));
    }

    #[test]
    fn test_disable_and_reload_only_from_enabled() {
        for state in ALL {
            assert_eq!(can_disable(state), state == ModuleState::Enabled);
            assert_eq!(can_reload(state), state == ModuleState::Enabled);
        }
        assert!(!can_disable(ModuleState::Disabled));
        assert!(!can_reload(ModuleState::Failed));
    }

    #[test]
    fn test_loading_never_serves_hooks() {
        assert!(!receives_health(ModuleState::Loading));
        assert!(!can_reload(ModuleState::Loading));
        assert!(!can_disable(ModuleState::Loading));
    }
}
