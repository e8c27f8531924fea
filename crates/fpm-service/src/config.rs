//! Editing policy configuration from environment.

use std::env;

/// Which edits stage into the temporary plan, and what may be edited where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpmConfig {
    pub tmpy_on_delete_waypoint: bool,
    pub tmpy_on_insert_waypoint: bool,
    pub tmpy_on_overfly: bool,
    pub allow_revisions_on_tmpy: bool,
    pub allow_non_active_fix_infos: bool,
    pub num_secondary: usize,
    /// Buffered notifications per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for FpmConfig {
    fn default() -> Self {
        Self::a320_honeywell_h3()
    }
}

impl FpmConfig {
    pub fn a320_honeywell_h3() -> Self {
        Self {
            tmpy_on_delete_waypoint: true,
            tmpy_on_insert_waypoint: true,
            tmpy_on_overfly: false,
            allow_revisions_on_tmpy: true,
            allow_non_active_fix_infos: false,
            num_secondary: 3,
            event_capacity: 64,
        }
    }

    /// H3 profile with `FPM_*` overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::a320_honeywell_h3();
        let flag = |name: &str, default: bool| {
            lookup(name)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };
        let number = |name: &str, default: usize| {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            tmpy_on_delete_waypoint: flag(
                "FPM_TMPY_ON_DELETE_WAYPOINT",
                defaults.tmpy_on_delete_waypoint,
            ),
            tmpy_on_insert_waypoint: flag(
                "FPM_TMPY_ON_INSERT_WAYPOINT",
                defaults.tmpy_on_insert_waypoint,
            ),
            tmpy_on_overfly: flag("FPM_TMPY_ON_OVERFLY", defaults.tmpy_on_overfly),
            allow_revisions_on_tmpy: flag(
                "FPM_ALLOW_REVISIONS_ON_TMPY",
                defaults.allow_revisions_on_tmpy,
            ),
            allow_non_active_fix_infos: flag(
                "FPM_ALLOW_NON_ACTIVE_FIX_INFOS",
                defaults.allow_non_active_fix_infos,
            ),
            num_secondary: number("FPM_NUM_SECONDARY", defaults.num_secondary),
            event_capacity: number("FPM_EVENT_CAPACITY", defaults.event_capacity).max(1),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_default_is_h3() {
        let config = FpmConfig::default();
        assert!(config.tmpy_on_delete_waypoint);
        assert!(config.tmpy_on_insert_waypoint);
        assert!(!config.tmpy_on_overfly);
        assert!(config.allow_revisions_on_tmpy);
        assert!(!config.allow_non_active_fix_infos);
        assert_eq!(config.num_secondary, 3);
    }

    #[test]
    fn test_overrides() {
        let config = FpmConfig::from_lookup(lookup_from(&[
            ("FPM_TMPY_ON_OVERFLY", "true"),
            ("FPM_ALLOW_REVISIONS_ON_TMPY", "0"),
            ("FPM_NUM_SECONDARY", "1"),
        ]));
        assert!(config.tmpy_on_overfly);
        assert!(!config.allow_revisions_on_tmpy);
        assert_eq!(config.num_secondary, 1);
        assert!(config.tmpy_on_delete_waypoint);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = FpmConfig::from_lookup(lookup_from(&[
            ("FPM_TMPY_ON_DELETE_WAYPOINT", "maybe"),
            ("FPM_EVENT_CAPACITY", "0"),
            ("FPM_NUM_SECONDARY", "lots"),
        ]));
        assert!(config.tmpy_on_delete_waypoint);
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.num_secondary, 3);
    }
}
