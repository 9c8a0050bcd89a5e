//! Role-based visibility: which metrics, tabs and actions a role sees.
//!
//! One static table, consulted everywhere. Roles we do not recognise get the
//! dispatcher view, the narrowest one.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    #[serde(rename = "DOE")]
    Doe,
    #[serde(rename = "SHIPPER")]
    Shipper,
    #[serde(rename = "DISPATCHER")]
    Dispatcher,
    #[serde(rename = "admin")]
    Admin,
    /// Missing or unknown role claim.
    #[serde(rename = "unrecognized")]
    Unrecognized,
}

impl Role {
    /// Parse a role claim from the session. Never fails.
    pub fn parse(claim: &str) -> Self {
        // ---
        match claim.trim().to_ascii_uppercase().as_str() {
            "DOE" => Role::Doe,
            "SHIPPER" => Role::Shipper,
            "DISPATCHER" => Role::Dispatcher,
            "ADMIN" => Role::Admin,
            _ => Role::Unrecognized,
        }
    }
}

impl From<&str> for Role {
    fn from(claim: &str) -> Self {
        Role::parse(claim)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Doe => "DOE",
            Role::Shipper => "SHIPPER",
            Role::Dispatcher => "DISPATCHER",
            Role::Admin => "admin",
            Role::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

/// Per-tank metrics a view may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    Volume,
    Capacity,
    FillPercentage,
    Ullage,
    VolumeChange,
    LevelMm,
    WaterCm,
    FlowRate,
    TemperatureC,
    Density,
    SpecificGravity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TabKey {
    Overview,
    Tankage,
    Shipments,
    Pipeline,
    Alerts,
    Maintenance,
    Users,
    AuditLogs,
    Reports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKey {
    CreateShipment,
    VerifyShipment,
    AcknowledgeAlert,
    ManageAlerts,
    ScheduleMaintenance,
    ManageUsers,
    ExportReports,
}

struct Visibility {
    metrics: &'static [MetricKey],
    tabs: &'static [TabKey],
    actions: &'static [ActionKey],
}

const FULL: Visibility = Visibility {
    metrics: &[
        MetricKey::Volume,
        MetricKey::Capacity,
        MetricKey::FillPercentage,
        MetricKey::Ullage,
        MetricKey::VolumeChange,
        MetricKey::LevelMm,
        MetricKey::WaterCm,
        MetricKey::FlowRate,
        MetricKey::TemperatureC,
        MetricKey::Density,
        MetricKey::SpecificGravity,
    ],
    tabs: &[
        TabKey::Overview,
        TabKey::Tankage,
        TabKey::Shipments,
        TabKey::Pipeline,
        TabKey::Alerts,
        TabKey::Maintenance,
        TabKey::Users,
        TabKey::AuditLogs,
        TabKey::Reports,
    ],
    actions: &[
        ActionKey::CreateShipment,
        ActionKey::VerifyShipment,
        ActionKey::AcknowledgeAlert,
        ActionKey::ManageAlerts,
        ActionKey::ScheduleMaintenance,
        ActionKey::ManageUsers,
        ActionKey::ExportReports,
    ],
};

const SHIPPER: Visibility = Visibility {
    metrics: &[
        MetricKey::Volume,
        MetricKey::Capacity,
        MetricKey::FillPercentage,
        MetricKey::Ullage,
        MetricKey::VolumeChange,
    ],
    tabs: &[
        TabKey::Overview,
        TabKey::Tankage,
        TabKey::Shipments,
        TabKey::Reports,
    ],
    actions: &[ActionKey::CreateShipment, ActionKey::ExportReports],
};

const DISPATCHER: Visibility = Visibility {
    metrics: &[
        MetricKey::Volume,
        MetricKey::FillPercentage,
        MetricKey::LevelMm,
        MetricKey::FlowRate,
    ],
    tabs: &[
        TabKey::Overview,
        TabKey::Tankage,
        TabKey::Pipeline,
        TabKey::Alerts,
    ],
    actions: &[ActionKey::AcknowledgeAlert],
};

fn table(role: Role) -> &'static Visibility {
    // ---
    match role {
        Role::Doe | Role::Admin => &FULL,
        Role::Shipper => &SHIPPER,
        Role::Dispatcher | Role::Unrecognized => &DISPATCHER,
    }
}

pub fn visible_for(role: Role) -> BTreeSet<MetricKey> {
    table(role).metrics.iter().copied().collect()
}

/// Tabs in display order.
pub fn visible_tabs(role: Role) -> Vec<TabKey> {
    table(role).tabs.to_vec()
}

pub fn visible_actions(role: Role) -> Vec<ActionKey> {
    table(role).actions.to_vec()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const ALL_ROLES: [Role; 5] = [
        Role::Doe,
        Role::Shipper,
        Role::Dispatcher,
        Role::Admin,
        Role::Unrecognized,
    ];

    #[test]
    fn test_unknown_role_is_dispatcher() {
        // ---
        let unknown = Role::parse("unknown-role");
        assert_eq!(unknown, Role::Unrecognized);
        assert_eq!(visible_for(unknown), visible_for(Role::Dispatcher));
        assert_eq!(visible_tabs(unknown), visible_tabs(Role::Dispatcher));
        assert_eq!(visible_actions(unknown), visible_actions(Role::Dispatcher));
        assert_eq!(visible_for(Role::parse("")), visible_for(Role::Dispatcher));
    }

    #[test]
    fn test_admin_matches_doe() {
        // ---
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(visible_for(Role::Admin), visible_for(Role::Doe));
        assert_eq!(visible_tabs(Role::Admin), visible_tabs(Role::Doe));
    }

    #[test]
    fn test_every_role_sees_something() {
        // ---
        for role in ALL_ROLES {
            assert!(!visible_for(role).is_empty(), "{role} has no metrics");
            assert!(!visible_tabs(role).is_empty(), "{role} has no tabs");
            assert!(!visible_actions(role).is_empty(), "{role} has no actions");
        }
    }

    #[test]
    fn test_no_role_exceeds_full_access() {
        // ---
        let full = visible_for(Role::Doe);
        for role in ALL_ROLES {
            assert!(visible_for(role).is_subset(&full));
        }
    }

    #[test]
    fn test_shipper_focus() {
        // ---
        let metrics = visible_for(Role::Shipper);
        assert!(metrics.contains(&MetricKey::Volume));
        assert!(!metrics.contains(&MetricKey::Density));
        assert!(visible_tabs(Role::Shipper).contains(&TabKey::Shipments));
        assert!(!visible_tabs(Role::Shipper).contains(&TabKey::Users));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        // ---
        assert_eq!(Role::from("doe"), Role::Doe);
        assert_eq!(Role::from(" Shipper "), Role::Shipper);
        assert_eq!(Role::from("ADMIN"), Role::Admin);
    }
}
