use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Role {
    // QR Code Management
    QrCreator, // Can create new QR codes
    QrViewer,  // Can view QR codes
    QrManager, // Can edit/delete QR codes

    // Analytics
    AnalyticsViewer,  // Can view basic analytics
    AnalyticsManager, // Can view detailed analytics

    // User Management
    UserViewer,  // Can view users
    UserManager, // Can create/edit users

    // System
    SystemAdmin, // System configuration, logs, etc.

    // Special
    SuperUser, // Has all permissions
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::QrCreator => write!(f, "QR Creator"),
            Role::QrViewer => write!(f, "QR Viewer"),
            Role::QrManager => write!(f, "QR Manager"),
            Role::AnalyticsViewer => write!(f, "Analytics Viewer"),
            Role::AnalyticsManager => write!(f, "Analytics Manager"),
            Role::UserViewer => write!(f, "User Viewer"),
            Role::UserManager => write!(f, "User Manager"),
            Role::SystemAdmin => write!(f, "System Administrator"),
            Role::SuperUser => write!(f, "Super User"),
        }
    }
}

impl Role {
    /// Roles handed to self-service signups.
    pub fn default_roles() -> Vec<Role> {
        vec![Role::QrCreator, Role::QrViewer, Role::AnalyticsViewer]
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, Role::SuperUser)
    }
}
