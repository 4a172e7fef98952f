//! Account roles and user directory records

use crate::errors::TypesError;
use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account type. Decides which realtime handlers a session gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Vendor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            _ => Err(TypesError::UnknownRole(s.to_string())),
        }
    }
}

/// What the user directory knows about an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    #[serde(rename = "type")]
    pub role: Role,
    /// False once the account is suspended
    pub active: bool,
}

impl UserRecord {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            active: true,
        }
    }

    pub fn suspended(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("courier".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_record_wire_shape() {
        let record = UserRecord::new(UserId::new("u1"), Role::Customer);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "customer");
        assert_eq!(json["active"], true);

        let parsed: UserRecord =
            serde_json::from_str(r#"{"id":"v9","type":"vendor","active":false}"#).unwrap();
        assert_eq!(parsed.role, Role::Vendor);
        assert!(!parsed.is_active());
    }
}
