//! Identifier types for platform entities
//!
//! User and order ids are opaque strings issued by the document store.
//! Connection ids are generated locally with UUID v7 so they sort by
//! connect time in logs.

use crate::errors::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Characters with meaning in a URL path; ids are interpolated into
/// internal service paths.
const RESERVED: [char; 4] = ['/', '?', '#', '%'];

fn check_id(kind: &'static str, value: &str) -> Result<(), TypesError> {
    if value.is_empty() {
        return Err(TypesError::EmptyId { kind });
    }
    let reserved = |c: char| c.is_whitespace() || RESERVED.contains(&c);
    if value == "." || value == ".." || value.chars().any(reserved) {
        return Err(TypesError::MalformedId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Identifier of a customer, vendor or admin account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an id issued by the user service without validation
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate a client-supplied id
    pub fn parse(id: &str) -> Result<Self, TypesError> {
        check_id("user", id)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn parse(id: &str) -> Result<Self, TypesError> {
        check_id("order", id)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of one live transport connection
///
/// A user keeps the same `UserId` across reconnects but every transport
/// session gets a fresh `ConnectionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_creation() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2, "ConnectionIds should be unique");
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::parse("64f1a2").unwrap().as_str(), "64f1a2");
        assert_eq!(
            UserId::parse(""),
            Err(TypesError::EmptyId { kind: "user" })
        );
        assert!(matches!(
            UserId::parse("a b"),
            Err(TypesError::MalformedId { kind: "user", .. })
        ));
    }

    #[test]
    fn test_order_id_from_str() {
        let id: OrderId = "ord-17".parse().unwrap();
        assert_eq!(id.to_string(), "ord-17");
        assert!("".parse::<OrderId>().is_err());
    }

    #[test]
    fn test_path_characters_rejected() {
        for raw in ["../users/alice?x=", "o1#frag", "o%2F1", "..", "."] {
            assert!(
                matches!(OrderId::parse(raw), Err(TypesError::MalformedId { kind: "order", .. })),
                "{raw} should be rejected"
            );
        }
        assert!(OrderId::parse("ord-17.v2").is_ok());
    }

    #[test]
    fn test_user_id_serialization() {
        let id = UserId::new("u1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u1\"");
    }
}
