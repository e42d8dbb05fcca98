use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    Employee,
    Manager,
}

impl Role {
    /// Prefix of the employee identifiers issued to this role.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Role::Employee => "EMP",
            Role::Manager => "MGR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn prefixes() {
        assert_eq!(Role::Employee.id_prefix(), "EMP");
        assert_eq!(Role::Manager.id_prefix(), "MGR");
    }

    #[test]
    fn column_values_round_trip() {
        assert_eq!(Role::Manager.to_string(), "manager");
        assert_eq!(Role::from_str("employee").unwrap(), Role::Employee);
        assert!(Role::from_str("admin").is_err());
    }
}
