use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Fields this client does not model (phone, addresses, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backends disagree on whether ids are strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

impl UserProfile {
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            role: None,
            email_verified: None,
            extra: Map::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(role))
            .unwrap_or(false)
    }

    /// "First Last", falling back to the email address
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.clone(),
        }
    }

    /// Lay this (full) profile over `basis`, typically the minimal profile
    /// returned by login or refresh. Fields present here win; anything this
    /// profile omits is taken from `basis`.
    pub fn merged_over(self, basis: &UserProfile) -> UserProfile {
        let mut extra = basis.extra.clone();
        extra.extend(self.extra);

        UserProfile {
            id: self.id,
            email: self.email,
            first_name: self.first_name.or_else(|| basis.first_name.clone()),
            last_name: self.last_name.or_else(|| basis.last_name.clone()),
            role: self.role.or_else(|| basis.role.clone()),
            email_verified: self.email_verified.or(basis.email_verified),
            extra,
        }
    }
}
