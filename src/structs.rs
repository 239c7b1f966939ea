use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Patron {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub pwd_hash: String,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Patron {
    /// First and last name if present, otherwise the email address.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Category {
    Liquor,
    Mixer,
    Wine,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Liquor => "liquor",
            Category::Mixer => "mixer",
            Category::Wine => "wine",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "liquor" => Ok(Category::Liquor),
            "mixer" => Ok(Category::Mixer),
            "wine" => Ok(Category::Wine),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub category: Category,
    pub brand: Option<String>,
    pub notes: Option<String>,
    pub purchase_date: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Validated item fields handed to the store adapter.
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub name: String,
    pub quantity: i64,
    pub category: Category,
    pub brand: Option<String>,
    pub notes: Option<String>,
    pub purchase_date: Option<String>,
}

/// Uniform result body for all mutating actions.
#[derive(Serialize, Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        ActionResult {
            success: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ActionResult {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patron(first: Option<&str>, last: Option<&str>) -> Patron {
        Patron {
            id: 1,
            email: "gin@example.com".into(),
            first_name: first.map(Into::into),
            last_name: last.map(Into::into),
            pwd_hash: String::new(),
            created_by: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn display_name_joins_first_and_last() {
        assert_eq!(patron(Some("Ada"), Some("Lovelace")).display_name(), "Ada Lovelace");
    }

    #[test]
    fn display_name_uses_single_part_when_other_missing() {
        assert_eq!(patron(Some("Ada"), None).display_name(), "Ada");
        assert_eq!(patron(None, Some("Lovelace")).display_name(), "Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(patron(None, None).display_name(), "gin@example.com");
        assert_eq!(patron(Some(""), Some("")).display_name(), "gin@example.com");
    }

    #[test]
    fn category_parses_lowercase_names_only() {
        assert_eq!("liquor".parse::<Category>().unwrap(), Category::Liquor);
        assert_eq!("mixer".parse::<Category>().unwrap(), Category::Mixer);
        assert_eq!("wine".parse::<Category>().unwrap(), Category::Wine);
        assert!("beer".parse::<Category>().is_err());
        assert!("Liquor".parse::<Category>().is_err());
    }
}
