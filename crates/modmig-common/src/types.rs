use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry key of a module, e.g. `billing`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleSlug(String);

/// Stable migration identifier derived from the file stem, e.g. `2024_01_02_add_index`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

macro_rules! impl_id_type {
    ($t:ty) => {
        impl $t {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $t {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

impl_id_type!(ModuleSlug);
impl_id_type!(MigrationId);

#[cfg(test)]
mod tests {
    use super::{MigrationId, ModuleSlug};

    #[test]
    fn migration_ids_order_by_stamp() {
        let mut ids: Vec<MigrationId> = vec![
            "2024_01_02_add_index".into(),
            "2023_12_01_init".into(),
            "2024_01_01_create_invoices".into(),
        ];
        ids.sort();

        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2023_12_01_init",
                "2024_01_01_create_invoices",
                "2024_01_02_add_index"
            ]
        );
    }

    #[test]
    fn slug_serializes_as_plain_string() {
        let slug = ModuleSlug::new("billing");
        assert_eq!(serde_json::to_string(&slug).unwrap(), "\"billing\"");
        assert_eq!(slug.to_string(), "billing");
    }
}
