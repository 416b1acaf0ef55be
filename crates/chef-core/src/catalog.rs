//! Static catalog tables: upgrades, skins and unboxing cases.
//!
//! The shipped tables live in `assets/catalog.yaml` and are embedded at
//! compile time. A catalog that fails validation is a fatal misconfiguration.

use crate::{CaseItem, Skin, UnboxingCase, Upgrade, DEFAULT_SKIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../../../assets/catalog.yaml");

/// Immutable game tables loaded once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    /// Production upgrades in shop order.
    pub upgrades: Vec<Upgrade>,
    /// Cosmetic skins; must contain the default skin at cost 0.
    pub skins: Vec<Skin>,
    /// Purchasable cases with their item pools.
    pub cases: Vec<UnboxingCase>,
}

/// Catalog load and validation failures.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// The YAML document could not be parsed.
    #[error("catalog parse error: {0}")]
    Parse(String),
    /// Two entries of one table share an id.
    #[error("duplicate {table} id: {id}")]
    DuplicateId { table: &'static str, id: String },
    /// Cost, income or multiplier is NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(String),
    /// Cost, income or multiplier is below zero.
    #[error("negative value in {0}")]
    NegativeValue(String),
    /// A case without any items cannot be opened.
    #[error("case {0} has an empty item pool")]
    EmptyCase(String),
    /// The free default skin is absent or not free.
    #[error("default skin `default_chef` missing or not free")]
    MissingDefaultSkin,
}

impl Catalog {
    /// Parse and validate a catalog document.
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            serde_yaml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;
        validate_catalog(&catalog)?;
        Ok(catalog)
    }

    /// The tables shipped with the game.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn upgrade(&self, id: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    pub fn skin(&self, id: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.id == id)
    }

    pub fn case(&self, id: &str) -> Option<&UnboxingCase> {
        self.cases.iter().find(|c| c.id == id)
    }
}

fn check_amount(value: f64, what: impl Fn() -> String) -> Result<(), CatalogError> {
    if !value.is_finite() {
        return Err(CatalogError::NonFinite(what()));
    }
    if value < 0.0 {
        return Err(CatalogError::NegativeValue(what()));
    }
    Ok(())
}

fn check_unique<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId {
                table,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_case_item(case_id: &str, item: &CaseItem) -> Result<(), CatalogError> {
    check_amount(item.multiplier, || format!("case {case_id} item {}", item.id))
}

/// Validate cross-table invariants of a catalog.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), CatalogError> {
    check_unique("upgrade", catalog.upgrades.iter().map(|u| u.id.as_str()))?;
    check_unique("skin", catalog.skins.iter().map(|s| s.id.as_str()))?;
    check_unique("case", catalog.cases.iter().map(|c| c.id.as_str()))?;

    for u in &catalog.upgrades {
        check_amount(u.base_cost, || format!("upgrade {}", u.id))?;
        check_amount(u.income_per_sec, || format!("upgrade {}", u.id))?;
    }
    for s in &catalog.skins {
        check_amount(s.cost, || format!("skin {}", s.id))?;
    }
    match catalog.skin(DEFAULT_SKIN) {
        Some(s) if s.cost == 0.0 => {}
        _ => return Err(CatalogError::MissingDefaultSkin),
    }
    for c in &catalog.cases {
        check_amount(c.cost, || format!("case {}", c.id))?;
        if c.items.is_empty() {
            return Err(CatalogError::EmptyCase(c.id.clone()));
        }
        for item in &c.items {
            validate_case_item(&c.id, item)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rarity;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.upgrades.len(), 11);
        assert_eq!(catalog.skins.len(), 9);
        assert_eq!(catalog.cases.len(), 4);
        let budget = catalog.case("budget_case").unwrap();
        assert_eq!(budget.cost, 50.0);
        assert_eq!(budget.items.len(), 10);
        let gala = catalog.case("michelin_case").unwrap();
        assert!(gala.items.iter().all(|i| i.rarity != Rarity::Common));
        assert_eq!(gala.items[0].name, "1945 Champagne");
    }

    #[test]
    fn duplicate_upgrade_rejected() {
        let text = r#"
upgrades:
  - { id: a, name: A, base_cost: 1, income_per_sec: 1, kind: staff }
  - { id: a, name: B, base_cost: 2, income_per_sec: 2, kind: equipment }
skins:
  - { id: default_chef, name: Classic, cost: 0 }
cases: []
"#;
        assert_eq!(
            Catalog::from_yaml(text).unwrap_err(),
            CatalogError::DuplicateId {
                table: "upgrade",
                id: "a".into()
            }
        );
    }

    #[test]
    fn missing_default_skin_rejected() {
        let text = r#"
upgrades: []
skins:
  - { id: fancy, name: Fancy, cost: 10 }
cases: []
"#;
        assert_eq!(
            Catalog::from_yaml(text).unwrap_err(),
            CatalogError::MissingDefaultSkin
        );
    }

    #[test]
    fn empty_case_and_negative_values_rejected() {
        let empty = r#"
upgrades: []
skins: [{ id: default_chef, name: Classic, cost: 0 }]
cases: [{ id: c, name: C, cost: 5, items: [] }]
"#;
        assert_eq!(
            Catalog::from_yaml(empty).unwrap_err(),
            CatalogError::EmptyCase("c".into())
        );
        let negative = r#"
upgrades: [{ id: a, name: A, base_cost: -1, income_per_sec: 1, kind: staff }]
skins: [{ id: default_chef, name: Classic, cost: 0 }]
cases: []
"#;
        assert!(matches!(
            Catalog::from_yaml(negative).unwrap_err(),
            CatalogError::NegativeValue(_)
        ));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            Catalog::from_yaml("upgrades: 7").unwrap_err(),
            CatalogError::Parse(_)
        ));
    }
}
