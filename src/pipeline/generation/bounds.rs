//! Category bound table: how many tests, and which test categories, each
//! GAMP category requires. Supplied as configuration; an unlisted category
//! is an explicit error, never a default bound.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{FailureKind, GenerationError};
use crate::models::{GampCategory, TestCategory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBound {
    pub min_tests: u32,
    pub max_tests: u32,
    pub required_test_categories: Vec<TestCategory>,
}

impl CategoryBound {
    pub fn contains(&self, count: u32) -> bool {
        (self.min_tests..=self.max_tests).contains(&count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBoundTable {
    categories: BTreeMap<GampCategory, CategoryBound>,
}

impl CategoryBoundTable {
    /// GAMP-5 defaults.
    pub fn standard() -> Self {
        use TestCategory::*;

        let mut categories = BTreeMap::new();
        categories.insert(
            GampCategory::Category1,
            CategoryBound {
                min_tests: 3,
                max_tests: 5,
                required_test_categories: vec![Installation, Functional],
            },
        );
        categories.insert(
            GampCategory::Category3,
            CategoryBound {
                min_tests: 5,
                max_tests: 10,
                required_test_categories: vec![Installation, Functional],
            },
        );
        categories.insert(
            GampCategory::Category4,
            CategoryBound {
                min_tests: 15,
                max_tests: 20,
                required_test_categories: vec![Functional, Integration, Security, DataIntegrity],
            },
        );
        categories.insert(
            GampCategory::Category5,
            CategoryBound {
                min_tests: 25,
                max_tests: 30,
                required_test_categories: vec![
                    Functional,
                    Integration,
                    Security,
                    DataIntegrity,
                    Performance,
                ],
            },
        );
        Self { categories }
    }

    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| GenerationError::Config(format!("Invalid category bound table: {e}")))?;
        table.check()?;
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self, GenerationError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::Config(format!(
                "Cannot read category bound table {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    /// Add or replace the bound for one category.
    pub fn insert(&mut self, category: GampCategory, bound: CategoryBound) {
        self.categories.insert(category, bound);
    }

    pub fn bounds_for(&self, category: GampCategory) -> Result<&CategoryBound, GenerationError> {
        self.categories
            .get(&category)
            .ok_or(GenerationError::UnknownCategory(category))
    }

    /// Request-time check: the category is configured and any explicit
    /// target lies within its bound.
    pub fn check_request(
        &self,
        category: GampCategory,
        requested: Option<u32>,
    ) -> Result<&CategoryBound, FailureKind> {
        let bound = self
            .bounds_for(category)
            .map_err(|_| FailureKind::UnknownCategory { category })?;

        if let Some(requested) = requested {
            if !bound.contains(requested) {
                return Err(FailureKind::CategoryOutOfRange {
                    category,
                    requested,
                    min: bound.min_tests,
                    max: bound.max_tests,
                });
            }
        }

        Ok(bound)
    }

    fn check(&self) -> Result<(), GenerationError> {
        if self.categories.is_empty() {
            return Err(GenerationError::Config(
                "Category bound table has no categories".into(),
            ));
        }
        for (category, bound) in &self.categories {
            if bound.min_tests == 0 || bound.min_tests > bound.max_tests {
                return Err(GenerationError::Config(format!(
                    "Invalid bound for {category}: {}-{}",
                    bound.min_tests, bound.max_tests
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_all_categories() {
        let table = CategoryBoundTable::standard();
        for category in GampCategory::ALL {
            assert!(table.bounds_for(category).is_ok(), "{category} missing");
        }
    }

    #[test]
    fn boundary_counts_are_accepted() {
        let table = CategoryBoundTable::standard();
        for category in GampCategory::ALL {
            let bound = table.bounds_for(category).unwrap().clone();
            assert!(table.check_request(category, Some(bound.min_tests)).is_ok());
            assert!(table.check_request(category, Some(bound.max_tests)).is_ok());
        }
    }

    #[test]
    fn one_past_either_boundary_is_out_of_range() {
        let table = CategoryBoundTable::standard();
        for category in GampCategory::ALL {
            let bound = table.bounds_for(category).unwrap().clone();
            for requested in [bound.min_tests - 1, bound.max_tests + 1] {
                let err = table.check_request(category, Some(requested)).unwrap_err();
                assert!(
                    matches!(err, FailureKind::CategoryOutOfRange { requested: r, .. } if r == requested),
                    "{category} accepted {requested}"
                );
            }
        }
    }

    #[test]
    fn no_target_only_requires_configured_category() {
        let table = CategoryBoundTable::standard();
        assert!(table.check_request(GampCategory::Category5, None).is_ok());
    }

    #[test]
    fn unlisted_category_is_explicit_error() {
        let table = CategoryBoundTable::from_json(
            r#"{"categories": {"1": {"min_tests": 1, "max_tests": 2, "required_test_categories": []}}}"#,
        )
        .unwrap();
        assert!(matches!(
            table.bounds_for(GampCategory::Category4),
            Err(GenerationError::UnknownCategory(GampCategory::Category4))
        ));
        assert!(matches!(
            table.check_request(GampCategory::Category4, None),
            Err(FailureKind::UnknownCategory { .. })
        ));
    }

    #[test]
    fn inserted_bound_replaces_standard_one() {
        let mut table = CategoryBoundTable::standard();
        table.insert(
            GampCategory::Category3,
            CategoryBound {
                min_tests: 2,
                max_tests: 4,
                required_test_categories: vec![TestCategory::Functional],
            },
        );
        assert!(table.check_request(GampCategory::Category3, Some(2)).is_ok());
        assert!(matches!(
            table.check_request(GampCategory::Category3, Some(5)),
            Err(FailureKind::CategoryOutOfRange { min: 2, max: 4, .. })
        ));
        assert_eq!(
            table.bounds_for(GampCategory::Category4).unwrap(),
            CategoryBoundTable::standard().bounds_for(GampCategory::Category4).unwrap()
        );
    }

    #[test]
    fn from_json_rejects_inverted_bounds() {
        let err = CategoryBoundTable::from_json(
            r#"{"categories": {"3": {"min_tests": 9, "max_tests": 4, "required_test_categories": []}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn from_json_rejects_unknown_category_code() {
        let err = CategoryBoundTable::from_json(
            r#"{"categories": {"2": {"min_tests": 1, "max_tests": 4, "required_test_categories": []}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn from_json_rejects_empty_table() {
        assert!(CategoryBoundTable::from_json(r#"{"categories": {}}"#).is_err());
    }

    #[test]
    fn standard_table_round_trips_through_json() {
        let table = CategoryBoundTable::standard();
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"4\""));
        assert_eq!(CategoryBoundTable::from_json(&json).unwrap(), table);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CategoryBoundTable::from_file(&tmp.path().join("bounds.json")).unwrap_err();
        assert!(err.to_string().contains("Cannot read category bound table"));
    }
}
