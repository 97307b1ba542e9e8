use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use leadstock_core::{DomainError, DomainResult, ValueObject};

use crate::product::Product;

/// Category prefix of a business type code: everything before the first `.`,
/// whitespace-trimmed. `"A1.2"` and `"A1"` share the prefix `"A1"`.
pub fn category_prefix(code: &str) -> &str {
    let trimmed = code.trim();
    match trimmed.find('.') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    }
}

/// Criteria a reservation selects products by.
///
/// Every dimension is optional; an empty set or `None` bound is a wildcard.
/// The same value doubles as the filter snapshot stored on a reservation for
/// audit/display — `regions` and `cities_by_region` exist only for that
/// snapshot, and the upper bounds are snapshot-only too: selection applies
/// the lower bounds, matching what the catalog queries have always done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub business_types: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub cities_by_region: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub postal_codes: BTreeSet<String>,
    pub min_revenue: Option<i64>,
    pub max_revenue: Option<i64>,
    pub min_employees: Option<u32>,
    pub max_employees: Option<u32>,
}

impl ValueObject for ProductFilter {}

impl ProductFilter {
    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(min), Some(max)) = (self.min_revenue, self.max_revenue) {
            if min > max {
                return Err(DomainError::validation(format!(
                    "min_revenue {min} exceeds max_revenue {max}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_employees, self.max_employees) {
            if min > max {
                return Err(DomainError::validation(format!(
                    "min_employees {min} exceeds max_employees {max}"
                )));
            }
        }
        Ok(())
    }

    /// Category prefixes to query by, one per requested business type.
    pub fn business_type_prefixes(&self) -> BTreeSet<String> {
        self.business_types
            .iter()
            .map(|code| category_prefix(code).to_string())
            .collect()
    }

    /// Whether a product satisfies every supplied dimension.
    ///
    /// Availability is deliberately not part of this predicate; callers
    /// combine it with `Product::is_reservable`.
    pub fn matches(&self, product: &Product) -> bool {
        if !self.business_types.is_empty() {
            let prefix = category_prefix(&product.business_type);
            if !self
                .business_types
                .iter()
                .any(|code| category_prefix(code) == prefix)
            {
                return false;
            }
        }
        if !self.cities.is_empty() && !self.cities.contains(&product.city) {
            return false;
        }
        if !self.postal_codes.is_empty() && !self.postal_codes.contains(&product.postal_code) {
            return false;
        }
        if let Some(min) = self.min_revenue {
            if product.revenue < min {
                return false;
            }
        }
        if let Some(min) = self.min_employees {
            if product.employees < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{Availability, ProductId};
    use leadstock_core::EntityId;

    fn product(business_type: &str, city: &str, postal_code: &str, revenue: i64, employees: u32) -> Product {
        Product {
            id: ProductId::new(EntityId::new()),
            company_name: "Acme Ltd".to_string(),
            org_number: "556000-0001".to_string(),
            address: "Main St 1".to_string(),
            city: city.to_string(),
            postal_code: postal_code.to_string(),
            business_type: business_type.to_string(),
            revenue,
            employees,
            availability: Availability::default(),
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn category_prefix_stops_at_first_dot() {
        assert_eq!(category_prefix("A1.2"), "A1");
        assert_eq!(category_prefix("A1.2.3"), "A1");
        assert_eq!(category_prefix("A1"), "A1");
        assert_eq!(category_prefix("  B7.1 "), "B7");
        assert_eq!(category_prefix(""), "");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ProductFilter::default();
        assert!(filter.matches(&product("A1.2", "Stockholm", "11122", 500, 3)));
        assert!(filter.matches(&product("Z9", "Umeå", "90325", 0, 0)));
    }

    #[test]
    fn business_type_matches_on_prefix() {
        let filter = ProductFilter {
            business_types: set(&["A1.2"]),
            ..Default::default()
        };
        assert!(filter.matches(&product("A1.7", "Malmö", "21120", 100, 1)));
        assert!(filter.matches(&product("A1", "Malmö", "21120", 100, 1)));
        assert!(!filter.matches(&product("A2.1", "Malmö", "21120", 100, 1)));
    }

    #[test]
    fn city_and_postal_code_are_membership_checks() {
        let filter = ProductFilter {
            cities: set(&["Stockholm", "Göteborg"]),
            postal_codes: set(&["11122"]),
            ..Default::default()
        };
        assert!(filter.matches(&product("A1", "Stockholm", "11122", 100, 1)));
        assert!(!filter.matches(&product("A1", "Malmö", "11122", 100, 1)));
        assert!(!filter.matches(&product("A1", "Stockholm", "11133", 100, 1)));
    }

    #[test]
    fn lower_bounds_apply_upper_bounds_do_not() {
        let filter = ProductFilter {
            min_revenue: Some(1_000),
            max_revenue: Some(5_000),
            min_employees: Some(10),
            ..Default::default()
        };
        assert!(!filter.matches(&product("A1", "Lund", "22100", 999, 10)));
        assert!(!filter.matches(&product("A1", "Lund", "22100", 1_000, 9)));
        // Above the stored upper bound still matches: max is snapshot-only.
        assert!(filter.matches(&product("A1", "Lund", "22100", 9_000, 10)));
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let filter = ProductFilter {
            min_revenue: Some(100),
            max_revenue: Some(50),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = ProductFilter {
            min_employees: Some(20),
            max_employees: Some(5),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        assert!(ProductFilter::default().validate().is_ok());
    }

    #[test]
    fn prefixes_are_deduplicated() {
        let filter = ProductFilter {
            business_types: set(&["A1.2", "A1.9", "B3"]),
            ..Default::default()
        };
        assert_eq!(filter.business_type_prefixes(), set(&["A1", "B3"]));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a prefix never contains the separator.
            #[test]
            fn prefix_never_contains_a_dot(code in "[A-Z0-9. ]{0,16}") {
                prop_assert!(!category_prefix(&code).contains('.'));
            }

            /// Property: prefixing is idempotent.
            #[test]
            fn prefix_is_idempotent(code in "[A-Z][0-9]{0,3}(\\.[0-9]{1,2})?") {
                let once = category_prefix(&code).to_string();
                prop_assert_eq!(category_prefix(&once), once.as_str());
            }

            /// Property: a filter built from a product's own attributes
            /// always matches that product.
            #[test]
            fn own_attributes_always_match(
                bt in "[A-Z][0-9]\\.[0-9]",
                city in "[A-Za-z]{3,12}",
                postal in "[0-9]{5}",
                revenue in 0i64..10_000_000,
                employees in 0u32..5_000,
            ) {
                let p = product(&bt, &city, &postal, revenue, employees);
                let filter = ProductFilter {
                    business_types: [bt.clone()].into_iter().collect(),
                    cities: [city.clone()].into_iter().collect(),
                    postal_codes: [postal.clone()].into_iter().collect(),
                    min_revenue: Some(revenue),
                    min_employees: Some(employees),
                    ..Default::default()
                };
                prop_assert!(filter.matches(&p));
            }
        }
    }
}
