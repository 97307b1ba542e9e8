use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadstock_catalog::{Product, ProductFilter, ProductId};
use leadstock_core::CustomerId;

use super::CatalogStore;
use crate::store::StoreError;

/// In-memory product catalog.
///
/// Intended for tests/dev. Conditional updates run under the write lock, so
/// the claim-only-if-still-free semantics match the Postgres store. Nothing
/// awaits while a lock is held.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    /// Seed or replace a product record (catalog import is out-of-band).
    pub fn insert(&self, product: Product) {
        if let Ok(mut guard) = self.products.write() {
            guard.insert(product.id, product);
        }
    }

    /// Snapshot of a single product, for inspection.
    pub fn get(&self, id: ProductId) -> Option<Product> {
        self.products.read().ok()?.get(&id).cloned()
    }

    /// Product IDs currently held (reserved, not sold) by `holder`.
    pub fn held_by(&self, holder: CustomerId) -> Vec<ProductId> {
        match self.products.read() {
            Ok(guard) => guard
                .values()
                .filter(|p| {
                    p.availability.holder() == Some(holder)
                        && p.availability.reserved_until().is_some()
                })
                .map(|p| p.id)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ProductId, Product>>, StoreError> {
        self.products
            .read()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ProductId, Product>>, StoreError> {
        self.products
            .write()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_reservable(
        &self,
        filter: &ProductFilter,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProductId>, StoreError> {
        let guard = self.read()?;
        let mut candidates: Vec<ProductId> = guard
            .values()
            .filter(|p| p.is_reservable(now) && filter.matches(p))
            .map(|p| p.id)
            .collect();
        drop(guard);

        // Unspecified, randomized order (the stores' ORDER BY random()):
        // no customer can predict which specific products they get.
        candidates.sort_by_cached_key(|_| Uuid::new_v4());
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn claim_if_free(
        &self,
        ids: &[ProductId],
        holder: CustomerId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let mut claimed = 0u64;
        for id in ids {
            if let Some(product) = guard.get_mut(id) {
                if product.availability.claim(holder, until, now) {
                    claimed += 1;
                }
            }
        }
        Ok(claimed)
    }

    async fn release_held_by(&self, holder: CustomerId) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let mut released = 0u64;
        for product in guard.values_mut() {
            if product.availability.holder() == Some(holder) && product.availability.release() {
                released += 1;
            }
        }
        Ok(released)
    }

    async fn mark_sold(
        &self,
        holder: CustomerId,
        sold_until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let mut updated = 0u64;
        for product in guard.values_mut() {
            if product.availability.holder() == Some(holder)
                && product.availability.mark_sold(sold_until)
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let mut cleared = 0u64;
        for product in guard.values_mut() {
            if product.availability.clear_expired(now) {
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use leadstock_catalog::Availability;
    use leadstock_core::EntityId;

    fn product(business_type: &str) -> Product {
        Product {
            id: ProductId::new(EntityId::new()),
            company_name: "Acme Ltd".to_string(),
            org_number: "556000-0001".to_string(),
            address: "Main St 1".to_string(),
            city: "Stockholm".to_string(),
            postal_code: "11122".to_string(),
            business_type: business_type.to_string(),
            revenue: 1_000,
            employees: 10,
            availability: Availability::default(),
        }
    }

    #[tokio::test]
    async fn claim_is_conditional_on_reservability() {
        let now = Utc::now();
        let until = now + Duration::minutes(15);
        let p = product("A1.2");
        let id = p.id;
        let catalog = InMemoryCatalog::with_products([p]);

        let first = CustomerId::new();
        let second = CustomerId::new();

        assert_eq!(catalog.claim_if_free(&[id], first, until, now).await.unwrap(), 1);
        // The losing side of the race claims nothing.
        assert_eq!(catalog.claim_if_free(&[id], second, until, now).await.unwrap(), 0);
        assert_eq!(catalog.get(id).unwrap().availability.holder(), Some(first));
    }

    #[tokio::test]
    async fn find_reservable_excludes_held_products() {
        let now = Utc::now();
        let products: Vec<Product> = (0..4).map(|_| product("A1")).collect();
        let first_id = products[0].id;
        let catalog = InMemoryCatalog::with_products(products);

        let holder = CustomerId::new();
        catalog
            .claim_if_free(&[first_id], holder, now + Duration::minutes(15), now)
            .await
            .unwrap();

        let found = catalog
            .find_reservable(&ProductFilter::default(), 10, now)
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert!(!found.contains(&first_id));
    }

    #[tokio::test]
    async fn find_reservable_caps_at_limit() {
        let catalog = InMemoryCatalog::with_products((0..10).map(|_| product("A1")));
        let found = catalog
            .find_reservable(&ProductFilter::default(), 4, Utc::now())
            .await
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn sweep_clears_only_expired_holds() {
        let now = Utc::now();
        let fresh = product("A1");
        let stale = product("A1");
        let fresh_id = fresh.id;
        let stale_id = stale.id;
        let catalog = InMemoryCatalog::with_products([fresh, stale]);

        let holder = CustomerId::new();
        catalog
            .claim_if_free(&[fresh_id], holder, now + Duration::minutes(15), now)
            .await
            .unwrap();
        catalog
            .claim_if_free(&[stale_id], holder, now - Duration::seconds(1), now - Duration::minutes(16))
            .await
            .unwrap();

        assert_eq!(catalog.sweep_expired(now).await.unwrap(), 1);
        assert_eq!(catalog.held_by(holder), vec![fresh_id]);
    }

    #[tokio::test]
    async fn mark_sold_only_touches_the_holders_products() {
        let now = Utc::now();
        let mine = product("A1");
        let theirs = product("A1");
        let mine_id = mine.id;
        let theirs_id = theirs.id;
        let catalog = InMemoryCatalog::with_products([mine, theirs]);

        let me = CustomerId::new();
        let them = CustomerId::new();
        let until = now + Duration::minutes(15);
        catalog.claim_if_free(&[mine_id], me, until, now).await.unwrap();
        catalog.claim_if_free(&[theirs_id], them, until, now).await.unwrap();

        let sold_until = now + Duration::days(30);
        assert_eq!(catalog.mark_sold(me, sold_until).await.unwrap(), 1);

        let sold = catalog.get(mine_id).unwrap();
        assert_eq!(sold.availability.sold_until(), Some(sold_until));
        assert_eq!(sold.availability.holder(), Some(me));
        assert!(catalog.get(theirs_id).unwrap().availability.sold_until().is_none());
    }
}
