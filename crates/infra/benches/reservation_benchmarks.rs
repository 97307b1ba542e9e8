//! Reserve/release cycle throughput over the in-memory stores.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use leadstock_catalog::{Availability, Product, ProductFilter, ProductId};
use leadstock_core::{CustomerId, EntityId};
use leadstock_infra::{
    EngineConfig, InMemoryCatalog, InMemoryLedger, InMemoryNotifier, ReservationEngine,
};
use leadstock_reservations::PriceSettings;

fn product(i: usize) -> Product {
    Product {
        id: ProductId::new(EntityId::new()),
        company_name: format!("Company {i}"),
        org_number: format!("556000-{i:04}"),
        address: "Main St 1".to_string(),
        city: "Stockholm".to_string(),
        postal_code: "11122".to_string(),
        business_type: "A1.2".to_string(),
        revenue: 1_000,
        employees: 10,
        availability: Availability::default(),
    }
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");

    let catalog = Arc::new(InMemoryCatalog::with_products((0..1_000).map(product)));
    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(InMemoryNotifier::new());
    let config = EngineConfig {
        arm_expiry_timers: false,
        ..Default::default()
    };
    let prices = PriceSettings {
        unit_price_minor: 600,
        vat_rate_percent: 25,
        currency: "SEK".to_string(),
    };
    let engine =
        ReservationEngine::new(catalog, ledger, notifier, config, prices).expect("valid engine");
    let customer = CustomerId::new();

    c.bench_function("reserve_release_25_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = engine
                    .reserve(customer, ProductFilter::default(), 25)
                    .await
                    .expect("reserve");
                black_box(&outcome);
                engine.release(customer).await.expect("release");
            })
        })
    });
}

criterion_group!(benches, bench_reserve_release);
criterion_main!(benches);
