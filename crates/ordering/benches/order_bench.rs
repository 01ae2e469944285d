use std::sync::Arc;

use common::{EstablishmentId, TableId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{CatalogItem, Establishment, RandomCredentialIssuer, Stock, UnitPrice};
use ordering::{Cart, CartLine, Fulfillment, OrderRequest, OrderWorkflow, RetryPolicy};
use store::{InMemoryStore, Store};

struct Fixture {
    workflow: OrderWorkflow<InMemoryStore>,
    establishment_id: EstablishmentId,
    cart: Cart,
}

fn seed(rt: &tokio::runtime::Runtime, lines: usize) -> Fixture {
    let store = InMemoryStore::new();
    let establishment = Establishment::new("Bench Diner", "1 Loop Rd").unwrap();
    let establishment_id = establishment.id;
    let mut cart_lines = Vec::with_capacity(lines);

    rt.block_on(async {
        store.insert_establishment(establishment).await.unwrap();
        for i in 0..lines {
            let stock = if i % 2 == 0 {
                Stock::Counted(u32::MAX)
            } else {
                Stock::Unlimited
            };
            let item = CatalogItem::new(
                establishment_id,
                format!("Item {i}"),
                "",
                UnitPrice::from_ten_thousandths(12_345),
                stock,
            );
            cart_lines.push(CartLine::new(item.id, 1));
            store.insert_item(item).await.unwrap();
        }
    });

    Fixture {
        workflow: OrderWorkflow::new(
            store,
            Arc::new(RandomCredentialIssuer),
            RetryPolicy::default(),
        ),
        establishment_id,
        cart: Cart::new(cart_lines),
    }
}

fn bench_takeout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("ordering/place_takeout");

    for size in [1, 10, 50] {
        let fixture = seed(&rt, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &fixture, |b, f| {
            b.iter(|| {
                rt.block_on(async {
                    f.workflow
                        .place_order(OrderRequest {
                            establishment_id: f.establishment_id,
                            cart: f.cart.clone(),
                            fulfillment: Fulfillment::Takeout,
                            completed: true,
                        })
                        .await
                        .unwrap();
                });
            });
        });
    }
    group.finish();
}

fn bench_dine_in_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fixture = seed(&rt, 3);
    let table_id: TableId = rt.block_on(async {
        fixture
            .workflow
            .tables()
            .create(fixture.establishment_id, "Bench")
            .await
            .unwrap()
            .id()
    });

    c.bench_function("ordering/place_dine_in_append", |b| {
        b.iter(|| {
            rt.block_on(async {
                fixture
                    .workflow
                    .place_order(OrderRequest {
                        establishment_id: fixture.establishment_id,
                        cart: fixture.cart.clone(),
                        fulfillment: Fulfillment::DineIn { table_id },
                        completed: false,
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_takeout, bench_dine_in_append);
criterion_main!(benches);
