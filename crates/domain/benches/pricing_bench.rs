use common::ItemId;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{PriceLine, RandomCredentialIssuer, Table, UnitPrice, price};

fn cart(lines: usize) -> Vec<PriceLine> {
    (0..lines)
        .map(|i| {
            PriceLine::new(
                ItemId::new(),
                format!("Item {i}"),
                UnitPrice::from_ten_thousandths(12_345 + i as i64),
                (i % 5 + 1) as u32,
            )
        })
        .collect()
}

fn bench_price(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/price");
    for size in [1, 10, 100] {
        let lines = cart(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| price(lines).unwrap());
        });
    }
    group.finish();
}

fn bench_tab_cycle(c: &mut Criterion) {
    let issuer = RandomCredentialIssuer;
    let order = price(&cart(3)).unwrap();

    c.bench_function("domain/tab_open_append_settle", |b| {
        b.iter(|| {
            let mut table = Table::new(common::EstablishmentId::new(), "T1").unwrap();
            for _ in 0..5 {
                table
                    .record_sale(common::SaleId::new(), order.total(), &issuer)
                    .unwrap();
            }
            table.free(&issuer).unwrap();
        });
    });
}

criterion_group!(benches, bench_price, bench_tab_cycle);
criterion_main!(benches);
