use common::{InventoryRecordId, ProductId, Sku, WarehouseId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use inventory::{AuditContext, InventoryLedger, NewWarehouse, ReservationCoordinator, plan_fifo};

async fn coordinator_with(warehouses: u64, per_warehouse: u32) -> (ReservationCoordinator, Sku) {
    let ledger = InventoryLedger::default();
    let sku = Sku::product(ProductId::new(1));
    for i in 0..warehouses {
        let wh = ledger
            .register_warehouse(NewWarehouse::new(format!("WH-{i}"), "bench"))
            .await
            .unwrap();
        ledger
            .create_record(wh.id, sku, per_warehouse, &AuditContext::new())
            .await
            .unwrap();
    }
    (ReservationCoordinator::new(ledger), sku)
}

fn bench_plan_fifo(c: &mut Criterion) {
    let capacities: Vec<_> = (1..=50u64)
        .map(|i| (WarehouseId::new(i), InventoryRecordId::new(i), 3u32))
        .collect();

    c.bench_function("allocation/plan_fifo_50_warehouses", |b| {
        b.iter(|| plan_fifo(capacities.iter().copied(), 120));
    });
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("coordinator/reserve_release");

    for warehouses in [1u64, 8, 32] {
        let (coordinator, sku) = rt.block_on(coordinator_with(warehouses, 10));
        let audit = AuditContext::new();
        let quantity = (warehouses as u32 * 10) / 2;

        group.bench_with_input(BenchmarkId::from_parameter(warehouses), &warehouses, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    coordinator.reserve(sku, quantity, &audit).await.unwrap();
                    coordinator.release(sku, quantity, &audit).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

fn bench_check_availability(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (coordinator, sku) = rt.block_on(coordinator_with(16, 25));

    c.bench_function("coordinator/check_availability", |b| {
        b.iter(|| rt.block_on(coordinator.check_availability(sku, 100)));
    });
}

criterion_group!(
    benches,
    bench_plan_fifo,
    bench_reserve_release,
    bench_check_availability
);
criterion_main!(benches);
