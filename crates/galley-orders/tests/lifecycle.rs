//! Concurrent use of the order lifecycle against one shared store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use galley_core::{GalleyError, OfferingBuilder, OfferingId, OrderId, OrderStatus, TransitionCause};
use galley_menu::{Catalog, Composer};
use galley_orders::{OrderManager, PlaceOrderItem};
use galley_store::{InMemoryStore, Store};
use rust_decimal::Decimal;

async fn offering_with_stock(store: &Arc<InMemoryStore>, quantity: u32) -> OfferingId {
    let catalog = Catalog::new(store.clone());
    let composer = Composer::new(store.clone());
    let dough = catalog.create_ingredient("Dough").await.unwrap();
    let tomato = catalog.create_ingredient("Tomato").await.unwrap();
    composer
        .define_offering(
            OfferingBuilder::new()
                .name("Margherita")
                .price(Decimal::new(950, 2))
                .quantity(quantity)
                .mandatory(dough.id)
                .removable(tomato.id)
                .build()
                .unwrap(),
        )
        .await
        .unwrap()
        .id
}

async fn available(store: &InMemoryStore, offering: OfferingId) -> u32 {
    store
        .read(move |tables| Ok(tables.offering(offering)?.quantity))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_placements_never_oversell() {
    let store = Arc::new(InMemoryStore::new());
    let offering = offering_with_stock(&store, 20).await;
    let orders = OrderManager::new(store.clone());

    let mut handles = vec![];
    for table in 0..50u64 {
        let orders = orders.clone();
        handles.push(tokio::spawn(async move {
            orders
                .place_order_item(PlaceOrderItem::new(OrderId(table), offering, 1))
                .await
        }));
    }

    let mut placed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(GalleyError::OutOfStock { .. }) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(placed, 20);
    assert_eq!(out_of_stock, 30);
    assert_eq!(available(&store, offering).await, 0);
}

#[tokio::test]
async fn concurrent_place_and_cancel_round_trip() {
    let store = Arc::new(InMemoryStore::new());
    let offering = offering_with_stock(&store, 100).await;
    let orders = OrderManager::new(store.clone());

    let mut handles = vec![];
    for table in 0..25u64 {
        let orders = orders.clone();
        handles.push(tokio::spawn(async move {
            let item = orders
                .place_order_item(PlaceOrderItem::new(OrderId(table), offering, 3))
                .await?;
            orders.cancel_order_item(item.id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(available(&store, offering).await, 100);
}

#[tokio::test]
async fn advance_and_sweep_race_moves_one_edge_each() {
    let store = Arc::new(InMemoryStore::new());
    let offering = offering_with_stock(&store, 100).await;
    let orders = OrderManager::new(store.clone());

    let mut items = vec![];
    for table in 0..10u64 {
        items.push(
            orders
                .place_order_item(PlaceOrderItem::new(OrderId(table), offering, 1))
                .await
                .unwrap(),
        );
    }

    // Every item is due for the sweep; every item also gets an explicit advance.
    let now = Utc::now() + Duration::seconds(61);
    let mut handles = vec![];
    for item in &items {
        let orders = orders.clone();
        let id = item.id;
        handles.push(tokio::spawn(async move { orders.advance_status(id).await.map(|_| ()) }));
    }
    for _ in 0..3 {
        let orders = orders.clone();
        handles.push(tokio::spawn(async move {
            orders.refresh_order_statuses_at(now, None).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for item in &items {
        let history = orders.transitions(item.id).await.unwrap();
        // Each recorded step is a single edge of the graph.
        for step in history.iter().skip(1) {
            let from = step.from.unwrap();
            assert!(from.can_transition_to(step.to));
        }
        let status = orders.status(item.id).await.unwrap();
        assert!(matches!(status, OrderStatus::Preparing | OrderStatus::Served));
        let sweeps = history
            .iter()
            .filter(|t| t.cause == TransitionCause::Sweep)
            .count();
        assert!(sweeps <= 1);
    }
}

#[tokio::test]
async fn cancel_races_advance_without_double_restore() {
    let store = Arc::new(InMemoryStore::new());
    let offering = offering_with_stock(&store, 10).await;
    let orders = OrderManager::new(store.clone());

    let item = orders
        .place_order_item(PlaceOrderItem::new(OrderId(1), offering, 4))
        .await
        .unwrap();
    orders.advance_status(item.id).await.unwrap();
    orders.advance_status(item.id).await.unwrap();

    let mut handles = vec![];
    for _ in 0..5 {
        let orders = orders.clone();
        let id = item.id;
        handles.push(tokio::spawn(async move { orders.cancel_order_item(id).await }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, GalleyError::InvalidTransition { from: OrderStatus::Served, .. }));
    }

    assert_eq!(available(&store, offering).await, 6);
    assert_eq!(orders.status(item.id).await.unwrap(), OrderStatus::Served);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_placement_leaves_no_partial_state() {
    let store = Arc::new(InMemoryStore::new());
    let offering = offering_with_stock(&store, 10).await;
    let orders = OrderManager::new(store.clone());

    // Hold the store busy so the placement is still waiting when dropped.
    let blocker = store.clone();
    let busy = tokio::spawn(async move {
        blocker
            .write(|_| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(())
            })
            .await
    });
    tokio::task::yield_now().await;

    let placement = orders.place_order_item(PlaceOrderItem::new(OrderId(1), offering, 2));
    let _ = tokio::time::timeout(std::time::Duration::from_millis(1), placement).await;
    busy.await.unwrap().unwrap();

    let snapshot = store.snapshot().await;
    let placed = snapshot.order_items.len();
    let remaining = snapshot.offering(offering).unwrap().quantity;
    assert!(
        (placed == 0 && remaining == 10) || (placed == 1 && remaining == 8),
        "placed {} items with {} remaining",
        placed,
        remaining
    );
}
