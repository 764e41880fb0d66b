//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderStatus, ProductId, Role, UserId};
use sqlx::PgPool;
use store::{
    NewOrder, NewOrderLine, NewUser, Page, PgStore, ProductInput, Store, StoreError, UnitOfWork,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PgStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE cart_items, order_items, orders, products, users CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PgStore::new(pool)
}

async fn create_user(store: &PgStore, email: &str) -> UserId {
    store
        .create_user(NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Customer,
        })
        .await
        .unwrap()
        .id
}

async fn create_product(store: &PgStore, name: &str, price: i64, stock: i32) -> ProductId {
    store
        .create_product(ProductInput {
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(price),
            stock_quantity: stock,
        })
        .await
        .unwrap()
        .id
}

async fn stock_of(store: &PgStore, product_id: ProductId) -> i32 {
    store
        .get_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let store = get_test_store().await;
    create_user(&store, "buyer@example.com").await;

    let result = store
        .create_user(NewUser {
            email: "buyer@example.com".to_string(),
            password_hash: "other".to_string(),
            role: Role::Customer,
        })
        .await;

    assert!(matches!(result, Err(StoreError::Duplicate("email"))));
    let found = store
        .find_user_by_email("buyer@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.password_hash, "hash");
}

#[tokio::test]
async fn product_crud() {
    let store = get_test_store().await;
    let product_id = create_product(&store, "Poster", 2000, 5).await;

    let updated = store
        .update_product(
            product_id,
            ProductInput {
                name: "Signed Poster".to_string(),
                description: "limited".to_string(),
                price: Money::from_cents(2500),
                stock_quantity: 3,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Signed Poster");
    assert_eq!(updated.price, Money::from_cents(2500));

    let listed = store.list_products(Page::default()).await.unwrap();
    assert_eq!(listed.len(), 1);

    assert!(store.delete_product(product_id).await.unwrap());
    assert!(store.get_product(product_id).await.unwrap().is_none());
    assert!(!store.delete_product(product_id).await.unwrap());
}

#[tokio::test]
async fn add_to_cart_upserts_quantity() {
    let store = get_test_store().await;
    let user_id = create_user(&store, "buyer@example.com").await;
    let product_id = create_product(&store, "Poster", 2000, 5).await;

    store.add_to_cart(user_id, product_id, 2).await.unwrap();
    store.add_to_cart(user_id, product_id, 1).await.unwrap();

    let items = store.cart_items(user_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].subtotal(), Some(Money::from_cents(6000)));

    let missing = store.add_to_cart(user_id, ProductId::new(), 1).await;
    assert!(matches!(missing, Err(StoreError::MissingReference("product"))));

    assert!(store.remove_from_cart(user_id, product_id).await.unwrap());
    assert!(!store.remove_from_cart(user_id, product_id).await.unwrap());
}

#[tokio::test]
async fn add_to_cart_rejects_quantity_past_column_range() {
    let store = get_test_store().await;
    let user_id = create_user(&store, "bulk@example.com").await;
    let product_id = create_product(&store, "Sticker", 100, 5).await;

    store.add_to_cart(user_id, product_id, i32::MAX).await.unwrap();
    let result = store.add_to_cart(user_id, product_id, 1).await;
    assert!(matches!(result, Err(StoreError::QuantityOutOfRange(id)) if id == product_id));

    let items = store.cart_items(user_id).await.unwrap();
    assert_eq!(items[0].quantity, i32::MAX);
}

#[tokio::test]
async fn dropped_unit_of_work_rolls_back() {
    let store = get_test_store().await;
    let user_id = create_user(&store, "buyer@example.com").await;
    let product_id = create_product(&store, "Poster", 2000, 5).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(NewOrder {
            user_id,
            total_amount: Money::from_cents(2000),
            status: OrderStatus::Pending,
        })
        .await
        .unwrap();
        tx.decrement_stock(product_id, 1).await.unwrap();
    }

    assert_eq!(stock_of(&store, product_id).await, 5);
    assert!(store.order_history(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn decrement_stops_at_zero() {
    let store = get_test_store().await;
    let product_id = create_product(&store, "Poster", 2000, 1).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx.decrement_stock(product_id, 2).await;
    assert!(matches!(
        result,
        Err(StoreError::StockUnderflow { quantity: 2, .. })
    ));
    tx.rollback().await.unwrap();

    assert_eq!(stock_of(&store, product_id).await, 1);
}

#[tokio::test]
async fn products_for_update_blocks_second_locker() {
    let store = get_test_store().await;
    let product_id = create_product(&store, "Poster", 2000, 1).await;

    let mut first = store.begin().await.unwrap();
    let locked = first.products_for_update(&[product_id]).await.unwrap();
    assert_eq!(locked.len(), 1);

    let contender = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut second = store.begin().await.unwrap();
            let rows = second.products_for_update(&[product_id]).await.unwrap();
            second.commit().await.unwrap();
            rows[0].stock_quantity
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!contender.is_finished());

    first.decrement_stock(product_id, 1).await.unwrap();
    first.commit().await.unwrap();

    // The contender wakes up and sees the committed value.
    assert_eq!(contender.await.unwrap(), 0);
}

#[tokio::test]
async fn order_history_groups_lines() {
    let store = get_test_store().await;
    let user_id = create_user(&store, "buyer@example.com").await;
    let poster = create_product(&store, "Poster", 2000, 5).await;
    let mug = create_product(&store, "Mug", 800, 5).await;

    let mut tx = store.begin().await.unwrap();
    let order = tx
        .insert_order(NewOrder {
            user_id,
            total_amount: Money::from_cents(2800),
            status: OrderStatus::Pending,
        })
        .await
        .unwrap();
    for (product_id, price) in [(poster, 2000), (mug, 800)] {
        tx.insert_order_line(NewOrderLine {
            order_id: order.id,
            product_id,
            quantity: 1,
            price_at_purchase: Money::from_cents(price),
        })
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();

    let history = store.order_history(user_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order.id, order.id);
    assert_eq!(history[0].lines.len(), 2);

    // Referenced products cannot be deleted.
    assert!(matches!(
        store.delete_product(poster).await,
        Err(StoreError::StillReferenced("product"))
    ));
}

#[tokio::test]
async fn compare_and_set_status_checks_expected() {
    let store = get_test_store().await;
    let user_id = create_user(&store, "buyer@example.com").await;

    let mut tx = store.begin().await.unwrap();
    let order = tx
        .insert_order(NewOrder {
            user_id,
            total_amount: Money::from_cents(100),
            status: OrderStatus::Pending,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(
        store
            .compare_and_set_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap()
    );
    assert!(
        !store
            .compare_and_set_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap()
    );

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Processing);
}
