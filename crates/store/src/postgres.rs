use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, OrderStatus, ProductId, Role, UserId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::NUMERIC_VALUE_OUT_OF_RANGE;
use crate::model::{
    CartItem, CartLine, NewOrder, NewOrderLine, NewUser, Order, OrderLine, OrderWithLines, Page,
    Product, ProductInput, ProductStock, User,
};
use crate::store::{Store, UnitOfWork};
use crate::{Result, StoreError};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool and verifies the connection.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::from_stored(row.try_get::<&str, _>("role")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price")?),
            stock_quantity: row.try_get("stock_quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            total_amount: Money::from_cents(row.try_get("total_amount")?),
            status: parse_status(row.try_get("status")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|e: common::ParseStatusError| StoreError::InvalidData(e.to_string()))
}

/// Maps constraint violations raised by the schema to store errors.
fn map_constraint_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("users_email_key") => return StoreError::Duplicate("email"),
            Some("cart_items_product_id_fkey") => return StoreError::MissingReference("product"),
            Some("cart_items_user_id_fkey") => return StoreError::MissingReference("user"),
            Some("order_items_product_id_fkey") => return StoreError::StillReferenced("product"),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn is_out_of_range(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err)
        if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE))
}

fn to_uuids(product_ids: &[ProductId]) -> Vec<Uuid> {
    product_ids.iter().map(ProductId::as_uuid).collect()
}

/// A unit of work backed by a PostgreSQL transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY product_id ASC
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn products_for_update(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductStock>> {
        // Rows are locked in the order the sort returns them.
        let rows = sqlx::query(
            r#"
            SELECT id, price, stock_quantity
            FROM products
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(to_uuids(product_ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ProductStock {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    price: Money::from_cents(row.try_get("price")?),
                    stock_quantity: row.try_get("stock_quantity")?,
                })
            })
            .collect()
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, total_amount, status)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, total_amount, status, created_at
            "#,
        )
        .bind(order.user_id.as_uuid())
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        PgStore::row_to_order(&row)
    }

    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(line.order_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(line.quantity)
        .bind(line.price_at_purchase.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: i32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $1, updated_at = NOW()
            WHERE id = $2 AND stock_quantity >= $1
            "#,
        )
        .bind(quantity)
        .bind(product_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::StockUnderflow {
                product_id,
                quantity,
            });
        }
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId, product_ids: &[ProductId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(user_id.as_uuid())
            .bind(to_uuids(product_ids))
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(UserId::new().as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_constraint_error)?;

        Self::row_to_user(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn create_product(&self, input: ProductInput) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at
            "#,
        )
        .bind(ProductId::new().as_uuid())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.stock_quantity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn list_products(&self, page: Page) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM products
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        input: ProductInput,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, description = $2, price = $3, stock_quantity = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price.cents())
        .bind(input.stock_quantity)
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_constraint_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_out_of_range(&err) {
                StoreError::QuantityOutOfRange(product_id)
            } else {
                map_constraint_error(err)
            }
        })?;

        Ok(())
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id, ci.quantity, p.id AS product_id, p.name, p.price
            FROM cart_items ci
            JOIN products p ON ci.product_id = p.id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartItem {
                    id: row.try_get("id")?,
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    name: row.try_get("name")?,
                    price: Money::from_cents(row.try_get("price")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, total_amount, status, created_at FROM orders WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderWithLines>> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id, o.user_id, o.total_amount, o.status, o.created_at,
                oi.product_id, p.name AS product_name, oi.quantity, oi.price_at_purchase
            FROM orders o
            JOIN order_items oi ON o.id = oi.order_id
            JOIN products p ON oi.product_id = p.id
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id, oi.created_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        // Rows arrive grouped by order; start a new entry whenever the id changes.
        let mut history: Vec<OrderWithLines> = Vec::new();
        for row in rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            if history.last().is_none_or(|entry| entry.order.id != order_id) {
                history.push(OrderWithLines {
                    order: Self::row_to_order(&row)?,
                    lines: Vec::new(),
                });
            }

            let line = OrderLine {
                product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                product_name: row.try_get("product_name")?,
                quantity: row.try_get("quantity")?,
                price_at_purchase: Money::from_cents(row.try_get("price_at_purchase")?),
            };
            if let Some(entry) = history.last_mut() {
                entry.lines.push(line);
            }
        }

        Ok(history)
    }

    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(next.as_str())
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
