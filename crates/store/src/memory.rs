use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, ProductId, Role, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::model::{
    CartItem, CartLine, NewOrder, NewOrderLine, NewUser, Order, OrderLine, OrderWithLines, Page,
    Product, ProductInput, ProductStock, User,
};
use crate::store::{Store, UnitOfWork};
use crate::{Result, StoreError};

/// Points inside a unit of work where the in-memory store can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertOrder,
    InsertOrderLine,
    DecrementStock,
    ClearCart,
    Commit,
}

#[derive(Debug, Clone)]
struct CartEntry {
    id: Uuid,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(Debug, Clone)]
struct StoredOrderLine {
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price_at_purchase: Money,
}

/// All tables, kept in insertion order.
#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    products: Vec<Product>,
    cart: Vec<CartEntry>,
    orders: Vec<Order>,
    order_lines: Vec<StoredOrderLine>,
    fail_point: Option<FailPoint>,
}

impl MemoryState {
    fn product(&self, product_id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    fn check_fail_point(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            tracing::debug!(?point, "injecting store failure");
            return Err(StoreError::Injected(point));
        }
        Ok(())
    }
}

/// In-memory store implementation for tests and local runs.
///
/// A unit of work holds the store-wide lock from `begin` until it ends, so
/// units are fully serialized. Writes go to a private copy of the tables that
/// replaces the shared state only on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent unit of work fail at `point`. `None` clears it.
    pub async fn set_fail_point(&self, point: Option<FailPoint>) {
        self.state.lock().await.fail_point = point;
    }

    /// Grants the admin role to a registered user.
    pub async fn promote_to_admin(&self, user_id: UserId) -> bool {
        let mut state = self.state.lock().await;
        match state.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.role = Role::Admin;
                true
            }
            None => false,
        }
    }

    /// Returns the number of orders stored for a user.
    pub async fn order_count(&self, user_id: UserId) -> usize {
        let state = self.state.lock().await;
        state.orders.iter().filter(|o| o.user_id == user_id).count()
    }
}

/// A unit of work over the in-memory store.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>> {
        let mut lines: Vec<CartLine> = self
            .working
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| CartLine {
                product_id: c.product_id,
                quantity: c.quantity,
            })
            .collect();
        lines.sort_by_key(|l| l.product_id);
        Ok(lines)
    }

    async fn products_for_update(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductStock>> {
        let mut stock: Vec<ProductStock> = self
            .working
            .products
            .iter()
            .filter(|p| product_ids.contains(&p.id))
            .map(|p| ProductStock {
                product_id: p.id,
                price: p.price,
                stock_quantity: p.stock_quantity,
            })
            .collect();
        stock.sort_by_key(|s| s.product_id);
        Ok(stock)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        self.working.check_fail_point(FailPoint::InsertOrder)?;

        let order = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: Utc::now(),
        };
        self.working.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()> {
        self.working.check_fail_point(FailPoint::InsertOrderLine)?;

        if !self.working.orders.iter().any(|o| o.id == line.order_id) {
            return Err(StoreError::MissingReference("order"));
        }
        if self.working.product(line.product_id).is_none() {
            return Err(StoreError::MissingReference("product"));
        }
        self.working.order_lines.push(StoredOrderLine {
            order_id: line.order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_purchase: line.price_at_purchase,
        });
        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: i32) -> Result<()> {
        self.working.check_fail_point(FailPoint::DecrementStock)?;

        let product = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product_id && p.stock_quantity >= quantity)
            .ok_or(StoreError::StockUnderflow {
                product_id,
                quantity,
            })?;
        product.stock_quantity -= quantity;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId, product_ids: &[ProductId]) -> Result<u64> {
        self.working.check_fail_point(FailPoint::ClearCart)?;

        let before = self.working.cart.len();
        self.working
            .cart
            .retain(|c| !(c.user_id == user_id && product_ids.contains(&c.product_id)));
        Ok((before - self.working.cart.len()) as u64)
    }

    async fn commit(self) -> Result<()> {
        self.working.check_fail_point(FailPoint::Commit)?;

        let InMemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let guard = self.state.clone().lock_owned().await;
        let working = MemoryState::clone(&guard);
        Ok(InMemoryUnitOfWork { guard, working })
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }

        let user = User {
            id: UserId::new(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_product(&self, input: ProductInput) -> Result<Product> {
        let now: DateTime<Utc> = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock_quantity: input.stock_quantity,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.products.push(product.clone());
        Ok(product)
    }

    async fn list_products(&self, page: Page) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .iter()
            .rev()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.product(product_id).cloned())
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        input: ProductInput,
    ) -> Result<Option<Product>> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) else {
            return Ok(None);
        };

        product.name = input.name;
        product.description = input.description;
        product.price = input.price;
        product.stock_quantity = input.stock_quantity;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.order_lines.iter().any(|l| l.product_id == product_id) {
            return Err(StoreError::StillReferenced("product"));
        }

        let before = state.products.len();
        state.products.retain(|p| p.id != product_id);
        if state.products.len() == before {
            return Ok(false);
        }
        state.cart.retain(|c| c.product_id != product_id);
        Ok(true)
    }

    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.product(product_id).is_none() {
            return Err(StoreError::MissingReference("product"));
        }
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::MissingReference("user"));
        }

        match state
            .cart
            .iter_mut()
            .find(|c| c.user_id == user_id && c.product_id == product_id)
        {
            Some(entry) => {
                entry.quantity = entry
                    .quantity
                    .checked_add(quantity)
                    .ok_or(StoreError::QuantityOutOfRange(product_id))?;
            }
            None => state.cart.push(CartEntry {
                id: Uuid::new_v4(),
                user_id,
                product_id,
                quantity,
            }),
        }
        Ok(())
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let state = self.state.lock().await;
        Ok(state
            .cart
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .filter_map(|c| {
                state.product(c.product_id).map(|p| CartItem {
                    id: c.id,
                    product_id: p.id,
                    name: p.name.clone(),
                    price: p.price,
                    quantity: c.quantity,
                })
            })
            .collect())
    }

    async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|c| !(c.user_id == user_id && c.product_id == product_id));
        Ok(state.cart.len() < before)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderWithLines>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .map(|order| OrderWithLines {
                order: order.clone(),
                lines: state
                    .order_lines
                    .iter()
                    .filter(|l| l.order_id == order.id)
                    .map(|l| OrderLine {
                        product_id: l.product_id,
                        product_name: state
                            .product(l.product_id)
                            .map(|p| p.name.clone())
                            .unwrap_or_default(),
                        quantity: l.quantity,
                        price_at_purchase: l.price_at_purchase,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status == expected)
        {
            Some(order) => {
                order.status = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
