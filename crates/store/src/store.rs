use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, UserId};

use crate::Result;
use crate::model::{
    CartItem, CartLine, NewOrder, NewOrderLine, NewUser, Order, OrderWithLines, Page, Product,
    ProductInput, ProductStock, User,
};

/// An atomic, all-or-nothing scope of reads and writes.
///
/// Writes become visible to other callers only after [`UnitOfWork::commit`].
/// [`UnitOfWork::commit`] and [`UnitOfWork::rollback`] consume the unit, so it
/// is closed exactly once. Dropping an unfinished unit discards all of its
/// writes, which covers early returns, panics and cancelled futures.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads the user's cart lines ordered by product id, locking them
    /// until the unit ends.
    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Reads price and stock for the given products, taking an exclusive
    /// row lock on each.
    ///
    /// Locks are acquired in one statement in ascending product id order.
    /// Products that do not exist are absent from the result.
    async fn products_for_update(
        &mut self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ProductStock>>;

    /// Inserts an order header and returns it with its generated id.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Inserts one order line.
    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()>;

    /// Decrements stock, failing with `StockUnderflow` if the result
    /// would be negative.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: i32) -> Result<()>;

    /// Deletes the given products from the user's cart, returning the
    /// number of lines removed.
    async fn clear_cart(&mut self, user_id: UserId, product_ids: &[ProductId]) -> Result<u64>;

    /// Makes every write of this unit durable and visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this unit.
    async fn rollback(self) -> Result<()>;
}

/// Core trait for storage implementations.
///
/// All implementations must be thread-safe (Send + Sync). Single-statement
/// operations live here; multi-step atomic work goes through [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit of work type handed out by [`Store::begin`].
    type Tx: UnitOfWork + 'static;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Registers a user. Fails with `Duplicate("email")` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Looks up a user by (normalized) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Adds a product to the catalog.
    async fn create_product(&self, input: ProductInput) -> Result<Product>;

    /// Lists products, newest first.
    async fn list_products(&self, page: Page) -> Result<Vec<Product>>;

    /// Retrieves a product by id.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Replaces a product's editable fields. Returns None if it doesn't exist.
    async fn update_product(
        &self,
        product_id: ProductId,
        input: ProductInput,
    ) -> Result<Option<Product>>;

    /// Deletes a product and any cart lines holding it.
    ///
    /// Returns false if it doesn't exist; fails with `StillReferenced` if an
    /// order line references it.
    async fn delete_product(&self, product_id: ProductId) -> Result<bool>;

    /// Adds `quantity` of a product to the user's cart, summing with any
    /// existing line for the same product.
    async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()>;

    /// Lists the user's cart lines joined with product data, newest first.
    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Removes a product from the user's cart. Returns false if it wasn't there.
    async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Retrieves an order header by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists every order of a user with its lines, newest first.
    async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderWithLines>>;

    /// Sets an order's status only if it currently equals `expected`.
    ///
    /// Returns false if the order is missing or its status changed.
    async fn compare_and_set_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool>;
}
