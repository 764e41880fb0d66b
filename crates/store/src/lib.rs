//! Relational storage for the storefront.
//!
//! [`Store`] covers single-statement reads and writes for accounts, catalog,
//! carts and orders. Multi-step atomic work goes through a [`UnitOfWork`]
//! opened with [`Store::begin`]. Two implementations are provided:
//! [`PgStore`] on PostgreSQL and [`InMemoryStore`] for tests.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore, InMemoryUnitOfWork};
pub use model::{
    CartItem, CartLine, NewOrder, NewOrderLine, NewUser, Order, OrderLine, OrderWithLines, Page,
    Product, ProductInput, ProductStock, User,
};
pub use postgres::{PgStore, PgUnitOfWork};
pub use store::{Store, UnitOfWork};
