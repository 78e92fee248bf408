pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod money;
pub mod order;
pub mod page;
pub mod user;

pub use cart::{CartLine, CartSummary, VariantSelection};
pub use catalog::{Product, ProductSort, Variant};
pub use checkout::{StockLedger, StockTake};
pub use order::{Order, OrderItem, OrderStatus, OrderTotals, ShippingAddress, UnknownStatus};
pub use page::{PageRequest, Paginated, Pagination};
pub use user::{Provider, Role, UserProfile};
