//! Sale-editing session: one table, its open sale, and the cart being built.

use serde::Serialize;

use tableside_core::{Cart, CoreResult, ItemSpec, LineItem, Money, Sale, StoreScope, Table};

/// Returned by `open_table` / `resume` and consumed by the finalizer.
///
/// The cart lives only here; nothing is persisted until finalization.
#[derive(Debug, Clone, Serialize)]
pub struct SaleSession {
    scope: StoreScope,
    table: Table,
    sale: Sale,
    cart: Cart,
}

impl SaleSession {
    pub(crate) fn new(scope: StoreScope, table: Table, sale: Sale) -> Self {
        SaleSession {
            scope,
            table,
            sale,
            cart: Cart::new(),
        }
    }

    pub fn scope(&self) -> StoreScope {
        self.scope
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn sale(&self) -> &Sale {
        &self.sale
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn add_item(&mut self, spec: ItemSpec) -> CoreResult<usize> {
        self.cart.add_item(spec)
    }

    pub fn update_quantity(&mut self, index: usize, new_qty: i64) -> CoreResult<()> {
        self.cart.update_quantity(index, new_qty)
    }

    pub fn remove_item(&mut self, index: usize) -> CoreResult<LineItem> {
        self.cart.remove_item(index)
    }

    pub fn total(&self) -> Money {
        self.cart.total()
    }

    /// Records the committed state after a successful finalization.
    pub(crate) fn complete(&mut self, table: Table, sale: Sale) {
        self.table = table;
        self.sale = sale;
        self.cart.clear();
    }
}
