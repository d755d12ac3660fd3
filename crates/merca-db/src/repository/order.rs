//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CURRENT CART                                                       │
//! │     └── current_cart() → finds the customer's draft, or creates one    │
//! │         (one draft per customer, enforced by a partial unique index)   │
//! │                                                                         │
//! │  2. EDIT LINES                                                         │
//! │     └── add_item() / set_item_quantity() / remove_item()               │
//! │         each line re-resolves its discount for the new quantity        │
//! │         and the order totals are re-priced                             │
//! │                                                                         │
//! │  3. PLACE                                                              │
//! │     └── place() → UPDATE ... WHERE placed_at IS NULL                   │
//! │         the guarded update makes placement atomic; a second caller     │
//! │         affects zero rows and gets AlreadyPlaced                       │
//! │                                                                         │
//! │  4. FULFIL                                                             │
//! │     └── update_status() / update_payment_status()                      │
//! │         transitions checked by merca-core before the write             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Placed orders are frozen: every mutation path goes through the
//! `placed_at IS NULL` guard or an explicit draft check, so later rule
//! edits can never touch an order that has been placed.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::rule::RuleRepository;
use merca_core::resolver::{resolve, PricingContext, PricingMode};
use merca_core::{
    price_order, AppliedOrderDiscount, Currency, Customer, DeliveryMethod, ManualDiscount, Money,
    Order, OrderItem, OrderPricing, OrderStatus, Organisation, PaymentStatus, Product, Rate,
    ValidationError,
};

// =============================================================================
// Row Mapping
// =============================================================================

const ORDER_COLUMNS: &str = "id, organisation_id, customer_id, order_number, status, \
     payment_status, delivery_method, manual_discount, auto_discount, \
     subtotal_cents, tax_cents, shipping_cents, total_cents, currency, notes, \
     placed_at, created_at, updated_at";

/// Raw `orders` row. The discount snapshots live in JSON columns.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    organisation_id: String,
    customer_id: String,
    order_number: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    delivery_method: DeliveryMethod,
    manual_discount: Option<String>,
    auto_discount: Option<String>,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    currency: Currency,
    notes: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let manual_discount: Option<ManualDiscount> = self
            .manual_discount
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let auto_discount: Option<AppliedOrderDiscount> = self
            .auto_discount
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Order {
            id: self.id,
            organisation_id: self.organisation_id,
            customer_id: self.customer_id,
            order_number: self.order_number,
            status: self.status,
            payment_status: self.payment_status,
            delivery_method: self.delivery_method,
            manual_discount,
            auto_discount,
            subtotal: Money::from_cents(self.subtotal_cents, self.currency),
            tax_amount: Money::from_cents(self.tax_cents, self.currency),
            shipping_amount: Money::from_cents(self.shipping_cents, self.currency),
            total: Money::from_cents(self.total_cents, self.currency),
            notes: self.notes,
            placed_at: self.placed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw `order_items` row.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    order_id: String,
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    currency: Currency,
    quantity: i64,
    discount_bps: i64,
    created_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            name_snapshot: self.name_snapshot,
            unit_price: Money::from_cents(self.unit_price_cents, self.currency),
            quantity: self.quantity,
            discount_rate: Rate::from_bps(self.discount_bps as u32),
            created_at: self.created_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    fn rules(&self) -> RuleRepository {
        RuleRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Returns the customer's current draft cart, creating one when none
    /// exists. A concurrent creator loses the unique-index race and picks
    /// up the winner's draft instead.
    pub async fn current_cart(&self, organisation_id: &str, customer_id: &str) -> DbResult<Order> {
        if let Some(draft) = self.find_draft(organisation_id, customer_id).await? {
            return Ok(draft);
        }

        let organisation = self.require_organisation(organisation_id).await?;
        let customer = self.require_customer(customer_id).await?;
        if !customer.active {
            return Err(DbError::not_found("Customer", customer_id));
        }

        let sequence: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE organisation_id = ?1")
            .bind(organisation_id)
            .fetch_one(&self.pool)
            .await?;

        let now = Utc::now();
        let order = Order::draft(
            Uuid::new_v4().to_string(),
            &organisation,
            customer_id.to_string(),
            (sequence + 1) as u32,
            now,
        );

        debug!(id = %order.id, order_number = %order.order_number, "Creating draft order");

        match self.insert_order(&order).await {
            Ok(()) => Ok(order),
            // Lost the race: another request created the draft first
            Err(DbError::UniqueViolation { .. }) => self
                .find_draft(organisation_id, customer_id)
                .await?
                .ok_or_else(|| DbError::not_found("Draft order", customer_id)),
            Err(err) => Err(err),
        }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Gets an order by ID, erroring when absent.
    pub async fn require_order(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Lists a customer's placed orders, newest first.
    pub async fn placed_orders(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE customer_id = ?1 AND placed_at IS NOT NULL \
             ORDER BY placed_at DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Gets all items on an order, oldest line first.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, order_id, product_id, name_snapshot, unit_price_cents,
                   currency, quantity, discount_bps, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    // =========================================================================
    // Line Edits
    // =========================================================================

    /// Adds quantity of a product to a draft order, merging with an
    /// existing line for the same product. The line's discount is resolved
    /// for the resulting quantity and frozen on it.
    pub async fn add_item(
        &self,
        order_id: &str,
        product_id: &str,
        quantity: i64,
        today: NaiveDate,
    ) -> DbResult<OrderItem> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM order_items WHERE order_id = ?1 AND product_id = ?2",
        )
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let total = existing.unwrap_or(0) + quantity;
        self.set_item_quantity(order_id, product_id, total, today)
            .await?
            .ok_or_else(|| DbError::not_found("Order item", product_id))
    }

    /// Sets a line to an exact quantity, re-resolving its discount.
    /// A quantity of zero (or less) removes the line; returns the written
    /// line, or None when it was removed.
    pub async fn set_item_quantity(
        &self,
        order_id: &str,
        product_id: &str,
        quantity: i64,
        today: NaiveDate,
    ) -> DbResult<Option<OrderItem>> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        if quantity <= 0 {
            self.delete_item(order_id, product_id).await?;
            self.reprice(order_id, today).await?;
            return Ok(None);
        }

        let product = self.require_product(&order.organisation_id, product_id).await?;
        if quantity < product.min_order_quantity {
            return Err(DbError::validation(vec![
                ValidationError::BelowProductMinimum {
                    field: "quantity",
                    min: product.min_order_quantity,
                },
            ]));
        }

        // Resolve the discount for this customer at this quantity and
        // freeze the resulting rate on the line.
        let bundle = self
            .rules()
            .rules_for_product(product_id, Some(&order.customer_id))
            .await?;
        let snapshot = product.snapshot();
        let breakdown = resolve(
            &PricingContext {
                product: &snapshot,
                customer_id: Some(&order.customer_id),
                quantity,
                mode: PricingMode::Purchase,
            },
            &bundle.as_rule_set(),
            today,
        );
        let discount_bps = breakdown
            .effective
            .as_ref()
            .map(|e| e.percentage.bps() as i64)
            .unwrap_or(0);

        debug!(
            order_id = %order_id,
            product_id = %product_id,
            quantity,
            discount_bps,
            "Writing order line"
        );

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, name_snapshot, unit_price_cents,
                currency, quantity, discount_bps, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (order_id, product_id) DO UPDATE SET
                quantity = excluded.quantity,
                discount_bps = excluded.discount_bps,
                name_snapshot = excluded.name_snapshot,
                unit_price_cents = excluded.unit_price_cents
            "#,
        )
        .bind(&id)
        .bind(order_id)
        .bind(product_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.currency)
        .bind(quantity)
        .bind(discount_bps)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.reprice(order_id, today).await?;

        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, order_id, product_id, name_snapshot, unit_price_cents,
                   currency, quantity, discount_bps, created_at
            FROM order_items
            WHERE order_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(rows.into_item()))
    }

    /// Removes a line from a draft order.
    pub async fn remove_item(
        &self,
        order_id: &str,
        product_id: &str,
        today: NaiveDate,
    ) -> DbResult<()> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        self.delete_item(order_id, product_id).await?;
        self.reprice(order_id, today).await?;
        Ok(())
    }

    /// Sets or clears the staff manual discount on a draft order.
    pub async fn set_manual_discount(
        &self,
        order_id: &str,
        manual: Option<&ManualDiscount>,
        today: NaiveDate,
    ) -> DbResult<()> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        let json = manual.map(serde_json::to_string).transpose()?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE orders SET manual_discount = ?2, updated_at = ?3 \
             WHERE id = ?1 AND placed_at IS NULL",
        )
        .bind(order_id)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.reprice(order_id, today).await?;
        Ok(())
    }

    /// Changes the delivery method of a draft order (affects shipping).
    pub async fn set_delivery_method(
        &self,
        order_id: &str,
        method: DeliveryMethod,
        today: NaiveDate,
    ) -> DbResult<()> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE orders SET delivery_method = ?2, updated_at = ?3 \
             WHERE id = ?1 AND placed_at IS NULL",
        )
        .bind(order_id)
        .bind(method)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.reprice(order_id, today).await?;
        Ok(())
    }

    // =========================================================================
    // Pricing & Placement
    // =========================================================================

    /// Re-runs the pricing waterfall for a draft and stores the totals.
    /// Called after every line or discount edit.
    pub async fn reprice(&self, order_id: &str, today: NaiveDate) -> DbResult<OrderPricing> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        let pricing = self.compute_pricing(&order, today).await?;
        self.store_pricing(&order.id, &pricing).await?;
        Ok(pricing)
    }

    /// Places a draft order: prices it one final time, freezes the totals,
    /// and stamps `placed_at`. The guarded UPDATE makes this atomic - of
    /// two concurrent placements, exactly one succeeds.
    pub async fn place(&self, order_id: &str, today: NaiveDate) -> DbResult<Order> {
        let order = self.require_order(order_id).await?;
        order.ensure_draft()?;

        let items = self.items(order_id).await?;
        if items.is_empty() {
            return Err(DbError::validation(vec![ValidationError::Required {
                field: "order_items",
            }]));
        }

        let pricing = self.compute_pricing(&order, today).await?;
        let auto_json = pricing
            .auto_discount
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now();

        debug!(id = %order_id, total = %pricing.grand_total, "Placing order");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                auto_discount = ?2,
                subtotal_cents = ?3,
                tax_cents = ?4,
                shipping_cents = ?5,
                total_cents = ?6,
                placed_at = ?7,
                updated_at = ?7
            WHERE id = ?1 AND placed_at IS NULL
            "#,
        )
        .bind(order_id)
        .bind(auto_json)
        .bind(pricing.subtotal.cents())
        .bind(pricing.tax.cents())
        .bind(pricing.shipping.cents())
        .bind(pricing.grand_total.cents())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(merca_core::CoreError::AlreadyPlaced {
                order_id: order_id.to_string(),
            }
            .into());
        }

        self.require_order(order_id).await
    }

    // =========================================================================
    // Fulfilment
    // =========================================================================

    /// Advances the fulfilment status. The transition table in merca-core
    /// rejects backward or skipped steps before anything is written.
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        let mut order = self.require_order(order_id).await?;
        let now = Utc::now();
        order.set_status(next, now)?;

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(next)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(order)
    }

    /// Advances the payment status along its allowed transitions.
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        next: PaymentStatus,
    ) -> DbResult<Order> {
        let mut order = self.require_order(order_id).await?;
        let now = Utc::now();
        order.set_payment_status(next, now)?;

        sqlx::query("UPDATE orders SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(next)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(order)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn find_draft(
        &self,
        organisation_id: &str,
        customer_id: &str,
    ) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE organisation_id = ?1 AND customer_id = ?2 AND placed_at IS NULL"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(organisation_id)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn insert_order(&self, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, organisation_id, customer_id, order_number, status,
                payment_status, delivery_method, manual_discount, auto_discount,
                subtotal_cents, tax_cents, shipping_cents, total_cents,
                currency, notes, placed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&order.id)
        .bind(&order.organisation_id)
        .bind(&order.customer_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.delivery_method)
        .bind(Option::<String>::None)
        .bind(Option::<String>::None)
        .bind(order.subtotal.cents())
        .bind(order.tax_amount.cents())
        .bind(order.shipping_amount.cents())
        .bind(order.total.cents())
        .bind(order.subtotal.currency())
        .bind(&order.notes)
        .bind(order.placed_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_item(&self, order_id: &str, product_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM order_items WHERE order_id = ?1 AND product_id = ?2")
            .bind(order_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn compute_pricing(&self, order: &Order, today: NaiveDate) -> DbResult<OrderPricing> {
        let organisation = self.require_organisation(&order.organisation_id).await?;
        let items = self.items(&order.id).await?;
        let tiers = self.rules().order_discounts(&order.organisation_id).await?;

        Ok(price_order(
            &items,
            &tiers,
            order.manual_discount.as_ref(),
            &organisation,
            order.delivery_method,
            today,
        ))
    }

    async fn store_pricing(&self, order_id: &str, pricing: &OrderPricing) -> DbResult<()> {
        let auto_json = pricing
            .auto_discount
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE orders SET
                auto_discount = ?2,
                subtotal_cents = ?3,
                tax_cents = ?4,
                shipping_cents = ?5,
                total_cents = ?6,
                updated_at = ?7
            WHERE id = ?1 AND placed_at IS NULL
            "#,
        )
        .bind(order_id)
        .bind(auto_json)
        .bind(pricing.subtotal.cents())
        .bind(pricing.tax.cents())
        .bind(pricing.shipping.cents())
        .bind(pricing.grand_total.cents())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn require_organisation(&self, id: &str) -> DbResult<Organisation> {
        let organisation = sqlx::query_as::<_, Organisation>(
            r#"
            SELECT id, name, slug, currency, tax_rate_bps, shipping_cost_cents,
                   created_at, updated_at
            FROM organisations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        organisation.ok_or_else(|| DbError::not_found("Organisation", id))
    }

    async fn require_customer(&self, id: &str) -> DbResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, organisation_id, company_name, active, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        customer.ok_or_else(|| DbError::not_found("Customer", id))
    }

    async fn require_product(&self, organisation_id: &str, id: &str) -> DbResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, organisation_id, sku, name, description,
                   price_cents, currency, min_order_quantity, active,
                   created_at, updated_at
            FROM products
            WHERE id = ?1 AND organisation_id = ?2 AND active = 1
            "#,
        )
        .bind(id)
        .bind(organisation_id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| DbError::not_found("Product", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use merca_core::{
        CoreError, CustomerDiscount, DiscountTerms, DiscountValue, OrderDiscount, ValidityWindow,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2026, 6, 15)
    }

    async fn seeded_db() -> (Database, Organisation, Customer, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let now = Utc::now();

        let org = Organisation {
            id: Uuid::new_v4().to_string(),
            name: "Acme Wholesale".into(),
            slug: "acme".into(),
            currency: Currency::Eur,
            tax_rate_bps: 2100,
            shipping_cost_cents: 500,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_organisation(&org).await.unwrap();

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            company_name: "Bakkerij Jansen".into(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_customer(&customer).await.unwrap();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            sku: "FLOUR-25".into(),
            name: "Flour 25kg".into(),
            description: None,
            price_cents: 1000,
            currency: Currency::Eur,
            min_order_quantity: 1,
            active: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_product(&product).await.unwrap();

        (db, org, customer, product)
    }

    #[tokio::test]
    async fn test_current_cart_is_reused() {
        let (db, org, customer, _product) = seeded_db().await;
        let orders = db.orders();

        let first = orders.current_cart(&org.id, &customer.id).await.unwrap();
        let second = orders.current_cart(&org.id, &customer.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.order_number.starts_with("ACME-"));
        assert!(first.order_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_add_item_snapshots_discount_and_reprices() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();
        let rules = db.rules();
        let now = Utc::now();

        rules
            .create_customer_discount(&CustomerDiscount {
                id: Uuid::new_v4().to_string(),
                organisation_id: org.id.clone(),
                customer_id: customer.id.clone(),
                terms: DiscountTerms {
                    value: DiscountValue::Percentage(Rate::from_bps(2000)),
                    window: ValidityWindow::perpetual(),
                    stackable: true,
                    active: true,
                },
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        let line = orders
            .add_item(&cart.id, &product.id, 3, today())
            .await
            .unwrap();

        assert_eq!(line.discount_rate, Rate::from_bps(2000));
        assert_eq!(line.line_total(), Money::eur(2400)); // 3 × €8.00

        let cart = orders.require_order(&cart.id).await.unwrap();
        assert_eq!(cart.subtotal, Money::eur(2400));
        assert_eq!(cart.tax_amount, Money::eur(504)); // 21%
        assert_eq!(cart.shipping_amount, Money::eur(500));
        assert_eq!(cart.total, Money::eur(3404));
    }

    #[tokio::test]
    async fn test_add_item_merges_quantities() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&cart.id, &product.id, 2, today()).await.unwrap();
        let line = orders.add_item(&cart.id, &product.id, 3, today()).await.unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(orders.items(&cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quantity_below_product_floor_rejected() {
        let (db, org, customer, mut product) = seeded_db().await;
        let catalog = db.catalog();
        let orders = db.orders();

        product.id = Uuid::new_v4().to_string();
        product.sku = "PALLET".into();
        product.min_order_quantity = 10;
        catalog.insert_product(&product).await.unwrap();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        let err = orders
            .add_item(&cart.id, &product.id, 5, today())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_pickup_waives_shipping() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&cart.id, &product.id, 1, today()).await.unwrap();
        orders
            .set_delivery_method(&cart.id, DeliveryMethod::Pickup, today())
            .await
            .unwrap();

        let cart = orders.require_order(&cart.id).await.unwrap();
        assert_eq!(cart.shipping_amount, Money::eur(0));
    }

    #[tokio::test]
    async fn test_place_applies_best_tier_and_freezes() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();
        let rules = db.rules();
        let now = Utc::now();

        rules
            .create_order_discount(&OrderDiscount {
                id: Uuid::new_v4().to_string(),
                organisation_id: org.id.clone(),
                min_order_amount: Money::eur(5000),
                terms: DiscountTerms {
                    value: DiscountValue::Percentage(Rate::from_bps(1000)),
                    window: ValidityWindow::perpetual(),
                    stackable: false,
                    active: true,
                },
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&cart.id, &product.id, 6, today()).await.unwrap(); // €60.00

        let placed = orders.place(&cart.id, today()).await.unwrap();
        assert!(placed.is_placed());
        let auto = placed.auto_discount.as_ref().unwrap();
        assert_eq!(auto.amount, Money::eur(600)); // 10% of €60.00
        // 6000 - 600 = 5400; 21% tax = 1134; shipping 500
        assert_eq!(placed.total, Money::eur(7034));

        // Frozen: edits and a second placement are rejected
        let err = orders
            .add_item(&cart.id, &product.id, 1, today())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadyPlaced { .. })));
        let err = orders.place(&cart.id, today()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadyPlaced { .. })));
    }

    #[tokio::test]
    async fn test_placing_empty_cart_rejected() {
        let (db, org, customer, _product) = seeded_db().await;
        let orders = db.orders();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        let err = orders.place(&cart.id, today()).await.unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_placed_order_survives_rule_deletion() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();
        let rules = db.rules();
        let now = Utc::now();

        let tier = CustomerDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            customer_id: customer.id.clone(),
            terms: DiscountTerms {
                value: DiscountValue::Percentage(Rate::from_bps(5000)),
                window: ValidityWindow::perpetual(),
                stackable: true,
                active: true,
            },
            created_at: now,
            updated_at: now,
        };
        rules.create_customer_discount(&tier).await.unwrap();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&cart.id, &product.id, 1, today()).await.unwrap();
        let placed = orders.place(&cart.id, today()).await.unwrap();
        let frozen_subtotal = placed.subtotal;

        rules.delete(&tier.id).await.unwrap();

        let reloaded = orders.require_order(&cart.id).await.unwrap();
        assert_eq!(reloaded.subtotal, frozen_subtotal);
        let items = orders.items(&cart.id).await.unwrap();
        assert_eq!(items[0].discount_rate, Rate::from_bps(5000));
    }

    #[tokio::test]
    async fn test_status_transitions_persisted_and_guarded() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();

        let cart = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&cart.id, &product.id, 1, today()).await.unwrap();
        orders.place(&cart.id, today()).await.unwrap();

        // Skipping a step fails before anything is written
        let err = orders
            .update_status(&cart.id, OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InvalidTransition { .. })
        ));

        orders.update_status(&cart.id, OrderStatus::Processed).await.unwrap();
        let order = orders
            .update_status(&cart.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        orders
            .update_payment_status(&cart.id, PaymentStatus::Paid)
            .await
            .unwrap();
        let reloaded = orders.require_order(&cart.id).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Completed);
        assert_eq!(reloaded.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_new_cart_after_placement() {
        let (db, org, customer, product) = seeded_db().await;
        let orders = db.orders();

        let first = orders.current_cart(&org.id, &customer.id).await.unwrap();
        orders.add_item(&first.id, &product.id, 1, today()).await.unwrap();
        orders.place(&first.id, today()).await.unwrap();

        let second = orders.current_cart(&org.id, &customer.id).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.order_number.ends_with("-0002"));
    }
}
