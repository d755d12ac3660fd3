//! # Discount Rule Repository
//!
//! Database operations for the four discount rule families, stored in one
//! `discount_rules` table discriminated by `family`.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Rule Write Transaction                             │
//! │                                                                         │
//! │  create_customer_discount(rule)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE  ← takes the write lock up front, so the sibling      │
//! │       │             scan below cannot race a concurrent writer         │
//! │       ▼                                                                 │
//! │  fetch siblings (same customer scope)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  merca_core::validation (field checks + window overlap)                │
//! │       │                                                                 │
//! │       ├── errors? ──► ROLLBACK, DbError::Validation                    │
//! │       ▼                                                                 │
//! │  INSERT, COMMIT                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Product and order rules have no overlap constraint, so their writes skip
//! the transaction and validate against the record alone.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use merca_core::validation::{
    validate_customer_discount, validate_customer_product_discount, validate_order_discount,
    validate_product_discount,
};
use merca_core::{
    Currency, CustomerDiscount, CustomerProductDiscount, DiscountTerms, DiscountValue, Money,
    OrderDiscount, ProductDiscount, Rate, RuleSet, ValidityWindow,
};

// =============================================================================
// Row Mapping
// =============================================================================

const RULE_COLUMNS: &str = "id, organisation_id, family, customer_id, product_id, \
     kind, value_bps, amount_cents, currency, min_quantity, min_order_amount_cents, \
     valid_from, valid_until, stackable, active, created_at, updated_at";

/// Raw `discount_rules` row; converted into the family types below.
#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    organisation_id: String,
    #[allow(dead_code)]
    family: String,
    customer_id: Option<String>,
    product_id: Option<String>,
    kind: String,
    value_bps: Option<i64>,
    amount_cents: Option<i64>,
    currency: Option<Currency>,
    min_quantity: Option<i64>,
    min_order_amount_cents: Option<i64>,
    valid_from: Option<NaiveDate>,
    valid_until: Option<NaiveDate>,
    stackable: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RuleRow {
    fn malformed(&self, what: &str) -> DbError {
        DbError::Internal(format!("Malformed rule row {}: {}", self.id, what))
    }

    fn value(&self) -> DbResult<DiscountValue> {
        match self.kind.as_str() {
            "percentage" => self
                .value_bps
                .map(|bps| DiscountValue::Percentage(Rate::from_bps(bps as u32)))
                .ok_or_else(|| self.malformed("percentage without value_bps")),
            "fixed" => match (self.amount_cents, self.currency) {
                (Some(cents), Some(currency)) => {
                    Ok(DiscountValue::Fixed(Money::from_cents(cents, currency)))
                }
                _ => Err(self.malformed("fixed without amount_cents/currency")),
            },
            other => Err(self.malformed(&format!("unknown kind '{other}'"))),
        }
    }

    fn terms(&self) -> DbResult<DiscountTerms> {
        Ok(DiscountTerms {
            value: self.value()?,
            window: ValidityWindow::new(self.valid_from, self.valid_until),
            stackable: self.stackable,
            active: self.active,
        })
    }

    fn into_product(self) -> DbResult<ProductDiscount> {
        let terms = self.terms()?;
        let product_id = self
            .product_id
            .clone()
            .ok_or_else(|| self.malformed("product rule without product_id"))?;
        let min_quantity = self
            .min_quantity
            .ok_or_else(|| self.malformed("product rule without min_quantity"))?;
        Ok(ProductDiscount {
            id: self.id,
            organisation_id: self.organisation_id,
            product_id,
            min_quantity,
            terms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn into_customer(self) -> DbResult<CustomerDiscount> {
        let terms = self.terms()?;
        let customer_id = self
            .customer_id
            .clone()
            .ok_or_else(|| self.malformed("customer rule without customer_id"))?;
        Ok(CustomerDiscount {
            id: self.id,
            organisation_id: self.organisation_id,
            customer_id,
            terms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn into_customer_product(self) -> DbResult<CustomerProductDiscount> {
        let terms = self.terms()?;
        let customer_id = self
            .customer_id
            .clone()
            .ok_or_else(|| self.malformed("customer-product rule without customer_id"))?;
        let product_id = self
            .product_id
            .clone()
            .ok_or_else(|| self.malformed("customer-product rule without product_id"))?;
        Ok(CustomerProductDiscount {
            id: self.id,
            organisation_id: self.organisation_id,
            customer_id,
            product_id,
            terms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn into_order(self) -> DbResult<OrderDiscount> {
        let terms = self.terms()?;
        let min_order_amount = match (self.min_order_amount_cents, self.currency) {
            (Some(cents), Some(currency)) => Money::from_cents(cents, currency),
            _ => return Err(self.malformed("order rule without min_order_amount/currency")),
        };
        Ok(OrderDiscount {
            id: self.id,
            organisation_id: self.organisation_id,
            min_order_amount,
            terms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// The kind/value/currency columns a [`DiscountValue`] persists as.
fn value_columns(value: &DiscountValue) -> (&'static str, Option<i64>, Option<i64>, Option<Currency>) {
    match value {
        DiscountValue::Percentage(rate) => {
            (value.kind().as_str(), Some(rate.bps() as i64), None, None)
        }
        DiscountValue::Fixed(amount) => (
            value.kind().as_str(),
            None,
            Some(amount.cents()),
            Some(amount.currency()),
        ),
    }
}

// =============================================================================
// Rule Bundle
// =============================================================================

/// Owned carrier for everything the resolver needs for one product and
/// customer. Borrow it as a [`RuleSet`] to resolve.
#[derive(Debug, Clone, Default)]
pub struct RuleBundle {
    pub product: Vec<ProductDiscount>,
    pub customer_product: Vec<CustomerProductDiscount>,
    pub customer: Vec<CustomerDiscount>,
}

impl RuleBundle {
    /// Views the bundle as the borrowed rule set the resolver consumes.
    pub fn as_rule_set(&self) -> RuleSet<'_> {
        RuleSet {
            product: &self.product,
            customer_product: &self.customer_product,
            customer: &self.customer,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for discount rule database operations.
#[derive(Debug, Clone)]
pub struct RuleRepository {
    pool: SqlitePool,
}

impl RuleRepository {
    /// Creates a new RuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RuleRepository { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a product sale. Validated against the product's minimum
    /// order quantity; no overlap constraint applies to this family.
    pub async fn create_product_discount(&self, rule: &ProductDiscount) -> DbResult<()> {
        debug!(id = %rule.id, product_id = %rule.product_id, "Creating product discount");

        let floor: Option<i64> =
            sqlx::query_scalar("SELECT min_order_quantity FROM products WHERE id = ?1")
                .bind(&rule.product_id)
                .fetch_optional(&self.pool)
                .await?;
        let floor = floor.ok_or_else(|| DbError::not_found("Product", &rule.product_id))?;

        let errors = validate_product_discount(rule, floor);
        if !errors.is_empty() {
            return Err(DbError::validation(errors));
        }

        insert_rule(
            &self.pool,
            &RuleWrite {
                id: &rule.id,
                organisation_id: &rule.organisation_id,
                family: "product",
                customer_id: None,
                product_id: Some(&rule.product_id),
                min_quantity: Some(rule.min_quantity),
                min_order_amount: None,
                terms: &rule.terms,
                created_at: rule.created_at,
                updated_at: rule.updated_at,
            },
        )
        .await
    }

    /// Creates a customer-wide discount inside an immediate transaction,
    /// so the overlap scan and the insert are atomic.
    pub async fn create_customer_discount(&self, rule: &CustomerDiscount) -> DbResult<()> {
        debug!(id = %rule.id, customer_id = %rule.customer_id, "Creating customer discount");

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let siblings = fetch_customer_rules(&mut *conn, &rule.customer_id).await?;
            let errors = validate_customer_discount(rule, &siblings);
            if !errors.is_empty() {
                return Err(DbError::validation(errors));
            }
            insert_rule(
                &mut *conn,
                &RuleWrite {
                    id: &rule.id,
                    organisation_id: &rule.organisation_id,
                    family: "customer",
                    customer_id: Some(&rule.customer_id),
                    product_id: None,
                    min_quantity: None,
                    min_order_amount: None,
                    terms: &rule.terms,
                    created_at: rule.created_at,
                    updated_at: rule.updated_at,
                },
            )
            .await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Creates a customer-product price inside an immediate transaction.
    /// `today` drives the creation-only past-window check.
    pub async fn create_customer_product_discount(
        &self,
        rule: &CustomerProductDiscount,
        today: NaiveDate,
    ) -> DbResult<()> {
        debug!(
            id = %rule.id,
            customer_id = %rule.customer_id,
            product_id = %rule.product_id,
            "Creating customer-product discount"
        );

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let siblings =
                fetch_customer_product_rules(&mut *conn, &rule.customer_id, &rule.product_id)
                    .await?;
            let errors = validate_customer_product_discount(rule, &siblings, today, true);
            if !errors.is_empty() {
                return Err(DbError::validation(errors));
            }
            insert_rule(
                &mut *conn,
                &RuleWrite {
                    id: &rule.id,
                    organisation_id: &rule.organisation_id,
                    family: "customer_product",
                    customer_id: Some(&rule.customer_id),
                    product_id: Some(&rule.product_id),
                    min_quantity: None,
                    min_order_amount: None,
                    terms: &rule.terms,
                    created_at: rule.created_at,
                    updated_at: rule.updated_at,
                },
            )
            .await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Creates an order tier. Tiers coexist, so no overlap transaction.
    pub async fn create_order_discount(&self, rule: &OrderDiscount) -> DbResult<()> {
        debug!(id = %rule.id, threshold = %rule.min_order_amount, "Creating order discount");

        let errors = validate_order_discount(rule);
        if !errors.is_empty() {
            return Err(DbError::validation(errors));
        }

        insert_rule(
            &self.pool,
            &RuleWrite {
                id: &rule.id,
                organisation_id: &rule.organisation_id,
                family: "order",
                customer_id: None,
                product_id: None,
                min_quantity: None,
                min_order_amount: Some(rule.min_order_amount),
                terms: &rule.terms,
                created_at: rule.created_at,
                updated_at: rule.updated_at,
            },
        )
        .await
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Updates a product sale, re-checking its gate against the product's
    /// minimum order quantity. No overlap scan, but the gate and terms
    /// columns are written in one transaction so the rule can never be
    /// left half-updated.
    pub async fn update_product_discount(&self, rule: &ProductDiscount) -> DbResult<()> {
        let floor: Option<i64> =
            sqlx::query_scalar("SELECT min_order_quantity FROM products WHERE id = ?1")
                .bind(&rule.product_id)
                .fetch_optional(&self.pool)
                .await?;
        let floor = floor.ok_or_else(|| DbError::not_found("Product", &rule.product_id))?;

        let errors = validate_product_discount(rule, floor);
        if !errors.is_empty() {
            return Err(DbError::validation(errors));
        }

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let result = sqlx::query(
                "UPDATE discount_rules SET min_quantity = ?2, updated_at = ?3 \
                 WHERE id = ?1 AND family = 'product'",
            )
            .bind(&rule.id)
            .bind(rule.min_quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Discount rule", &rule.id));
            }

            update_rule_terms(&mut *conn, &rule.id, &rule.terms).await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Updates an order tier's threshold and terms in one transaction.
    pub async fn update_order_discount(&self, rule: &OrderDiscount) -> DbResult<()> {
        let errors = validate_order_discount(rule);
        if !errors.is_empty() {
            return Err(DbError::validation(errors));
        }

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let result = sqlx::query(
                "UPDATE discount_rules SET min_order_amount_cents = ?2, currency = ?3, \
                 updated_at = ?4 WHERE id = ?1 AND family = 'order'",
            )
            .bind(&rule.id)
            .bind(rule.min_order_amount.cents())
            .bind(rule.min_order_amount.currency())
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Discount rule", &rule.id));
            }

            update_rule_terms(&mut *conn, &rule.id, &rule.terms).await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Updates a customer-wide discount, re-running the overlap scan in the
    /// same transaction. The rule's own stored row is excluded from the scan.
    pub async fn update_customer_discount(&self, rule: &CustomerDiscount) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let siblings = fetch_customer_rules(&mut *conn, &rule.customer_id).await?;
            let errors = validate_customer_discount(rule, &siblings);
            if !errors.is_empty() {
                return Err(DbError::validation(errors));
            }
            update_rule_terms(&mut *conn, &rule.id, &rule.terms).await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Updates a customer-product price. The creation-only past-window
    /// check is skipped, so an expired rule can still be edited.
    pub async fn update_customer_product_discount(
        &self,
        rule: &CustomerProductDiscount,
        today: NaiveDate,
    ) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = async {
            let siblings =
                fetch_customer_product_rules(&mut *conn, &rule.customer_id, &rule.product_id)
                    .await?;
            let errors = validate_customer_product_discount(rule, &siblings, today, false);
            if !errors.is_empty() {
                return Err(DbError::validation(errors));
            }
            update_rule_terms(&mut *conn, &rule.id, &rule.terms).await
        }
        .await;

        finish_tx(&mut conn, outcome).await
    }

    /// Flips a rule's active flag (any family).
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE discount_rules SET active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount rule", id));
        }

        Ok(())
    }

    /// Deletes a rule. Placed orders are unaffected: they carry snapshots,
    /// never references to live rules.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM discount_rules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount rule", id));
        }

        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Fetches everything the resolver needs for one product and customer.
    /// Without a customer, only product sales are loaded.
    pub async fn rules_for_product(
        &self,
        product_id: &str,
        customer_id: Option<&str>,
    ) -> DbResult<RuleBundle> {
        let mut bundle = RuleBundle {
            product: fetch_product_rules(&self.pool, product_id).await?,
            ..Default::default()
        };

        if let Some(customer_id) = customer_id {
            bundle.customer_product =
                fetch_customer_product_rules(&self.pool, customer_id, product_id).await?;
            bundle.customer = fetch_customer_rules(&self.pool, customer_id).await?;
        }

        Ok(bundle)
    }

    /// Lists the sales on one product.
    pub async fn product_discounts(&self, product_id: &str) -> DbResult<Vec<ProductDiscount>> {
        fetch_product_rules(&self.pool, product_id).await
    }

    /// Lists one customer's blanket discounts.
    pub async fn customer_discounts(&self, customer_id: &str) -> DbResult<Vec<CustomerDiscount>> {
        fetch_customer_rules(&self.pool, customer_id).await
    }

    /// Lists a customer's negotiated prices for one product.
    pub async fn customer_product_discounts(
        &self,
        customer_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<CustomerProductDiscount>> {
        fetch_customer_product_rules(&self.pool, customer_id, product_id).await
    }

    /// Lists an organisation's order tiers, highest threshold first.
    pub async fn order_discounts(&self, organisation_id: &str) -> DbResult<Vec<OrderDiscount>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM discount_rules \
             WHERE family = 'order' AND organisation_id = ?1 \
             ORDER BY min_order_amount_cents DESC"
        );
        let rows = sqlx::query_as::<_, RuleRow>(&sql)
            .bind(organisation_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RuleRow::into_order).collect()
    }
}

// =============================================================================
// Shared Statements
// =============================================================================

/// The pieces of a rule write that vary per family.
struct RuleWrite<'a> {
    id: &'a str,
    organisation_id: &'a str,
    family: &'static str,
    customer_id: Option<&'a str>,
    product_id: Option<&'a str>,
    min_quantity: Option<i64>,
    min_order_amount: Option<Money>,
    terms: &'a DiscountTerms,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

async fn insert_rule<'e, E>(executor: E, write: &RuleWrite<'_>) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (kind, value_bps, amount_cents, value_currency) = value_columns(&write.terms.value);
    // Order tiers carry their threshold's currency even for percentage values
    let currency = value_currency.or_else(|| write.min_order_amount.map(|m| m.currency()));

    sqlx::query(
        r#"
        INSERT INTO discount_rules (
            id, organisation_id, family, customer_id, product_id,
            kind, value_bps, amount_cents, currency,
            min_quantity, min_order_amount_cents,
            valid_from, valid_until, stackable, active,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
    )
    .bind(write.id)
    .bind(write.organisation_id)
    .bind(write.family)
    .bind(write.customer_id)
    .bind(write.product_id)
    .bind(kind)
    .bind(value_bps)
    .bind(amount_cents)
    .bind(currency)
    .bind(write.min_quantity)
    .bind(write.min_order_amount.map(|m| m.cents()))
    .bind(write.terms.window.from)
    .bind(write.terms.window.until)
    .bind(write.terms.stackable)
    .bind(write.terms.active)
    .bind(write.created_at)
    .bind(write.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn update_rule_terms<'e, E>(executor: E, id: &str, terms: &DiscountTerms) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (kind, value_bps, amount_cents, currency) = value_columns(&terms.value);
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE discount_rules SET
            kind = ?2,
            value_bps = ?3,
            amount_cents = ?4,
            currency = COALESCE(?5, currency),
            valid_from = ?6,
            valid_until = ?7,
            stackable = ?8,
            active = ?9,
            updated_at = ?10
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(kind)
    .bind(value_bps)
    .bind(amount_cents)
    .bind(currency)
    .bind(terms.window.from)
    .bind(terms.window.until)
    .bind(terms.stackable)
    .bind(terms.active)
    .bind(now)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Discount rule", id));
    }

    Ok(())
}

async fn fetch_product_rules<'e, E>(executor: E, product_id: &str) -> DbResult<Vec<ProductDiscount>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM discount_rules \
         WHERE family = 'product' AND product_id = ?1 \
         ORDER BY created_at"
    );
    let rows = sqlx::query_as::<_, RuleRow>(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(RuleRow::into_product).collect()
}

async fn fetch_customer_rules<'e, E>(executor: E, customer_id: &str) -> DbResult<Vec<CustomerDiscount>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM discount_rules \
         WHERE family = 'customer' AND customer_id = ?1 \
         ORDER BY created_at"
    );
    let rows = sqlx::query_as::<_, RuleRow>(&sql)
        .bind(customer_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(RuleRow::into_customer).collect()
}

async fn fetch_customer_product_rules<'e, E>(
    executor: E,
    customer_id: &str,
    product_id: &str,
) -> DbResult<Vec<CustomerProductDiscount>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM discount_rules \
         WHERE family = 'customer_product' AND customer_id = ?1 AND product_id = ?2 \
         ORDER BY created_at"
    );
    let rows = sqlx::query_as::<_, RuleRow>(&sql)
        .bind(customer_id)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(RuleRow::into_customer_product).collect()
}

/// Commits on success, rolls back on failure, and returns the outcome.
async fn finish_tx<T>(
    conn: &mut sqlx::pool::PoolConnection<Sqlite>,
    outcome: DbResult<T>,
) -> DbResult<T> {
    match outcome {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut **conn).await?;
            Ok(value)
        }
        Err(err) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut **conn).await;
            Err(err)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use merca_core::resolver::{resolve, PricingContext, PricingMode};
    use merca_core::{Customer, Organisation, Product, ValidationError};
    use uuid::Uuid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
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

    fn terms(value: DiscountValue, window: ValidityWindow, stackable: bool) -> DiscountTerms {
        DiscountTerms {
            value,
            window,
            stackable,
            active: true,
        }
    }

    fn customer_rule(org: &Organisation, customer: &Customer, window: ValidityWindow) -> CustomerDiscount {
        let now = Utc::now();
        CustomerDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            customer_id: customer.id.clone(),
            terms: terms(
                DiscountValue::Percentage(Rate::from_bps(1000)),
                window,
                true,
            ),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_customer_discount_round_trip() {
        let (db, org, customer, _product) = seeded_db().await;
        let rules = db.rules();

        let rule = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31))),
        );
        rules.create_customer_discount(&rule).await.unwrap();

        let loaded = rules.customer_discounts(&customer.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, rule.id);
        assert_eq!(loaded[0].terms, rule.terms);
    }

    #[tokio::test]
    async fn test_overlapping_customer_discount_rejected() {
        let (db, org, customer, _product) = seeded_db().await;
        let rules = db.rules();

        let first = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31))),
        );
        rules.create_customer_discount(&first).await.unwrap();

        let overlapping = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 1, 15)), Some(day(2026, 2, 15))),
        );
        let err = rules
            .create_customer_discount(&overlapping)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation { ref errors }
                if errors == &[ValidationError::ScopeOverlap {
                    field: "validity period",
                    scope: "customer"
                }]
        ));

        // Adjacent window goes through
        let adjacent = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 2, 1)), Some(day(2026, 2, 28))),
        );
        rules.create_customer_discount(&adjacent).await.unwrap();
    }

    #[tokio::test]
    async fn test_product_discount_below_product_floor_rejected() {
        let (db, org, _customer, mut product) = seeded_db().await;
        let catalog = db.catalog();
        let rules = db.rules();

        product.id = Uuid::new_v4().to_string();
        product.sku = "PALLET-ONLY".into();
        product.min_order_quantity = 10;
        catalog.insert_product(&product).await.unwrap();

        let now = Utc::now();
        let rule = ProductDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            product_id: product.id.clone(),
            min_quantity: 5,
            terms: terms(
                DiscountValue::Percentage(Rate::from_bps(2000)),
                ValidityWindow::perpetual(),
                true,
            ),
            created_at: now,
            updated_at: now,
        };

        let err = rules.create_product_discount(&rule).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation { ref errors }
                if errors == &[ValidationError::BelowProductMinimum {
                    field: "min_quantity",
                    min: 10
                }]
        ));
    }

    #[tokio::test]
    async fn test_rule_bundle_feeds_the_resolver() {
        let (db, org, customer, product) = seeded_db().await;
        let rules = db.rules();
        let now = Utc::now();

        let sale = ProductDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            product_id: product.id.clone(),
            min_quantity: 1,
            terms: terms(
                DiscountValue::Percentage(Rate::from_bps(2000)),
                ValidityWindow::perpetual(),
                true,
            ),
            created_at: now,
            updated_at: now,
        };
        rules.create_product_discount(&sale).await.unwrap();

        let tier = customer_rule(&org, &customer, ValidityWindow::perpetual());
        rules.create_customer_discount(&tier).await.unwrap();

        let bundle = rules
            .rules_for_product(&product.id, Some(&customer.id))
            .await
            .unwrap();
        let snapshot = product.snapshot();
        let breakdown = resolve(
            &PricingContext {
                product: &snapshot,
                customer_id: Some(&customer.id),
                quantity: 1,
                mode: PricingMode::Purchase,
            },
            &bundle.as_rule_set(),
            day(2026, 6, 1),
        );

        // 20% then 10% stacked on €10.00: 1000 -> 800 -> 720
        assert_eq!(breakdown.final_price, Money::eur(720));
    }

    #[tokio::test]
    async fn test_update_reruns_overlap_check() {
        let (db, org, customer, _product) = seeded_db().await;
        let rules = db.rules();

        let january = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31))),
        );
        rules.create_customer_discount(&january).await.unwrap();

        let mut march = customer_rule(
            &org,
            &customer,
            ValidityWindow::new(Some(day(2026, 3, 1)), Some(day(2026, 3, 31))),
        );
        rules.create_customer_discount(&march).await.unwrap();

        // Growing March into January collides
        march.terms.window = ValidityWindow::new(Some(day(2026, 1, 15)), Some(day(2026, 3, 31)));
        let err = rules.update_customer_discount(&march).await.unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));

        // Growing March forward does not collide with its own row
        march.terms.window = ValidityWindow::new(Some(day(2026, 3, 1)), Some(day(2026, 4, 30)));
        rules.update_customer_discount(&march).await.unwrap();
    }

    #[tokio::test]
    async fn test_deactivated_rule_leaves_the_bundle_in_force() {
        let (db, org, customer, product) = seeded_db().await;
        let rules = db.rules();

        let tier = customer_rule(&org, &customer, ValidityWindow::perpetual());
        rules.create_customer_discount(&tier).await.unwrap();
        rules.set_active(&tier.id, false).await.unwrap();

        let bundle = rules
            .rules_for_product(&product.id, Some(&customer.id))
            .await
            .unwrap();
        assert!(!bundle.customer[0].terms.active);

        let snapshot = product.snapshot();
        let breakdown = resolve(
            &PricingContext {
                product: &snapshot,
                customer_id: Some(&customer.id),
                quantity: 1,
                mode: PricingMode::Purchase,
            },
            &bundle.as_rule_set(),
            day(2026, 6, 1),
        );
        assert!(!breakdown.has_discount());
    }

    #[tokio::test]
    async fn test_update_product_discount_rechecks_product_floor() {
        let (db, org, _customer, mut product) = seeded_db().await;
        let catalog = db.catalog();
        let rules = db.rules();

        product.id = Uuid::new_v4().to_string();
        product.sku = "CRATE-ONLY".into();
        product.min_order_quantity = 6;
        catalog.insert_product(&product).await.unwrap();

        let now = Utc::now();
        let mut rule = ProductDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            product_id: product.id.clone(),
            min_quantity: 6,
            terms: terms(
                DiscountValue::Percentage(Rate::from_bps(1500)),
                ValidityWindow::perpetual(),
                true,
            ),
            created_at: now,
            updated_at: now,
        };
        rules.create_product_discount(&rule).await.unwrap();

        // Widening the gate is fine
        rule.min_quantity = 12;
        rules.update_product_discount(&rule).await.unwrap();
        let loaded = rules.product_discounts(&product.id).await.unwrap();
        assert_eq!(loaded[0].min_quantity, 12);

        // Undercutting the product's own floor is not
        rule.min_quantity = 3;
        let err = rules.update_product_discount(&rule).await.unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_order_discount_moves_threshold() {
        let (db, org, _customer, _product) = seeded_db().await;
        let rules = db.rules();
        let now = Utc::now();

        let mut tier = OrderDiscount {
            id: Uuid::new_v4().to_string(),
            organisation_id: org.id.clone(),
            min_order_amount: Money::eur(5000),
            terms: terms(
                DiscountValue::Percentage(Rate::from_bps(500)),
                ValidityWindow::perpetual(),
                false,
            ),
            created_at: now,
            updated_at: now,
        };
        rules.create_order_discount(&tier).await.unwrap();

        tier.min_order_amount = Money::eur(7500);
        tier.terms.value = DiscountValue::Percentage(Rate::from_bps(750));
        rules.update_order_discount(&tier).await.unwrap();

        let loaded = rules.order_discounts(&org.id).await.unwrap();
        assert_eq!(loaded[0].min_order_amount, Money::eur(7500));
        assert_eq!(
            loaded[0].terms.value,
            DiscountValue::Percentage(Rate::from_bps(750))
        );
    }

    #[tokio::test]
    async fn test_order_discounts_sorted_by_threshold() {
        let (db, org, _customer, _product) = seeded_db().await;
        let rules = db.rules();
        let now = Utc::now();

        for cents in [5000_i64, 10000, 2500] {
            let tier = OrderDiscount {
                id: Uuid::new_v4().to_string(),
                organisation_id: org.id.clone(),
                min_order_amount: Money::eur(cents),
                terms: terms(
                    DiscountValue::Percentage(Rate::from_bps(500)),
                    ValidityWindow::perpetual(),
                    false,
                ),
                created_at: now,
                updated_at: now,
            };
            rules.create_order_discount(&tier).await.unwrap();
        }

        let tiers = rules.order_discounts(&org.id).await.unwrap();
        let thresholds: Vec<i64> = tiers.iter().map(|t| t.min_order_amount.cents()).collect();
        assert_eq!(thresholds, vec![10000, 5000, 2500]);
    }
}
