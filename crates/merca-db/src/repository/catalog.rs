//! # Catalog Repository
//!
//! Database operations for organisations, products, and customers - the
//! records discount rules and orders hang off. Plain CRUD; all pricing
//! behavior lives elsewhere.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use merca_core::{Customer, Organisation, Product};

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Organisations
    // =========================================================================

    /// Inserts an organisation.
    pub async fn insert_organisation(&self, organisation: &Organisation) -> DbResult<()> {
        debug!(id = %organisation.id, slug = %organisation.slug, "Inserting organisation");

        sqlx::query(
            r#"
            INSERT INTO organisations (
                id, name, slug, currency, tax_rate_bps, shipping_cost_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&organisation.id)
        .bind(&organisation.name)
        .bind(&organisation.slug)
        .bind(organisation.currency)
        .bind(organisation.tax_rate_bps)
        .bind(organisation.shipping_cost_cents)
        .bind(organisation.created_at)
        .bind(organisation.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an organisation by ID.
    pub async fn get_organisation(&self, id: &str) -> DbResult<Option<Organisation>> {
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

        Ok(organisation)
    }

    /// Gets an organisation by ID, erroring when absent.
    pub async fn require_organisation(&self, id: &str) -> DbResult<Organisation> {
        self.get_organisation(id)
            .await?
            .ok_or_else(|| DbError::not_found("Organisation", id))
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Inserts a customer.
    pub async fn insert_customer(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, company = %customer.company_name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, organisation_id, company_name, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.organisation_id)
        .bind(&customer.company_name)
        .bind(customer.active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
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

        Ok(customer)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Inserts a product.
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, organisation_id, sku, name, description,
                price_cents, currency, min_order_quantity, active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.organisation_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.currency)
        .bind(product.min_order_quantity)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, organisation_id, sku, name, description,
                   price_cents, currency, min_order_quantity, active,
                   created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID, erroring when absent.
    pub async fn require_product(&self, id: &str) -> DbResult<Product> {
        self.get_product(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Lists an organisation's active products, ordered by name.
    pub async fn list_active_products(&self, organisation_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, organisation_id, sku, name, description,
                   price_cents, currency, min_order_quantity, active,
                   created_at, updated_at
            FROM products
            WHERE organisation_id = ?1 AND active = 1
            ORDER BY name
            "#,
        )
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Soft-deletes or restores a product.
    pub async fn set_product_active(&self, id: &str, active: bool) -> DbResult<()> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET active = ?2, updated_at = ?3 WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
