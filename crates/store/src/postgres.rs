use std::collections::HashMap;

use async_trait::async_trait;
use common::{CustomerId, DeliveryId, EstablishmentId, ItemId, SaleId, TableId, Version};
use domain::{
    Availability, CatalogItem, Credential, Delivery, Establishment, ItemKind, Money, OrderLine,
    Sale, Stock, Table, TableParts, UnitPrice,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, SaleQuery, StoreError,
    store::{
        ArchiveOutcome, CompletionOutcome, ItemDetails, SaleMerge, Shortfall, StockLine,
        StockOutcome, Store, TableUpdate,
    },
};

const ITEM_COLUMNS: &str = "id, establishment_id, name, description, price_ten_thousandths, kind, quantity, archived, created_at";
const SALE_COLUMNS: &str =
    "id, establishment_id, total_cents, completed, table_id, description, archived, created_at";
const TABLE_COLUMNS: &str = "id, establishment_id, name, availability, token, passcode, open_sales, running_total_cents, archived, version, created_at";
const DELIVERY_COLUMNS: &str =
    "id, sale_id, establishment_id, customer_id, address, archived, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_establishment(row: PgRow) -> Result<Establishment> {
        Ok(Establishment {
            id: EstablishmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            archived: row.try_get("archived")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<CatalogItem> {
        let id = ItemId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let kind_code: i16 = row.try_get("kind")?;
        let kind = ItemKind::from_code(kind_code)
            .ok_or_else(|| StoreError::Corrupt(format!("item {id} has kind {kind_code}")))?;
        let stock = match kind {
            ItemKind::Unlimited => Stock::Unlimited,
            ItemKind::Stocked => {
                let quantity: Option<i64> = row.try_get("quantity")?;
                let quantity = quantity
                    .and_then(|q| u32::try_from(q).ok())
                    .ok_or_else(|| StoreError::Corrupt(format!("item {id} has bad quantity")))?;
                Stock::Counted(quantity)
            }
        };

        Ok(CatalogItem {
            id,
            establishment_id: EstablishmentId::from_uuid(row.try_get::<Uuid, _>("establishment_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: UnitPrice::from_ten_thousandths(row.try_get("price_ten_thousandths")?),
            stock,
            archived: row.try_get("archived")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_sale(row: PgRow) -> Result<Sale> {
        Ok(Sale {
            id: SaleId::from_uuid(row.try_get::<Uuid, _>("id")?),
            establishment_id: EstablishmentId::from_uuid(row.try_get::<Uuid, _>("establishment_id")?),
            lines: Vec::new(),
            total_price: Money::from_cents(row.try_get("total_cents")?),
            completed: row.try_get("completed")?,
            table_id: row
                .try_get::<Option<Uuid>, _>("table_id")?
                .map(TableId::from_uuid),
            description: row.try_get("description")?,
            archived: row.try_get("archived")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_table(row: PgRow) -> Result<Table> {
        let id = TableId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let code: i16 = row.try_get("availability")?;
        let availability = Availability::from_code(code)
            .ok_or_else(|| StoreError::Corrupt(format!("table {id} has availability {code}")))?;
        let token: Option<String> = row.try_get("token")?;
        let passcode: Option<i32> = row.try_get("passcode")?;
        let credential = match (token, passcode) {
            (Some(token), Some(passcode)) => {
                let passcode = u32::try_from(passcode)
                    .map_err(|_| StoreError::Corrupt(format!("table {id} has bad passcode")))?;
                Some(Credential::new(token, passcode))
            }
            _ => None,
        };
        let open_sales: Vec<Uuid> = row.try_get("open_sales")?;

        Ok(Table::restore(TableParts {
            id,
            establishment_id: EstablishmentId::from_uuid(row.try_get::<Uuid, _>("establishment_id")?),
            name: row.try_get("name")?,
            availability,
            credential,
            open_sales: open_sales.into_iter().map(SaleId::from_uuid).collect(),
            running_total: Money::from_cents(row.try_get("running_total_cents")?),
            archived: row.try_get("archived")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
        }))
    }

    fn row_to_delivery(row: PgRow) -> Result<Delivery> {
        Ok(Delivery {
            id: DeliveryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sale_id: SaleId::from_uuid(row.try_get::<Uuid, _>("sale_id")?),
            establishment_id: EstablishmentId::from_uuid(row.try_get::<Uuid, _>("establishment_id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            address: row.try_get("address")?,
            archived: row.try_get("archived")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Fills in the lines of `sales`, keeping each sale's line order.
    async fn attach_lines(conn: &mut PgConnection, sales: &mut [Sale]) -> Result<()> {
        if sales.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = sales.iter().map(|sale| sale.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT sale_id, item_id, item_name, quantity, subtotal_cents
            FROM sale_lines
            WHERE sale_id = ANY($1)
            ORDER BY sale_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<SaleId, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let sale_id = SaleId::from_uuid(row.try_get::<Uuid, _>("sale_id")?);
            let quantity: i64 = row.try_get("quantity")?;
            let quantity = u32::try_from(quantity)
                .map_err(|_| StoreError::Corrupt(format!("sale {sale_id} has bad quantity")))?;
            lines.entry(sale_id).or_default().push(OrderLine {
                item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
                item_name: row.try_get("item_name")?,
                quantity,
                subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            });
        }
        for sale in sales {
            sale.lines = lines.remove(&sale.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn write_sale(conn: &mut PgConnection, sale: &Sale) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, establishment_id, total_cents, completed, table_id, description, archived, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.establishment_id.as_uuid())
        .bind(sale.total_price.cents())
        .bind(sale.completed)
        .bind(sale.table_id.map(|id| id.as_uuid()))
        .bind(&sale.description)
        .bind(sale.archived)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        for (position, line) in sale.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (sale_id, position, item_id, item_name, quantity, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(sale.id.as_uuid())
            .bind(position as i32)
            .bind(line.item_id.as_uuid())
            .bind(&line.item_name)
            .bind(i64::from(line.quantity))
            .bind(line.subtotal.cents())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Archives the originals and inserts the merged sale.
    async fn apply_merge(conn: &mut PgConnection, merge: &SaleMerge) -> Result<()> {
        let ids: Vec<Uuid> = merge.originals.iter().map(|id| id.as_uuid()).collect();
        let archived: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE sales SET archived = TRUE
            WHERE establishment_id = $1 AND id = ANY($2) AND NOT archived
            RETURNING id
            "#,
        )
        .bind(merge.merged.establishment_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        if archived.len() != merge.originals.len() {
            let stale = merge
                .originals
                .iter()
                .filter(|id| !archived.contains(&id.as_uuid()))
                .copied()
                .collect();
            tracing::warn!(stale = ?stale, "merge found sales no longer open, rolling back");
            return Err(StoreError::StaleSales(stale));
        }

        Self::write_sale(conn, &merge.merged).await
    }

    fn map_token_violation(error: sqlx::Error, table_id: TableId) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = error
            && db_err.constraint() == Some("unique_active_table_token")
        {
            tracing::debug!(%table_id, "access token already held by another table");
            return StoreError::TokenTaken { table_id };
        }
        StoreError::Database(error)
    }

    async fn archive_where(&self, sql: &str, scope: Uuid, id: Uuid) -> Result<ArchiveOutcome> {
        let archived: Option<bool> = sqlx::query_scalar(sql)
            .bind(scope)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match archived {
            None => ArchiveOutcome::Missing,
            Some(true) => ArchiveOutcome::Archived,
            Some(false) => ArchiveOutcome::AlreadyArchived,
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_establishment(&self, establishment: Establishment) -> Result<()> {
        sqlx::query(
            "INSERT INTO establishments (id, name, address, archived, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(establishment.id.as_uuid())
        .bind(&establishment.name)
        .bind(&establishment.address)
        .bind(establishment.archived)
        .bind(establishment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_establishment(&self, id: EstablishmentId) -> Result<Option<Establishment>> {
        let row = sqlx::query(
            "SELECT id, name, address, archived, created_at FROM establishments WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_establishment).transpose()
    }

    async fn archive_establishment(&self, id: EstablishmentId) -> Result<ArchiveOutcome> {
        // The CTE reports the archived flag as it was before the update.
        let archived: Option<bool> = sqlx::query_scalar(
            r#"
            WITH target AS (SELECT id, archived FROM establishments WHERE id = $1 FOR UPDATE)
            UPDATE establishments e SET archived = TRUE
            FROM target WHERE e.id = target.id
            RETURNING NOT target.archived
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(match archived {
            None => ArchiveOutcome::Missing,
            Some(true) => ArchiveOutcome::Archived,
            Some(false) => ArchiveOutcome::AlreadyArchived,
        })
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, establishment_id, name, description, price_ten_thousandths, kind, quantity, archived, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.establishment_id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.ten_thousandths())
        .bind(item.kind().code())
        .bind(item.stock.quantity().map(i64::from))
        .bind(item.archived)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM catalog_items WHERE establishment_id = $1 AND id = $2"
        ))
        .bind(establishment_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn list_items(
        &self,
        establishment_id: EstablishmentId,
        kind: Option<ItemKind>,
    ) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM catalog_items
            WHERE establishment_id = $1 AND NOT archived AND ($2::SMALLINT IS NULL OR kind = $2)
            ORDER BY name, id
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(kind.map(|kind| kind.code()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn update_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        details: ItemDetails,
    ) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog_items SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price_ten_thousandths = COALESCE($5, price_ten_thousandths)
            WHERE establishment_id = $1 AND id = $2 AND NOT archived
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(details.name)
        .bind(details.description)
        .bind(details.price.map(|price| price.ten_thousandths()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn archive_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<ArchiveOutcome> {
        self.archive_where(
            r#"
            WITH target AS (
                SELECT id, archived FROM catalog_items
                WHERE establishment_id = $1 AND id = $2 FOR UPDATE
            )
            UPDATE catalog_items c SET archived = TRUE
            FROM target WHERE c.id = target.id
            RETURNING NOT target.archived
            "#,
            establishment_id.as_uuid(),
            item_id.as_uuid(),
        )
        .await
    }

    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn reserve_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<StockOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row locks are taken in id order so concurrent reservations over
        // overlapping items cannot deadlock.
        let ids: Vec<Uuid> = lines.iter().map(|line| line.item_id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM catalog_items
            WHERE establishment_id = $1 AND id = ANY($2) AND NOT archived
            ORDER BY id
            FOR UPDATE
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut found: HashMap<ItemId, CatalogItem> = HashMap::new();
        for row in rows {
            let item = Self::row_to_item(row)?;
            found.insert(item.id, item);
        }

        let mut missing = Vec::new();
        let mut short = Vec::new();
        for line in lines {
            match found.get(&line.item_id) {
                None => missing.push(line.item_id),
                Some(item) => {
                    if let Stock::Counted(available) = item.stock
                        && available < line.quantity
                    {
                        short.push(Shortfall {
                            item_id: item.id,
                            item_name: item.name.clone(),
                            requested: line.quantity,
                            available,
                        });
                    }
                }
            }
        }
        if !missing.is_empty() || !short.is_empty() {
            tracing::debug!(
                missing = missing.len(),
                short = short.len(),
                "stock reservation rejected, rolling back"
            );
            tx.rollback().await?;
            return Ok(StockOutcome::Rejected { missing, short });
        }

        let mut stocked: Vec<&StockLine> = lines
            .iter()
            .filter(|line| found.get(&line.item_id).is_some_and(|i| i.is_stocked()))
            .collect();
        stocked.sort_by_key(|line| line.item_id);

        for line in stocked {
            let remaining: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE catalog_items SET quantity = quantity - $1
                WHERE id = $2 AND quantity >= $1
                RETURNING quantity
                "#,
            )
            .bind(i64::from(line.quantity))
            .bind(line.item_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

            let remaining = remaining
                .and_then(|q| u32::try_from(q).ok())
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("locked item {} changed quantity", line.item_id))
                })?;
            if let Some(item) = found.get_mut(&line.item_id) {
                item.stock = Stock::Counted(remaining);
            }
        }

        tx.commit().await?;

        let reserved = lines
            .iter()
            .filter_map(|line| found.get(&line.item_id).cloned())
            .collect();
        Ok(StockOutcome::Reserved(reserved))
    }

    async fn release_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<()> {
        let mut sorted: Vec<&StockLine> = lines.iter().collect();
        sorted.sort_by_key(|line| line.item_id);

        let mut tx = self.pool.begin().await?;
        for line in sorted {
            sqlx::query(
                r#"
                UPDATE catalog_items SET quantity = quantity + $1
                WHERE establishment_id = $2 AND id = $3 AND quantity IS NOT NULL
                "#,
            )
            .bind(i64::from(line.quantity))
            .bind(establishment_id.as_uuid())
            .bind(line.item_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_stock(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog_items SET quantity = $3
            WHERE establishment_id = $1 AND id = $2 AND NOT archived AND quantity IS NOT NULL
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn insert_sale(&self, sale: Sale, delivery: Option<Delivery>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_sale(&mut *tx, &sale).await?;

        if let Some(delivery) = delivery {
            sqlx::query(&format!(
                "INSERT INTO deliveries ({DELIVERY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(delivery.id.as_uuid())
            .bind(delivery.sale_id.as_uuid())
            .bind(delivery.establishment_id.as_uuid())
            .bind(delivery.customer_id.as_uuid())
            .bind(&delivery.address)
            .bind(delivery.archived)
            .bind(delivery.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE establishment_id = $1 AND id = $2"
        ))
        .bind(establishment_id.as_uuid())
        .bind(sale_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut sales = vec![Self::row_to_sale(row)?];
        Self::attach_lines(&mut *conn, &mut sales).await?;
        Ok(sales.pop())
    }

    async fn complete_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<CompletionOutcome> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE sales SET completed = TRUE
            WHERE establishment_id = $1 AND id = $2 AND NOT archived AND NOT completed
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(sale_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            let mut sales = vec![Self::row_to_sale(row)?];
            Self::attach_lines(&mut *conn, &mut sales).await?;
            return Ok(sales
                .pop()
                .map_or(CompletionOutcome::Missing, CompletionOutcome::Completed));
        }

        let active: Option<bool> = sqlx::query_scalar(
            "SELECT completed FROM sales WHERE establishment_id = $1 AND id = $2 AND NOT archived",
        )
        .bind(establishment_id.as_uuid())
        .bind(sale_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(match active {
            Some(true) => CompletionOutcome::AlreadyCompleted,
            _ => CompletionOutcome::Missing,
        })
    }

    async fn archive_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<ArchiveOutcome> {
        self.archive_where(
            r#"
            WITH target AS (
                SELECT id, archived FROM sales
                WHERE establishment_id = $1 AND id = $2 FOR UPDATE
            )
            UPDATE sales s SET archived = TRUE
            FROM target WHERE s.id = target.id
            RETURNING NOT target.archived
            "#,
            establishment_id.as_uuid(),
            sale_id.as_uuid(),
        )
        .await
    }

    #[tracing::instrument(skip(self, merge), fields(sales = merge.originals.len()))]
    async fn merge_sales(&self, merge: SaleMerge) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::apply_merge(&mut *tx, &merge).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query_sales(&self, query: SaleQuery) -> Result<Vec<Sale>> {
        let mut sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE establishment_id = $1 AND NOT archived"
        );
        let mut param_count = 1;

        if query.incomplete_only {
            sql.push_str(" AND NOT completed");
        }
        if query.table_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND table_id = ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql).bind(query.establishment_id.as_uuid());
        if let Some(table_id) = query.table_id {
            sqlx_query = sqlx_query.bind(table_id.as_uuid());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx_query.fetch_all(&mut *conn).await?;
        let mut sales = rows
            .into_iter()
            .map(Self::row_to_sale)
            .collect::<Result<Vec<_>>>()?;
        Self::attach_lines(&mut *conn, &mut sales).await?;
        Ok(sales)
    }

    async fn list_deliveries(
        &self,
        establishment_id: EstablishmentId,
        customer_id: CustomerId,
    ) -> Result<Vec<Delivery>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS} FROM deliveries
            WHERE establishment_id = $1 AND customer_id = $2 AND NOT archived
            ORDER BY created_at ASC
            "#
        ))
        .bind(establishment_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_delivery).collect()
    }

    async fn insert_table(&self, table: Table) -> Result<()> {
        let open_sales: Vec<Uuid> = table.open_sales().iter().map(|id| id.as_uuid()).collect();
        let credential = table.credential();
        sqlx::query(&format!(
            "INSERT INTO dining_tables ({TABLE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(table.id().as_uuid())
        .bind(table.establishment_id().as_uuid())
        .bind(table.name())
        .bind(table.availability().code())
        .bind(credential.map(|c| c.token().to_string()))
        .bind(credential.map(|c| c.passcode() as i32))
        .bind(&open_sales)
        .bind(table.running_total().cents())
        .bind(table.is_archived())
        .bind(table.version().as_i64())
        .bind(table.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_token_violation(e, table.id()))?;
        Ok(())
    }

    async fn find_table(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<Option<Table>> {
        let row = sqlx::query(&format!(
            "SELECT {TABLE_COLUMNS} FROM dining_tables WHERE establishment_id = $1 AND id = $2"
        ))
        .bind(establishment_id.as_uuid())
        .bind(table_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_table).transpose()
    }

    async fn list_tables(&self, establishment_id: EstablishmentId) -> Result<Vec<Table>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TABLE_COLUMNS} FROM dining_tables
            WHERE establishment_id = $1 AND NOT archived
            ORDER BY name, id
            "#
        ))
        .bind(establishment_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_table).collect()
    }

    #[tracing::instrument(
        skip(self, update),
        fields(table_id = %update.table.id(), settles = update.merge.is_some())
    )]
    async fn update_table(&self, update: TableUpdate) -> Result<Table> {
        let mut table = update.table;
        let table_id = table.id();
        let expected = table.version();
        let open_sales: Vec<Uuid> = table.open_sales().iter().map(|id| id.as_uuid()).collect();
        let credential = table.credential();

        let mut tx = self.pool.begin().await?;
        let written: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE dining_tables SET
                name = $3,
                availability = $4,
                token = $5,
                passcode = $6,
                open_sales = $7,
                running_total_cents = $8,
                archived = $9,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(table_id.as_uuid())
        .bind(expected.as_i64())
        .bind(table.name())
        .bind(table.availability().code())
        .bind(credential.map(|c| c.token().to_string()))
        .bind(credential.map(|c| c.passcode() as i32))
        .bind(&open_sales)
        .bind(table.running_total().cents())
        .bind(table.is_archived())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Self::map_token_violation(e, table_id))?;

        if written.is_none() {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM dining_tables WHERE id = $1")
                    .bind(table_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                None => StoreError::TableNotFound(table_id),
                Some(actual) => {
                    tracing::warn!(%expected, actual, "table version conflict");
                    StoreError::ConcurrencyConflict {
                        table_id,
                        expected,
                        actual: Version::new(actual),
                    }
                }
            });
        }

        if let Some(merge) = &update.merge {
            Self::apply_merge(&mut *tx, merge).await?;
        }

        tx.commit().await?;
        table.advance_version();
        Ok(table)
    }

    async fn find_table_by_credential(
        &self,
        token: &str,
        passcode: u32,
    ) -> Result<Option<Table>> {
        let Ok(passcode) = i32::try_from(passcode) else {
            return Ok(None);
        };
        let row = sqlx::query(&format!(
            r#"
            SELECT {TABLE_COLUMNS} FROM dining_tables
            WHERE token = $1 AND passcode = $2 AND NOT archived AND availability = 1
            "#
        ))
        .bind(token)
        .bind(passcode)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_table).transpose()
    }
}
