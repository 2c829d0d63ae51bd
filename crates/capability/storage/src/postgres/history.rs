//! Postgres 历史写入实现

use crate::error::StorageError;
use crate::models::HistoryQuery;
use crate::traits::HistoryStore;
use crate::validation::{PreparedValue, parse_bound, prepare_value};
use domain::ThingValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeMap;

const SCHEMA: &str = include_str!("../../migrations/0001_history.sql");

const EVENTS_TABLE: &str = "hub_events";
const ACTIONS_TABLE: &str = "hub_actions";

/// 最新值条件更新：仅当该属性不存在或已存值更旧时写入。
const UPSERT_LATEST_SQL: &str = "insert into hub_latest (thing_id, doc) \
     values ($1, jsonb_build_object($2::text, $3::jsonb)) \
     on conflict (thing_id) do update set doc = case \
       when hub_latest.doc -> $2::text is null \
         or (hub_latest.doc -> $2::text ->> 'created')::timestamptz < $4 \
       then jsonb_set(hub_latest.doc, array[$2::text], $3::jsonb) \
       else hub_latest.doc end";

pub struct PgHistoryStore {
    pub pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    /// 创建历史表（幂等）
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// 通过时序聚合推导最新值（仅用于与索引结果对比）
    #[cfg(feature = "scan-latest")]
    pub async fn latest_values_by_scan(
        &self,
        thing_id: &str,
    ) -> Result<BTreeMap<String, ThingValue>, StorageError> {
        let rows = sqlx::query(
            "select distinct on (name) thing_id, name, value, created, value_id, action_id \
             from hub_events \
             where thing_id = $1 \
             order by name, created_at desc, id desc",
        )
        .bind(thing_id)
        .fetch_all(&self.pool)
        .await?;
        let mut latest = BTreeMap::new();
        for row in rows {
            let value = row_to_value(&row)?;
            latest.insert(value.name.clone(), value);
        }
        Ok(latest)
    }

    async fn query(
        &self,
        table: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError> {
        let after = parse_bound(query.after.as_deref())?;
        let before = parse_bound(query.before.as_deref())?;
        let limit = query.limit.map(|limit| limit.min(i64::MAX as usize) as i64);
        let sql = format!(
            "select thing_id, name, value, created, value_id, action_id \
             from {table} \
             where thing_id = $1 \
             and ($2::text is null or name = $2) \
             and ($3::timestamptz is null or created_at > $3) \
             and ($4::timestamptz is null or created_at < $4) \
             order by id asc \
             limit $5"
        );
        let rows = sqlx::query(&sql)
            .bind(&query.thing_id)
            .bind(query.name.as_deref())
            .bind(after)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row_to_value(&row)?);
        }
        Ok(items)
    }
}

async fn insert_value(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    prepared: &PreparedValue,
) -> Result<(), StorageError> {
    let value = &prepared.value;
    let sql = format!(
        "insert into {table} (thing_id, name, value, created, created_at, value_id, action_id) \
         values ($1, $2, $3, $4, $5, $6, $7)"
    );
    sqlx::query(&sql)
        .bind(&value.thing_id)
        .bind(&value.name)
        .bind(&value.value)
        .bind(&value.created)
        .bind(prepared.created)
        .bind(value.value_id.as_deref().unwrap_or_default())
        .bind(value.action_id.as_deref())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn upsert_latest(
    tx: &mut Transaction<'_, Postgres>,
    prepared: &PreparedValue,
) -> Result<(), StorageError> {
    let doc = serde_json::to_string(&prepared.value)
        .map_err(|err| StorageError::new(err.to_string()))?;
    sqlx::query(UPSERT_LATEST_SQL)
        .bind(&prepared.value.thing_id)
        .bind(&prepared.value.name)
        .bind(doc)
        .bind(prepared.created)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn row_to_value(row: &sqlx::postgres::PgRow) -> Result<ThingValue, StorageError> {
    let value_id: String = row.try_get("value_id")?;
    Ok(ThingValue {
        thing_id: row.try_get("thing_id")?,
        name: row.try_get("name")?,
        value: row.try_get("value")?,
        created: row.try_get("created")?,
        value_id: Some(value_id),
        action_id: row.try_get("action_id")?,
    })
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn add_event(&self, value: &ThingValue) -> Result<(), StorageError> {
        let prepared = prepare_value(value)?;
        let mut tx = self.pool.begin().await?;
        insert_value(&mut tx, EVENTS_TABLE, &prepared).await?;
        upsert_latest(&mut tx, &prepared).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_events(&self, values: &[ThingValue]) -> Result<usize, StorageError> {
        if values.is_empty() {
            return Ok(0);
        }
        let prepared = values
            .iter()
            .map(prepare_value)
            .collect::<Result<Vec<_>, _>>()?;
        let mut tx = self.pool.begin().await?;
        for item in &prepared {
            insert_value(&mut tx, EVENTS_TABLE, item).await?;
        }
        tx.commit().await?;

        // 最新值可由事件流推导，与事件写入不要求同一事务
        let mut tx = self.pool.begin().await?;
        for item in &prepared {
            upsert_latest(&mut tx, item).await?;
        }
        tx.commit().await?;
        Ok(prepared.len())
    }

    async fn add_action(&self, value: &ThingValue) -> Result<(), StorageError> {
        let prepared = prepare_value(value)?;
        let mut tx = self.pool.begin().await?;
        insert_value(&mut tx, ACTIONS_TABLE, &prepared).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_event_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError> {
        self.query(EVENTS_TABLE, query).await
    }

    async fn get_action_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError> {
        self.query(ACTIONS_TABLE, query).await
    }

    async fn get_latest_values(
        &self,
        thing_id: &str,
    ) -> Result<BTreeMap<String, ThingValue>, StorageError> {
        let row = sqlx::query("select doc::text as doc from hub_latest where thing_id = $1")
            .bind(thing_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(BTreeMap::new());
        };
        let doc: String = row.try_get("doc")?;
        serde_json::from_str(&doc).map_err(|err| StorageError::new(err.to_string()))
    }
}
