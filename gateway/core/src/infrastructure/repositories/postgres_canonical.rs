// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL canonical-state repositories: `canonical_versions`,
//! `taxonomy_snapshots`, and `taxonomy_changes` tables. One struct
//! implements all three traits, mirroring the in-memory counterpart.
//!
//! `trim` runs in a transaction so a purge and the lineage-pointer release
//! it implies are atomic.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::canonical::{
    CanonicalVersion, NewSnapshot, NewTaxonomyChange, NewVersion, TaxonomyChange,
    TaxonomyChangeType, TaxonomySnapshot, VersionFamily, VersionStatus,
};
use crate::domain::repository::{
    CanonicalVersionRepository, RepositoryError, TaxonomyChangeRepository,
    TaxonomySnapshotRepository, VersionFilter,
};

pub struct PostgresCanonicalRepository {
    pool: PgPool,
}

impl PostgresCanonicalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const VERSION_COLUMNS: &str = "id, family, parent_version_id, scope_key, status, payload, \
     selection_rules, taxonomy_snapshot_id, created_by, source_run_id, commit_classification, \
     created_at, approved_at";

fn row_to_version(row: &PgRow) -> Result<CanonicalVersion, RepositoryError> {
    let family_str: String = row.get("family");
    let family = VersionFamily::parse(&family_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown version family: {family_str}"))
    })?;
    let status_str: String = row.get("status");
    let status = VersionStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown version status: {status_str}"))
    })?;
    Ok(CanonicalVersion {
        id: row.get("id"),
        family,
        parent_version_id: row.get("parent_version_id"),
        scope_key: row.get("scope_key"),
        status,
        payload: row.get("payload"),
        selection_rules: row.get("selection_rules"),
        taxonomy_snapshot_id: row.get("taxonomy_snapshot_id"),
        created_by: row.get("created_by"),
        source_run_id: row.get("source_run_id"),
        commit_classification: row.get("commit_classification"),
        created_at: row.get("created_at"),
        approved_at: row.get("approved_at"),
    })
}

fn row_to_snapshot(row: &PgRow) -> TaxonomySnapshot {
    TaxonomySnapshot {
        id: row.get("id"),
        snapshot_data: row.get("snapshot_data"),
        record_metadata: row.get("record_metadata"),
        created_by: row.get("created_by"),
        source_run_id: row.get("source_run_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_change(row: &PgRow) -> Result<TaxonomyChange, RepositoryError> {
    let status_str: String = row.get("status");
    let status = VersionStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown version status: {status_str}"))
    })?;
    let change_str: String = row.get("change_type");
    let change_type = TaxonomyChangeType::parse(&change_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown change type: {change_str}"))
    })?;
    Ok(TaxonomyChange {
        id: row.get("id"),
        taxonomy_id: row.get("taxonomy_id"),
        status,
        change_type,
        taxonomy_data: row.get("taxonomy_data"),
        created_by: row.get("created_by"),
        source_run_id: row.get("source_run_id"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl CanonicalVersionRepository for PostgresCanonicalRepository {
    async fn create(&self, new: NewVersion) -> Result<CanonicalVersion, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO canonical_versions (
                family, parent_version_id, scope_key, status, payload, selection_rules,
                taxonomy_snapshot_id, created_by, source_run_id, commit_classification,
                created_at, approved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), $11)
            RETURNING {VERSION_COLUMNS}
            "#,
        ))
        .bind(new.family.as_str())
        .bind(new.parent_version_id)
        .bind(&new.scope_key)
        .bind(new.status.as_str())
        .bind(&new.payload)
        .bind(&new.selection_rules)
        .bind(new.taxonomy_snapshot_id)
        .bind(&new.created_by)
        .bind(&new.source_run_id)
        .bind(&new.commit_classification)
        .bind(new.approved_at)
        .fetch_one(&self.pool)
        .await?;
        row_to_version(&row)
    }

    async fn update(&self, version: &CanonicalVersion) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE canonical_versions SET
                parent_version_id = $2,
                status = $3,
                payload = $4,
                selection_rules = $5,
                taxonomy_snapshot_id = $6,
                commit_classification = $7,
                approved_at = $8
            WHERE id = $1
            "#,
        )
        .bind(version.id)
        .bind(version.parent_version_id)
        .bind(version.status.as_str())
        .bind(&version.payload)
        .bind(&version.selection_rules)
        .bind(version.taxonomy_snapshot_id)
        .bind(&version.commit_classification)
        .bind(version.approved_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("version {}", version.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CanonicalVersion>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS} FROM canonical_versions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn latest(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
    ) -> Result<Option<CanonicalVersion>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {VERSION_COLUMNS} FROM canonical_versions
            WHERE family = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR scope_key = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        ))
        .bind(family.as_str())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.scope_key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn history(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
        limit: i64,
    ) -> Result<Vec<CanonicalVersion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VERSION_COLUMNS} FROM canonical_versions
            WHERE family = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR scope_key = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        ))
        .bind(family.as_str())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.scope_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_version).collect()
    }

    async fn trim(
        &self,
        family: VersionFamily,
        keep: usize,
    ) -> Result<Vec<i64>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let purged: Vec<i64> = sqlx::query_scalar(
            r#"
            DELETE FROM canonical_versions
            WHERE family = $1
              AND id NOT IN (
                  SELECT id FROM canonical_versions
                  WHERE family = $1
                  ORDER BY created_at DESC, id DESC
                  LIMIT $2
              )
            RETURNING id
            "#,
        )
        .bind(family.as_str())
        .bind(keep as i64)
        .fetch_all(&mut *tx)
        .await?;
        if !purged.is_empty() {
            sqlx::query(
                "UPDATE canonical_versions SET parent_version_id = NULL \
                 WHERE parent_version_id = ANY($1)",
            )
            .bind(&purged)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(purged)
    }
}

#[async_trait]
impl TaxonomySnapshotRepository for PostgresCanonicalRepository {
    async fn create(&self, new: NewSnapshot) -> Result<TaxonomySnapshot, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO taxonomy_snapshots (snapshot_data, record_metadata, created_by, source_run_id, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, snapshot_data, record_metadata, created_by, source_run_id, created_at
            "#,
        )
        .bind(&new.snapshot_data)
        .bind(&new.record_metadata)
        .bind(&new.created_by)
        .bind(&new.source_run_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_snapshot(&row))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomySnapshot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, snapshot_data, record_metadata, created_by, source_run_id, created_at \
             FROM taxonomy_snapshots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_snapshot))
    }
}

const CHANGE_COLUMNS: &str =
    "id, taxonomy_id, status, change_type, taxonomy_data, created_by, source_run_id, created_at";

#[async_trait]
impl TaxonomyChangeRepository for PostgresCanonicalRepository {
    async fn append(&self, new: NewTaxonomyChange) -> Result<TaxonomyChange, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO taxonomy_changes (taxonomy_id, status, change_type, taxonomy_data, created_by, source_run_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {CHANGE_COLUMNS}
            "#,
        ))
        .bind(new.taxonomy_id)
        .bind(new.status.as_str())
        .bind(new.change_type.as_str())
        .bind(&new.taxonomy_data)
        .bind(&new.created_by)
        .bind(&new.source_run_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_change(&row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomyChange>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CHANGE_COLUMNS} FROM taxonomy_changes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_change).transpose()
    }

    async fn list(&self, limit: i64) -> Result<Vec<TaxonomyChange>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CHANGE_COLUMNS} FROM taxonomy_changes \
             ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_change).collect()
    }
}
