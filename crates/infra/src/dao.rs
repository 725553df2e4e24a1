//! API 凭证数据访问对象
//!
//! 提供 api_keys 表的 CRUD 操作。

use aeroview_core::ApiKeyRecord;
use rusqlite::{params, Connection, OptionalExtension};

/// 数据库行结构
struct ApiKeyRow {
    id: i64,
    secret: String,
    is_active: i64,
    activated_at: i64,
    error_count: i64,
    last_used_at: i64,
    created_at: i64,
}

impl ApiKeyRow {
    fn into_record(self) -> ApiKeyRecord {
        ApiKeyRecord {
            id: self.id,
            secret: self.secret,
            is_active: self.is_active != 0,
            activated_at: self.activated_at,
            error_count: self.error_count as u32,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<ApiKeyRow, rusqlite::Error> {
    Ok(ApiKeyRow {
        id: row.get(0)?,
        secret: row.get(1)?,
        is_active: row.get(2)?,
        activated_at: row.get(3)?,
        error_count: row.get(4)?,
        last_used_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const COLUMNS: &str = "id, secret, is_active, activated_at, error_count, last_used_at, created_at";

pub struct ApiKeyDao;

impl ApiKeyDao {
    /// 按池顺序列出全部凭证
    pub fn list_all(conn: &Connection) -> Result<Vec<ApiKeyRecord>, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM api_keys ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record());
        }
        Ok(records)
    }

    /// 获取活跃凭证
    pub fn get_active(conn: &Connection) -> Result<Option<ApiKeyRecord>, rusqlite::Error> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM api_keys WHERE is_active = 1 LIMIT 1"),
                [],
                map_row,
            )
            .optional()?;
        Ok(row.map(ApiKeyRow::into_record))
    }

    /// 插入新凭证（初始未激活），返回分配的 id
    pub fn insert(conn: &Connection, secret: &str, now_ms: i64) -> Result<i64, rusqlite::Error> {
        conn.execute(
            "INSERT INTO api_keys (secret, is_active, activated_at, error_count, last_used_at, created_at)
             VALUES (?1, 0, 0, 0, 0, ?2)",
            params![secret, now_ms],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 整条替换一条记录
    pub fn update(conn: &Connection, record: &ApiKeyRecord) -> Result<bool, rusqlite::Error> {
        let rows_affected = conn.execute(
            "UPDATE api_keys
             SET secret = ?1, is_active = ?2, activated_at = ?3,
                 error_count = ?4, last_used_at = ?5
             WHERE id = ?6",
            params![
                record.secret,
                record.is_active as i64,
                record.activated_at,
                record.error_count,
                record.last_used_at,
                record.id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// 取消所有凭证的活跃标记
    pub fn deactivate_all(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute("UPDATE api_keys SET is_active = 0", [])?;
        Ok(())
    }

    /// 删除一条凭证
    pub fn delete(conn: &Connection, id: i64) -> Result<bool, rusqlite::Error> {
        let rows_affected = conn.execute("DELETE FROM api_keys WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    /// 统计凭证数量
    pub fn count(conn: &Connection) -> Result<u32, rusqlite::Error> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM api_keys", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}
