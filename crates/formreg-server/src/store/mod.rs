// SPDX-License-Identifier: Apache-2.0

use formreg_model::{
    DeploymentStatus, FormTemplate, NewFormTemplate, NewPdfTemplate, PdfTemplate, TemplateId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum StoreError {
    Duplicate { id: String },
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate { id } => write!(f, "row already exists: {id}"),
            Self::Backend(message) => write!(f, "registry backend error: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

const SCHEMA_SQL: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS pdf_templates (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    version       TEXT NOT NULL,
    template_uuid TEXT NOT NULL,
    notes         TEXT
);
CREATE TABLE IF NOT EXISTS form_templates (
    id              TEXT PRIMARY KEY,
    version         TEXT,
    ministry_id     TEXT,
    last_modified   TEXT,
    title           TEXT,
    form_id         TEXT,
    deployed_to     TEXT NOT NULL DEFAULT '',
    data_sources    TEXT,
    data            TEXT NOT NULL DEFAULT '[]',
    interface       TEXT NOT NULL DEFAULT '[]',
    barcode         TEXT,
    pdf_template_id TEXT REFERENCES pdf_templates(id)
);
CREATE INDEX IF NOT EXISTS idx_form_templates_form_id ON form_templates(form_id);
";

const FORM_COLUMNS: &str = "id, version, ministry_id, last_modified, title, form_id, \
     deployed_to, data_sources, data, interface, barcode, pdf_template_id";

/// Effective-version resolution order: prod > test > dev > none, then the
/// numerically highest version.
const DEPLOYMENT_ORDER_SQL: &str = "
    CASE deployed_to
        WHEN 'prod' THEN 1
        WHEN 'test' THEN 2
        WHEN 'dev'  THEN 3
        ELSE 4
    END,
    CAST(version AS INTEGER) DESC
";

/// SQLite-backed registry for the two template tables. The connection is
/// shared behind a mutex; queries run on the blocking pool.
pub struct Registry {
    conn: Arc<Mutex<Connection>>,
}

impl Registry {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("registry mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }

    /// Insert a new form-template version. Fails with `Duplicate` when the
    /// id is already registered.
    pub async fn create_form(&self, form: NewFormTemplate) -> Result<TemplateId, StoreError> {
        self.with_conn(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM form_templates WHERE id = ?1",
                    params![form.id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            if exists.is_some() {
                return Err(StoreError::Duplicate {
                    id: form.id.as_str().to_string(),
                });
            }

            conn.execute(
                "INSERT INTO form_templates \
                     (id, version, ministry_id, last_modified, title, form_id, deployed_to, \
                      data_sources, data, interface) \
                 VALUES (?1, ?2, ?3, \
                         COALESCE(?4, strftime('%Y-%m-%dT%H:%M:%SZ', 'now')), \
                         ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    form.id.as_str(),
                    form.version,
                    form.ministry_id,
                    form.last_modified,
                    form.title,
                    form.form_id,
                    form.deployed_to.as_str(),
                    form.data_sources.as_ref().map(Value::to_string),
                    form.data.to_string(),
                    form.interface.to_string(),
                ],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(form.id)
        })
        .await
    }

    pub async fn form_by_id(&self, id: String) -> Result<Option<FormTemplate>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {FORM_COLUMNS} FROM form_templates WHERE id = ?1"),
                params![id],
                map_form_row,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }

    /// Resolve the effective version for a logical form: highest deployment
    /// priority wins, latest numeric version breaks ties.
    pub async fn form_by_form_id(
        &self,
        form_id: String,
    ) -> Result<Option<FormTemplate>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {FORM_COLUMNS} FROM form_templates WHERE form_id = ?1 \
                     ORDER BY {DEPLOYMENT_ORDER_SQL} LIMIT 1"
                ),
                params![form_id],
                map_form_row,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }

    pub async fn all_forms(&self) -> Result<Vec<FormTemplate>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {FORM_COLUMNS} FROM form_templates ORDER BY form_id, \
                     CAST(version AS INTEGER) DESC"
                ))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let rows = stmt
                .query_map([], map_form_row)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }

    /// Move the environment tag to one version of a form. Clearing the tag
    /// from sibling versions and setting it on the target happens inside a
    /// single transaction so the one-version-per-environment invariant holds
    /// even if the process dies mid-update. An absent `pdf_template_id`
    /// leaves the existing link alone; callers that only flip environments
    /// do not carry it. Returns false when the target id does not exist.
    pub async fn update_deployment(
        &self,
        form_id: String,
        id: String,
        deployed_to: DeploymentStatus,
        pdf_template_id: Option<String>,
    ) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            tx.execute(
                "UPDATE form_templates SET deployed_to = '' \
                 WHERE form_id = ?1 AND id <> ?2 AND deployed_to = ?3",
                params![form_id, id, deployed_to.as_str()],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
            let updated = tx
                .execute(
                    "UPDATE form_templates \
                     SET deployed_to = ?2, \
                         pdf_template_id = COALESCE(?3, pdf_template_id) \
                     WHERE id = ?1",
                    params![id, deployed_to.as_str(), pdf_template_id],
                )
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            tx.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(updated > 0)
        })
        .await
    }

    pub async fn all_pdf_templates(&self) -> Result<Vec<PdfTemplate>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, version, template_uuid, notes \
                     FROM pdf_templates ORDER BY name, version",
                )
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let rows = stmt
                .query_map([], map_pdf_row)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }

    pub async fn create_pdf_template(
        &self,
        template: NewPdfTemplate,
    ) -> Result<TemplateId, StoreError> {
        let id = TemplateId::generate();
        let id_for_row = id.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pdf_templates (id, name, version, template_uuid, notes) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id_for_row.as_str(),
                    template.name,
                    template.version,
                    template.template_uuid,
                    template.notes,
                ],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    /// PETS handle for a registered PDF template, or None when unknown.
    pub async fn pdf_template_uuid(&self, id: String) -> Result<Option<String>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT template_uuid FROM pdf_templates WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
    }
}

fn map_form_row(row: &Row<'_>) -> rusqlite::Result<FormTemplate> {
    let id: String = row.get(0)?;
    let deployed_raw: String = row.get(6)?;
    Ok(FormTemplate {
        id: TemplateId::parse(&id).map_err(|e| conversion_error(0, e))?,
        version: row.get(1)?,
        ministry_id: row.get(2)?,
        last_modified: row.get(3)?,
        title: row.get(4)?,
        form_id: row.get(5)?,
        deployed_to: DeploymentStatus::parse(&deployed_raw)
            .map_err(|e| conversion_error(6, e))?,
        data_sources: json_column(row, 7)?,
        data: json_column(row, 8)?.unwrap_or(Value::Null),
        interface: json_column(row, 9)?.unwrap_or(Value::Null),
        barcode: json_column(row, 10)?,
        pdf_template_id: row
            .get::<_, Option<String>>(11)?
            .map(|raw| TemplateId::parse(&raw).map_err(|e| conversion_error(11, e)))
            .transpose()?,
    })
}

fn map_pdf_row(row: &Row<'_>) -> rusqlite::Result<PdfTemplate> {
    let id: String = row.get(0)?;
    Ok(PdfTemplate {
        id: TemplateId::parse(&id).map_err(|e| conversion_error(0, e))?,
        name: row.get(1)?,
        version: row.get(2)?,
        template_uuid: row.get(3)?,
        notes: row.get(4)?,
    })
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
