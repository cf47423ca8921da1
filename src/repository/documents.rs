use async_trait::async_trait;

use super::{DocumentRepository, RepoError, RepoResult};
use crate::db::{now_timestamp, DbPool, Document, NewDocument};

const DOCUMENT_COLUMNS: &str =
    "id, patient_id, file_name, external_url, external_object_id, mime_type, uploaded_at";

pub struct SqliteDocumentRepository {
    db: DbPool,
}

impl SqliteDocumentRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn create(&self, document: &NewDocument) -> RepoResult<Document> {
        let query = format!(
            "INSERT INTO patient_documents \
             (patient_id, file_name, external_url, external_object_id, mime_type, uploaded_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let created = sqlx::query_as::<_, Document>(&query)
            .bind(document.patient_id)
            .bind(&document.file_name)
            .bind(&document.external_url)
            .bind(&document.external_object_id)
            .bind(&document.mime_type)
            .bind(now_timestamp())
            .fetch_one(&self.db)
            .await?;
        Ok(created)
    }

    async fn get(&self, id: i64) -> RepoResult<Document> {
        let query = format!("SELECT {} FROM patient_documents WHERE id = ?", DOCUMENT_COLUMNS);
        let document = sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(document)
    }

    async fn list_for_patient(&self, patient_id: i64) -> RepoResult<Vec<Document>> {
        let query = format!(
            "SELECT {} FROM patient_documents WHERE patient_id = ? ORDER BY uploaded_at DESC, id DESC",
            DOCUMENT_COLUMNS
        );
        let documents = sqlx::query_as::<_, Document>(&query)
            .bind(patient_id)
            .fetch_all(&self.db)
            .await?;
        Ok(documents)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM patient_documents WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
