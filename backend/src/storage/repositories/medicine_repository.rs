use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{MedicineType, TimeOfDay};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::domain::models::medicine::{
    decode_times, encode_times, Medicine, MedicinePatch, NewMedicineRecord,
};
use crate::storage::{DbConnection, MedicineStorage, StorageError};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, medicine_type, dosage, time_of_day, notes, active,
           prescription_path, created_at, updated_at
    FROM medicines
"#;

/// Repository for medicine records
#[derive(Clone)]
pub struct MedicineRepository {
    db: DbConnection,
}

impl MedicineRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn row_to_medicine(row: &SqliteRow) -> Result<Medicine, StorageError> {
        let id: i64 = row.try_get("id")?;
        let corrupt = |reason: String| StorageError::Corrupt { id, reason };

        let medicine_type: String = row.try_get("medicine_type")?;
        let time_of_day: String = row.try_get("time_of_day")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Medicine {
            id,
            name: row.try_get("name")?,
            medicine_type: medicine_type
                .parse::<MedicineType>()
                .map_err(|e| corrupt(e.to_string()))?,
            dosage: row.try_get("dosage")?,
            time_of_day: decode_times(&time_of_day).map_err(|e| corrupt(e.to_string()))?,
            notes: row.try_get("notes")?,
            active: row.try_get("active")?,
            prescription_path: row.try_get("prescription_path")?,
            created_at: parse_timestamp(&created_at).map_err(corrupt)?,
            updated_at: parse_timestamp(&updated_at).map_err(corrupt)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{raw}': {e}"))
}

#[async_trait]
impl MedicineStorage for MedicineRepository {
    async fn create(&self, record: &NewMedicineRecord) -> Result<i64, StorageError> {
        if record.name.trim().is_empty() {
            return Err(StorageError::MissingField("name"));
        }
        if record.time_of_day.is_empty() {
            return Err(StorageError::MissingField("time_of_day"));
        }

        let created_at = record.created_at.to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO medicines
                (name, medicine_type, dosage, time_of_day, notes, active,
                 prescription_path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.name)
        .bind(record.medicine_type.as_str())
        .bind(&record.dosage)
        .bind(encode_times(&record.time_of_day))
        .bind(&record.notes)
        .bind(record.active)
        .bind(&record.prescription_path)
        .bind(&created_at)
        .bind(&created_at)
        .execute(self.db.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, id: i64, patch: &MedicinePatch, updated_at: DateTime<Utc>) -> Result<(), StorageError> {
        if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
            return Err(StorageError::MissingField("name"));
        }
        if matches!(&patch.time_of_day, Some(times) if times.is_empty()) {
            return Err(StorageError::MissingField("time_of_day"));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE medicines SET updated_at = ");
        builder.push_bind(updated_at.to_rfc3339());

        if let Some(name) = &patch.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(medicine_type) = patch.medicine_type {
            builder.push(", medicine_type = ").push_bind(medicine_type.as_str());
        }
        if let Some(dosage) = &patch.dosage {
            builder.push(", dosage = ").push_bind(dosage.clone());
        }
        if let Some(times) = &patch.time_of_day {
            builder.push(", time_of_day = ").push_bind(encode_times(times));
        }
        if let Some(notes) = &patch.notes {
            builder.push(", notes = ").push_bind(notes.clone());
        }
        if let Some(active) = patch.active {
            builder.push(", active = ").push_bind(active);
        }
        if let Some(path) = &patch.prescription_path {
            builder.push(", prescription_path = ").push_bind(path.clone());
        }

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(self.db.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn list(&self, time_of_day: Option<TimeOfDay>) -> Result<Vec<Medicine>, StorageError> {
        let rows = match time_of_day {
            Some(time) => {
                // Times are stored comma separated; pad with commas so matches are whole words
                let sql = format!("{SELECT_COLUMNS} WHERE (',' || time_of_day || ',') LIKE ? ORDER BY id");
                sqlx::query(&sql)
                    .bind(format!("%,{},%", time.as_str()))
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let sql = format!("{SELECT_COLUMNS} ORDER BY id");
                sqlx::query(&sql).fetch_all(self.db.pool()).await?
            }
        };

        rows.iter().map(Self::row_to_medicine).collect()
    }

    async fn get(&self, id: i64) -> Result<Medicine, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(r) => Self::row_to_medicine(&r),
            None => Err(StorageError::NotFound(id)),
        }
    }

    async fn count_prescription_references(&self, path: &str) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines WHERE prescription_path = ?")
            .bind(path)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> MedicineRepository {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        MedicineRepository::new(db)
    }

    fn record(name: &str, times: &[TimeOfDay]) -> NewMedicineRecord {
        NewMedicineRecord {
            name: name.to_string(),
            medicine_type: MedicineType::Tablet,
            dosage: "500mg".to_string(),
            time_of_day: times.to_vec(),
            notes: None,
            active: true,
            prescription_path: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test().await;

        let mut new_record = record("Paracetamol", &[TimeOfDay::Evening, TimeOfDay::Morning]);
        new_record.notes = Some("after food".to_string());
        let id = repo.create(&new_record).await.expect("Failed to create medicine");
        assert!(id > 0);

        let medicine = repo.get(id).await.expect("Failed to get medicine");
        assert_eq!(medicine.id, id);
        assert_eq!(medicine.name, "Paracetamol");
        assert_eq!(medicine.medicine_type, MedicineType::Tablet);
        assert_eq!(medicine.dosage, "500mg");
        assert_eq!(medicine.time_of_day, vec![TimeOfDay::Morning, TimeOfDay::Evening]);
        assert_eq!(medicine.notes.as_deref(), Some("after food"));
        assert!(medicine.active);
        assert!(medicine.prescription_path.is_none());
        assert_eq!(medicine.created_at, medicine.updated_at);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let repo = setup_test().await;

        let result = repo.create(&record("   ", &[TimeOfDay::Morning])).await;
        assert!(matches!(result, Err(StorageError::MissingField("name"))));
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let repo = setup_test().await;

        let first = repo.create(&record("A", &[TimeOfDay::Morning])).await.unwrap();
        let second = repo.create(&record("B", &[TimeOfDay::Morning])).await.unwrap();
        repo.delete(second).await.unwrap();
        let third = repo.create(&record("C", &[TimeOfDay::Morning])).await.unwrap();

        assert!(second > first);
        assert!(third > second, "Deleted id {} was handed out again", second);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = setup_test().await;

        let result = repo.get(42).await;
        assert!(matches!(result, Err(StorageError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let repo = setup_test().await;
        let id = repo.create(&record("Cough syrup", &[TimeOfDay::Morning])).await.unwrap();
        let before = repo.get(id).await.unwrap();

        let patch = MedicinePatch {
            medicine_type: Some(MedicineType::Syrup),
            dosage: Some("10ml".to_string()),
            time_of_day: Some(vec![TimeOfDay::Evening]),
            prescription_path: Some(Some("123_abc.png".to_string())),
            ..Default::default()
        };
        let later = before.updated_at + chrono::Duration::seconds(5);
        repo.update(id, &patch, later).await.expect("Failed to update");

        let after = repo.get(id).await.unwrap();
        assert_eq!(after.name, "Cough syrup");
        assert_eq!(after.medicine_type, MedicineType::Syrup);
        assert_eq!(after.dosage, "10ml");
        assert_eq!(after.time_of_day, vec![TimeOfDay::Evening]);
        assert_eq!(after.prescription_path.as_deref(), Some("123_abc.png"));
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.updated_at, later);

        // Some(None) clears nullable columns
        let clear = MedicinePatch {
            prescription_path: Some(None),
            notes: Some(None),
            active: Some(false),
            ..Default::default()
        };
        repo.update(id, &clear, Utc::now()).await.unwrap();
        let cleared = repo.get(id).await.unwrap();
        assert!(cleared.prescription_path.is_none());
        assert!(!cleared.active);
    }

    #[tokio::test]
    async fn test_update_missing() {
        let repo = setup_test().await;

        let patch = MedicinePatch {
            name: Some("Ghost".to_string()),
            ..Default::default()
        };
        let result = repo.update(7, &patch, Utc::now()).await;
        assert!(matches!(result, Err(StorageError::NotFound(7))));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let repo = setup_test().await;
        let id = repo.create(&record("Ibuprofen", &[TimeOfDay::Afternoon])).await.unwrap();

        repo.delete(id).await.expect("First delete should succeed");
        assert!(matches!(repo.delete(id).await, Err(StorageError::NotFound(_))));
        assert!(matches!(repo.delete(id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let repo = setup_test().await;
        repo.create(&record("A", &[TimeOfDay::Morning])).await.unwrap();
        repo.create(&record("B", &[TimeOfDay::Afternoon, TimeOfDay::Evening])).await.unwrap();
        repo.create(&record("C", &[TimeOfDay::Morning, TimeOfDay::Evening])).await.unwrap();

        let all = repo.list(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let evening: Vec<String> = repo
            .list(Some(TimeOfDay::Evening))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(evening, vec!["B", "C"]);

        let afternoon = repo.list(Some(TimeOfDay::Afternoon)).await.unwrap();
        assert_eq!(afternoon.len(), 1);
        assert_eq!(afternoon[0].name, "B");
    }

    #[tokio::test]
    async fn test_count_prescription_references() {
        let repo = setup_test().await;
        let mut linked = record("A", &[TimeOfDay::Morning]);
        linked.prescription_path = Some("1_a.png".to_string());
        repo.create(&linked).await.unwrap();
        repo.create(&record("B", &[TimeOfDay::Morning])).await.unwrap();

        assert_eq!(repo.count_prescription_references("1_a.png").await.unwrap(), 1);
        assert_eq!(repo.count_prescription_references("2_b.png").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let repo = setup_test().await;
        let id = repo.create(&record("A", &[TimeOfDay::Morning])).await.unwrap();

        sqlx::query("UPDATE medicines SET medicine_type = 'capsule' WHERE id = ?")
            .bind(id)
            .execute(repo.db.pool())
            .await
            .unwrap();

        assert!(matches!(repo.get(id).await, Err(StorageError::Corrupt { .. })));
    }
}
