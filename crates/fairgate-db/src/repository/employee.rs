//! # Employee Repository
//!
//! Database operations for POS employees. PINs never reach this layer;
//! the service hands us the HMAC hash only.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::Employee;

const SELECT_COLUMNS: &str = r#"
    employee_number,
    display_name,
    pin_hash,
    publisher_id,
    event_id,
    active,
    created_at
"#;

/// Repository for employee database operations.
#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Creates a new EmployeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    /// Inserts a new employee.
    ///
    /// Existence-gated: a duplicate employee_number is rejected by the
    /// conditional insert itself.
    pub async fn insert(&self, employee: &Employee) -> DbResult<()> {
        debug!(employee_number = %employee.employee_number, "Inserting employee");

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO employees (
                employee_number, display_name, pin_hash,
                publisher_id, event_id, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&employee.employee_number)
        .bind(&employee.display_name)
        .bind(&employee.pin_hash)
        .bind(&employee.publisher_id)
        .bind(&employee.event_id)
        .bind(employee.active)
        .bind(employee.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::duplicate(
                "employee_number",
                &employee.employee_number,
            ));
        }

        Ok(())
    }

    /// Gets an employee by number.
    pub async fn get(&self, employee_number: &str) -> DbResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {SELECT_COLUMNS} FROM employees WHERE employee_number = ?1"
        ))
        .bind(employee_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(employee)
    }

    /// Activates or deactivates an employee.
    pub async fn set_active(&self, employee_number: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE employees SET active = ?2 WHERE employee_number = ?1")
            .bind(employee_number)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Employee", employee_number));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn employee(number: &str) -> Employee {
        Employee {
            employee_number: number.to_string(),
            display_name: "Cashier".to_string(),
            pin_hash: "deadbeef".to_string(),
            publisher_id: None,
            event_id: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.employees();

        repo.insert(&employee("1000001")).await.unwrap();
        assert!(matches!(
            repo.insert(&employee("1000001")).await,
            Err(DbError::UniqueViolation { .. })
        ));

        let loaded = repo.get("1000001").await.unwrap().unwrap();
        assert!(loaded.active);

        repo.set_active("1000001", false).await.unwrap();
        assert!(!repo.get("1000001").await.unwrap().unwrap().active);

        assert!(matches!(
            repo.set_active("9999999", false).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
