use qms_core::AppError;

/// Constraint guarding one usage counter per subscription and resource type.
const USAGE_UNIQUE_CONSTRAINT: &str = "usages_subscription_resource_key";

/// Maps a driver error to the engine's taxonomy, logging anything unexpected.
///
/// Serialization failures, deadlocks and a lost race to create a usage row
/// are retryable conflicts. Any other duplicate key is a caller mistake, as
/// is a foreign-key violation (referenced row missing or still referenced).
pub(crate) fn classify(err: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        match code.as_deref() {
            Some("40001") | Some("40P01") => {
                tracing::warn!(error = %err, "{}: serialization conflict", context);
                return AppError::Conflict(format!("{}: concurrent update", context));
            }
            Some("23505") if db_err.constraint() == Some(USAGE_UNIQUE_CONSTRAINT) => {
                tracing::warn!(error = %err, "{}: usage row created concurrently", context);
                return AppError::Conflict(format!("{}: usage row created concurrently", context));
            }
            Some("23505") => {
                return AppError::InvalidInput(format!("{}: already exists", context));
            }
            Some("23503") => {
                return AppError::InvalidInput(format!(
                    "{}: referenced row is missing or still in use",
                    context
                ));
            }
            _ => {}
        }
    }

    if let sqlx::Error::RowNotFound = err {
        return AppError::NotFound(context.to_string());
    }

    tracing::error!(error = %err, "{}", context);
    AppError::Database(err)
}
