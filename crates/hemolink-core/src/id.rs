use uuid::Uuid;

/// Generates a new opaque identifier for server-assigned records
/// (sync jobs, screening results, audit entries).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
