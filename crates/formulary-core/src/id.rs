/// Generates an opaque identifier for a new authorization request.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
