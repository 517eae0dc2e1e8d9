use serde::Serialize;

/// Successful JSON bodies are wrapped as `{ "data": ... }`; errors use
/// `{ "error", "code" }` instead (see [`crate::error::AppError`]).
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
