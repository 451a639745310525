use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub day: String,
    pub line: String,
    pub created_at: String,
}
