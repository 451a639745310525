use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub client_id: String,
    pub make: String,
    pub model: String,
    pub plate: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Vehicle {
    pub fn label(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}
