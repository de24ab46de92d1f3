use serde::{Deserialize, Serialize};
use uuid::Uuid;

// opaque, already-authenticated identity; the store never interprets it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
