use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An enabled repository collection as seen by the startup hook.
///
/// Owned by the persistence layer; the hook only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    /// Id of the collection's settings row, if one exists.
    pub setting_id: Option<i64>,
}

impl Collection {
    #[must_use]
    pub fn setting_id(&self) -> Option<i64> {
        self.setting_id
    }
}
