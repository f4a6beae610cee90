use serde::{Deserialize, Serialize};

/// An account row.
///
/// `persona` is the productivity persona the user picked at onboarding;
/// the relay carries it as an opaque label.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub persona: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
