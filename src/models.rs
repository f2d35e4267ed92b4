use serde::{Deserialize, Serialize};

// Session payload as returned by the auth backend; unknown fields pass through untouched
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// Body of every error response
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
}
