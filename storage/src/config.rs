use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreType {
    Filesystem { base_dir: String },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub r#type: StoreType,
    /// Per-call deadline. Calls exceeding it fail as unavailable.
    pub timeout_ms: Option<u64>,
}
