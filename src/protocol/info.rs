use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub version: String,
    pub git: GitInfo,
    pub build_time: u64,
    /// Milliseconds since start.
    pub uptime: u64,
    pub sessions: usize,
    pub connected_clients: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub branch: String,
    pub commit: String,
    pub commit_time: u64,
}

impl GitInfo {
    pub fn from_build_env() -> Self {
        Self {
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown").to_string(),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
            commit_time: option_env!("GIT_COMMIT_TIME")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
        }
    }
}

pub fn build_time() -> u64 {
    option_env!("BUILD_TIME").and_then(|t| t.parse().ok()).unwrap_or(0)
}
