use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// CSV with `site`, `domain`, `description` columns.
    #[serde(default = "d_sites_csv")]
    pub sites_csv_path: PathBuf,
    /// Model completions allowed per chat before the loop gives up.
    #[serde(default = "d_10")]
    pub max_iterations: usize,
    /// History turns handed to the model as context.
    #[serde(default = "d_5")]
    pub history_window: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sites_csv_path: d_sites_csv(),
            max_iterations: d_10(),
            history_window: d_5(),
        }
    }
}

fn d_sites_csv() -> PathBuf {
    PathBuf::from("sites_data.csv")
}
fn d_10() -> usize {
    10
}
fn d_5() -> usize {
    5
}
