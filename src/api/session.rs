use crate::analysis::AnalysisResult;
use crate::batch::BatchReport;
use crate::config::{ConfigSources, Settings, API_KEY};
use crate::validation::ValidationReport;

/// In-memory state of the running app. Lost when the process stops.
#[derive(Debug, Default)]
pub struct Session {
    /// Values saved from the settings form.
    pub settings: Settings,
    /// The most recently loaded `.env` block and its raw text.
    pub env_block: Settings,
    pub env_content: String,
    pub last_output: Option<AnalysisResult>,
    pub batch: Option<BatchReport>,
    pub validation: Option<ValidationReport>,
}

impl Session {
    pub fn with_env_content(content: &str) -> Self {
        let mut session = Self::default();
        session.load_env_content(content);
        session
    }

    /// Replaces the `.env` layer and returns how many variables it holds.
    pub fn load_env_content(&mut self, content: &str) -> usize {
        self.env_block = Settings::parse_env_content(content);
        self.env_content = content.to_string();
        self.env_block.len()
    }

    pub fn sources(&self, direct_api_key: Option<String>, process_env: &Settings) -> ConfigSources {
        ConfigSources {
            direct_api_key,
            session: self.settings.clone(),
            env_block: self.env_block.clone(),
            process_env: process_env.clone(),
        }
    }

    pub fn clear_config(&mut self) {
        self.settings.clear();
        self.env_block.clear();
        self.env_content.clear();
    }

    pub fn clear_api_key(&mut self) {
        self.settings.remove(API_KEY);
        self.env_block.remove(API_KEY);
    }
}
