pub mod analysis;
pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod prompt;
pub mod providers;
pub mod validation;

pub use analysis::{AnalysisClient, AnalysisResult};
pub use batch::{BatchReport, BatchRunner, CompanyEntry};
pub use config::{ConfigSources, EffectiveConfig, Settings};
pub use error::{AnalysisError, ConfigError, MalformedInputError, RequestError};
pub use prompt::PromptTemplate;
