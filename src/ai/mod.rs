pub mod analysis;
pub mod config;
pub mod followup;
pub mod http_client;
pub mod prompts;
pub mod utils;

pub use analysis::{AnalysisClient, AnalysisProvider};
pub use config::{AnalysisConfig, ClientConfig, FollowupConfig, GenerationConfig};
pub use followup::{FollowupClient, FollowupProvider};
