pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod keyword_grader;
pub mod llm_providers;
pub mod llm_service;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod similarity;
pub mod type_graders;


pub use config::{Config, GradingConfig, LLMConfig, LoggingConfig};
pub use dispatcher::{AnswerGrader, GradingDispatcher};
pub use errors::GradingError;
pub use keyword_grader::KeywordFallbackGrader;
pub use llm_providers::{JsonResponseParser, LLMProvider, LLMProviderFactory, LLMProviderType, TextCompletion};
pub use llm_service::{AiGradingRequest, AiGradingResponse, LLMService};
pub use models::*;
pub use orchestrator::ChunkedGradingOrchestrator;
pub use similarity::SimilarityScorer;
pub use type_graders::{MultipleChoiceGrader, OpenEndedGrader, ShortAnswerGrader};
