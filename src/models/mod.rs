pub mod artifact;
pub mod survey;

pub use artifact::{ArtifactSummary, FeatureColumn, FeatureKind, FeatureSchema, ModelArtifact};
pub use survey::{sample_survey_responses, FinancialHealth, PredictionResult, SurveyResponse};
