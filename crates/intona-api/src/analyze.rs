//! `POST /analyze-intonation` response payload.
//!
//! The request side is a multipart form (a `file` part with the recorded
//! audio and a `phrase` part with the level's phrase identifier), so it has
//! no struct here.

/// Scored analysis of one uploaded recording.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AnalyzeResponse {
    /// Probability that the uploaded audio contains the expected phrase.
    pub phrase_probability: f64,
    /// Headline contour-similarity score, 0–100.
    pub score: f64,
    /// Where the server published the rendered contour graph.
    pub graph_url: String,
    pub details: AnalysisDetails,
    /// Sent when the phrase check failed, naming what the server expected.
    #[serde(default)]
    pub expected_phrase: Option<String>,
}

/// Per-feature breakdown behind the headline score.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AnalysisDetails {
    pub f0_similarity: f64,
    pub energy_similarity: f64,
    pub contour_similarity: f64,
    pub best_match_score: f64,
    pub score_variance: f64,
    pub ik_type: String,
    pub best_reference_index: i32,
    pub all_scores: Vec<f64>,
}
