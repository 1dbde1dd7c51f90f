pub mod cache;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::settings::PredictorSettings;
use crate::error::{ApiError, Result};
use crate::providers::deepseek::DeepSeekProvider;
use crate::providers::deepseek::types::{
    ChatCompletionRequestArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ResponseFormat,
};
use crate::providers::football::{
    Fixture, FixtureQuery, FootballApi, HeadToHead, Player, StandingRow,
};

use cache::PredictionCache;

/// Recent-form lookback for each team.
pub const FORM_WINDOW_DAYS: u64 = 30;
pub(crate) const FORM_MATCHES: usize = 5;
const TOP_SCORERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinProbabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedScore {
    pub home: u32,
    pub away: u32,
}

/// Full analysis produced by the detailed path. Ephemeral; lives only in
/// the in-memory cache, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPrediction {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub predicted_winner: Option<String>,
    pub win_probabilities: WinProbabilities,
    pub predicted_score: PredictedScore,
    pub confidence_level: f64,
    pub key_factors: Vec<String>,
    pub detailed_analysis: String,
}

/// Lean verdict produced by the fast path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickPrediction {
    pub prediction: String,
    pub confidence: f64,
    #[serde(default)]
    pub score_prediction: Option<String>,
    #[serde(default)]
    pub recommended_bet: Option<String>,
    pub reasoning: String,
}

/// Model output for the detailed path, before the match identity is
/// attached.
#[derive(Debug, Deserialize)]
struct PredictionPayload {
    predicted_winner: Option<String>,
    win_probabilities: WinProbabilities,
    predicted_score: PredictedScore,
    confidence_level: f64,
    #[serde(default)]
    key_factors: Vec<String>,
    #[serde(default)]
    detailed_analysis: String,
}

/// Everything the prompts need about one match, collected upstream.
pub struct MatchContext {
    pub fixture: Fixture,
    pub h2h: HeadToHead,
    pub standings: Vec<StandingRow>,
    pub home_form: Vec<Fixture>,
    pub away_form: Vec<Fixture>,
    pub home_scorers: Vec<Player>,
    pub away_scorers: Vec<Player>,
}

/// Races an upstream call against cancellation of the initiating context.
async fn guarded<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = operation => result,
    }
}

fn top_scorers(mut players: Vec<Player>) -> Vec<Player> {
    players.sort_by(|a, b| b.goals().cmp(&a.goals()));
    players.truncate(TOP_SCORERS);
    players
}

fn parse_model_json<T: DeserializeOwned>(content: &str) -> Result<T> {
    let json = prompt::extract_json(content).ok_or_else(|| {
        ApiError::Parse("Impossible d'extraire le JSON de la réponse du modèle.".to_string())
    })?;
    serde_json::from_str(json).map_err(ApiError::from)
}

/// Aggregates sports data for one match and delegates the reasoning to the
/// completion model.
///
/// Independent fetches (standings, recent form, squads) run concurrently;
/// the fixture and head-to-head lookups stay sequential because each needs
/// identifiers from the previous step. Results are cached per match id for
/// a configurable freshness window.
pub struct PredictionPipeline {
    football: Arc<FootballApi>,
    settings: PredictorSettings,
    timeout: Duration,
    detailed_cache: PredictionCache<MatchPrediction>,
    quick_cache: PredictionCache<QuickPrediction>,
}

impl PredictionPipeline {
    pub fn new(football: Arc<FootballApi>, settings: PredictorSettings, timeout: Duration) -> Self {
        let max_age = chrono::Duration::minutes(settings.cache_max_age_minutes);
        Self {
            football,
            settings,
            timeout,
            detailed_cache: PredictionCache::new(max_age),
            quick_cache: PredictionCache::new(max_age),
        }
    }

    pub async fn predict_match(
        &self,
        match_id: &str,
        cancel: &CancellationToken,
    ) -> Result<MatchPrediction> {
        if let Some(cached) = self.detailed_cache.fresh(match_id).await {
            tracing::debug!(match_id, "serving detailed prediction from cache");
            return Ok(cached);
        }

        let context = self.collect(match_id, cancel).await?;
        let content = self
            .complete(&prompt::detailed_prompt(&context), cancel)
            .await?;
        let payload: PredictionPayload = parse_model_json(&content)?;

        let prediction = MatchPrediction {
            match_id: context.fixture.match_id.clone(),
            home_team: context.fixture.match_hometeam_name.clone(),
            away_team: context.fixture.match_awayteam_name.clone(),
            predicted_winner: payload.predicted_winner,
            win_probabilities: payload.win_probabilities,
            predicted_score: payload.predicted_score,
            confidence_level: payload.confidence_level,
            key_factors: payload.key_factors,
            detailed_analysis: payload.detailed_analysis,
        };
        self.detailed_cache.store(match_id, prediction.clone()).await;
        tracing::info!(
            match_id,
            winner = prediction.predicted_winner.as_deref().unwrap_or("nul"),
            confidence = prediction.confidence_level,
            "detailed prediction produced"
        );
        Ok(prediction)
    }

    pub async fn quick_predict(
        &self,
        match_id: &str,
        cancel: &CancellationToken,
    ) -> Result<QuickPrediction> {
        if let Some(cached) = self.quick_cache.fresh(match_id).await {
            tracing::debug!(match_id, "serving quick prediction from cache");
            return Ok(cached);
        }

        let context = self.collect(match_id, cancel).await?;
        let content = self.complete(&prompt::quick_prompt(&context), cancel).await?;
        let prediction: QuickPrediction = parse_model_json(&content)?;
        self.quick_cache.store(match_id, prediction.clone()).await;
        Ok(prediction)
    }

    /// Predicts every upcoming match of a league over a date range. A match
    /// whose prediction fails is skipped, not fatal; cancellation still
    /// aborts the whole batch.
    pub async fn predict_league(
        &self,
        league_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<MatchPrediction>> {
        let fixtures = guarded(
            cancel,
            self.football
                .fixtures(&FixtureQuery::for_league(league_id, from, to)),
        )
        .await?;

        let mut predictions = Vec::new();
        for fixture in fixtures.into_iter().filter(|f| f.is_upcoming()) {
            match self.predict_match(&fixture.match_id, cancel).await {
                Ok(prediction) => predictions.push(prediction),
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
                Err(err) => {
                    tracing::warn!(match_id = %fixture.match_id, %err, "skipping match prediction");
                }
            }
        }
        Ok(predictions)
    }

    async fn collect(&self, match_id: &str, cancel: &CancellationToken) -> Result<MatchContext> {
        let fixtures = guarded(
            cancel,
            self.football.fixtures(&FixtureQuery::by_match(match_id)),
        )
        .await?;
        let Some(fixture) = fixtures.into_iter().next() else {
            return Err(ApiError::NotFound(format!("Match {match_id} non trouvé")));
        };

        let h2h = guarded(
            cancel,
            self.football
                .h2h(&fixture.match_hometeam_id, &fixture.match_awayteam_id),
        )
        .await?;

        let today = Utc::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(FORM_WINDOW_DAYS))
            .unwrap_or(today);

        let home_query = FixtureQuery::for_team_since(fixture.match_hometeam_id.as_str(), from);
        let away_query = FixtureQuery::for_team_since(fixture.match_awayteam_id.as_str(), from);
        let (standings, home_form, away_form, home_players, away_players) = guarded(cancel, async {
            tokio::try_join!(
                self.football.standings(&fixture.league_id),
                self.football.fixtures(&home_query),
                self.football.fixtures(&away_query),
                self.football.players(&fixture.match_hometeam_id),
                self.football.players(&fixture.match_awayteam_id),
            )
        })
        .await?;

        Ok(MatchContext {
            fixture,
            h2h,
            standings,
            home_form,
            away_form,
            home_scorers: top_scorers(home_players),
            away_scorers: top_scorers(away_players),
        })
    }

    async fn complete(&self, user_prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let request = ChatCompletionRequestArgs::default()
            .model(self.settings.model.clone())
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt::ANALYST_PERSONA)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()?
                    .into(),
            ])
            .temperature(self.settings.temperature)
            .response_format(ResponseFormat::JsonObject)
            .build()?;

        let response = guarded(
            cancel,
            DeepSeekProvider::chat_completions(
                &self.settings.base_url,
                &self.settings.api_key,
                self.timeout,
                &request,
            ),
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::Parse("La réponse du modèle ne contient aucun contenu.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::FootballSettings;
    use crate::test_support::spawn_backend;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::{Query, State};
    use axum::routing::{get, post};
    use serde_json::{Value, json};

    #[derive(Default)]
    struct SportsBackend {
        fixture_calls: AtomicUsize,
        h2h_calls: AtomicUsize,
        fixtures_empty: bool,
    }

    fn fixture_json(match_id: &str, status: &str) -> Value {
        json!({
            "match_id": match_id,
            "league_id": "177",
            "league_name": "Ligue 1",
            "match_date": "2026-08-09",
            "match_status": status,
            "match_hometeam_id": "72",
            "match_hometeam_name": "AS Douanes",
            "match_hometeam_score": "",
            "match_awayteam_id": "96",
            "match_awayteam_name": "Étoile Filante",
            "match_awayteam_score": "",
        })
    }

    fn played_json() -> Value {
        json!({
            "match_id": "80001",
            "match_status": "Finished",
            "match_hometeam_id": "72",
            "match_hometeam_name": "AS Douanes",
            "match_hometeam_score": "2",
            "match_awayteam_id": "55",
            "match_awayteam_name": "Rail Club",
            "match_awayteam_score": "1",
        })
    }

    async fn sports(
        State(state): State<Arc<SportsBackend>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        match params.get("action").map(String::as_str) {
            Some("get_events") if params.contains_key("match_id") => {
                state.fixture_calls.fetch_add(1, Ordering::SeqCst);
                if state.fixtures_empty {
                    Json(json!([]))
                } else {
                    Json(json!([fixture_json(&params["match_id"], "NS")]))
                }
            }
            Some("get_events") if params.contains_key("league_id") => Json(json!([
                fixture_json("86392", "NS"),
                fixture_json("86393", "Finished"),
            ])),
            Some("get_events") => Json(json!([played_json()])),
            Some("get_H2H") => {
                state.h2h_calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "H2H": [played_json()] }))
            }
            Some("get_standings") => Json(json!([
                {
                    "team_id": "72",
                    "team_name": "AS Douanes",
                    "league_name": "Ligue 1",
                    "overall_league_position": "1",
                    "overall_league_PTS": "54",
                },
            ])),
            Some("get_players") => Json(json!([
                { "player_name": "Issa Ouédraogo", "player_type": "Forwards", "player_goals": "11" },
                { "player_name": "Moussa Kaboré", "player_type": "Midfielders", "player_goals": "4" },
            ])),
            _ => Json(json!([])),
        }
    }

    struct LlmBackend {
        calls: AtomicUsize,
        content: String,
    }

    async fn completions(
        State(state): State<Arc<LlmBackend>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["response_format"]["type"], "json_object");
        Json(json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": state.content.clone() },
                "finish_reason": "stop",
                "logprobs": null,
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 },
        }))
    }

    fn detailed_content() -> String {
        json!({
            "predicted_winner": "AS Douanes",
            "win_probabilities": { "home": 55.0, "draw": 25.0, "away": 20.0 },
            "predicted_score": { "home": 2, "away": 1 },
            "confidence_level": 72.0,
            "key_factors": ["forme à domicile", "meilleure attaque"],
            "detailed_analysis": "AS Douanes domine ses réceptions depuis un mois.",
        })
        .to_string()
    }

    async fn pipeline_against(
        sports_state: Arc<SportsBackend>,
        llm_state: Arc<LlmBackend>,
    ) -> PredictionPipeline {
        let sports_app = Router::new().route("/", get(sports)).with_state(sports_state);
        let sports_base = spawn_backend(sports_app).await;

        let llm_app = Router::new()
            .route("/chat/completions", post(completions))
            .with_state(llm_state);
        let llm_base = spawn_backend(llm_app).await;

        let football = Arc::new(
            FootballApi::new(
                &FootballSettings {
                    base_url: format!("{sports_base}/"),
                    api_key: "K".to_string(),
                },
                Duration::from_secs(5),
            )
            .unwrap(),
        );
        let settings = PredictorSettings {
            base_url: llm_base,
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        PredictionPipeline::new(football, settings, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn detailed_prediction_happy_path() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: detailed_content(),
        });
        let pipeline = pipeline_against(sports_state.clone(), llm_state.clone()).await;

        let prediction = pipeline
            .predict_match("86392", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(prediction.match_id, "86392");
        assert_eq!(prediction.home_team, "AS Douanes");
        assert_eq!(prediction.away_team, "Étoile Filante");
        assert_eq!(prediction.predicted_winner.as_deref(), Some("AS Douanes"));
        assert_eq!(prediction.predicted_score, PredictedScore { home: 2, away: 1 });
        assert_eq!(prediction.confidence_level, 72.0);
        assert_eq!(prediction.key_factors.len(), 2);
        assert_eq!(llm_state.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_match_short_circuits_before_other_calls() {
        let sports_state = Arc::new(SportsBackend {
            fixtures_empty: true,
            ..Default::default()
        });
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: detailed_content(),
        });
        let pipeline = pipeline_against(sports_state.clone(), llm_state.clone()).await;

        let err = pipeline
            .predict_match("404", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(sports_state.h2h_calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm_state.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unparseable_model_output_is_a_parse_error() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: "Désolé, je ne peux pas répondre.".to_string(),
        });
        let pipeline = pipeline_against(sports_state, llm_state).await;

        let err = pipeline
            .predict_match("86392", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn cached_prediction_skips_every_upstream_call() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: detailed_content(),
        });
        let pipeline = pipeline_against(sports_state.clone(), llm_state.clone()).await;
        let cancel = CancellationToken::new();

        let first = pipeline.predict_match("86392", &cancel).await.unwrap();
        let second = pipeline.predict_match("86392", &cancel).await.unwrap();

        assert_eq!(first.match_id, second.match_id);
        assert_eq!(sports_state.fixture_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm_state.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_upstream_work() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: detailed_content(),
        });
        let pipeline = pipeline_against(sports_state.clone(), llm_state).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.predict_match("86392", &cancel).await.unwrap_err();

        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(sports_state.fixture_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn quick_prediction_parses_the_fast_shape() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: json!({
                "prediction": "Victoire domicile",
                "confidence": 68,
                "score_prediction": "2-1",
                "recommended_bet": "1X2",
                "reasoning": "Forme et avantage du terrain.",
            })
            .to_string(),
        });
        let pipeline = pipeline_against(sports_state, llm_state).await;

        let prediction = pipeline
            .quick_predict("86392", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(prediction.prediction, "Victoire domicile");
        assert_eq!(prediction.confidence, 68.0);
        assert_eq!(prediction.recommended_bet.as_deref(), Some("1X2"));
    }

    #[tokio::test]
    async fn league_batch_only_predicts_upcoming_matches() {
        let sports_state = Arc::new(SportsBackend::default());
        let llm_state = Arc::new(LlmBackend {
            calls: AtomicUsize::new(0),
            content: detailed_content(),
        });
        let pipeline = pipeline_against(sports_state, llm_state.clone()).await;

        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
        let predictions = pipeline
            .predict_league("177", from, to, &CancellationToken::new())
            .await
            .unwrap();

        // 86393 is already finished and must be skipped
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].match_id, "86392");
        assert_eq!(llm_state.calls.load(Ordering::SeqCst), 1);
    }
}
