use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::settings::FootballSettings;
use crate::error::{ApiError, Result};
use crate::http::client_with_timeout;

use super::types::{Country, Fixture, FixtureQuery, HeadToHead, League, Player, StandingRow, Team};

/// Read-only client for the football-data provider. Authentication is an
/// API key in the query string; failures come back inside a 200 body as an
/// `{error, message}` envelope.
pub struct FootballApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FootballApi {
    pub fn new(settings: &FootballSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: client_with_timeout(timeout)?,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.call("get_countries", Vec::new()).await
    }

    pub async fn leagues(&self, country_id: &str) -> Result<Vec<League>> {
        self.call("get_leagues", vec![("country_id", country_id.to_string())])
            .await
    }

    pub async fn fixtures(&self, query: &FixtureQuery) -> Result<Vec<Fixture>> {
        self.call("get_events", query.params()).await
    }

    pub async fn h2h(&self, first_team: &str, second_team: &str) -> Result<HeadToHead> {
        self.call(
            "get_H2H",
            vec![
                ("firstTeam", first_team.to_string()),
                ("secondTeam", second_team.to_string()),
            ],
        )
        .await
    }

    pub async fn standings(&self, league_id: &str) -> Result<Vec<StandingRow>> {
        self.call("get_standings", vec![("league_id", league_id.to_string())])
            .await
    }

    pub async fn teams(&self, team_id: &str) -> Result<Vec<Team>> {
        self.call("get_teams", vec![("team_id", team_id.to_string())])
            .await
    }

    pub async fn players(&self, team_id: &str) -> Result<Vec<Player>> {
        self.call("get_players", vec![("team_id", team_id.to_string())])
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T> {
        let mut query: Vec<(&'static str, String)> = vec![
            ("action", action.to_string()),
            ("APIkey", self.api_key.clone()),
        ];
        query.extend(params);

        let response = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: "Le fournisseur de données est indisponible.".to_string(),
            });
        }

        let value: Value = response.json().await?;
        if let Some(object) = value.as_object()
            && object.contains_key("error")
        {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Erreur du fournisseur de données.")
                .to_string();
            tracing::warn!(action, %message, "football api returned an error envelope");
            return Err(ApiError::Upstream(message));
        }

        serde_json::from_value(value).map_err(ApiError::from)
    }
}
