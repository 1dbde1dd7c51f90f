use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Country {
    pub country_id: String,
    pub country_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct League {
    pub league_id: String,
    pub league_name: String,
    pub country_id: String,
    pub country_name: String,
}

/// One event record. The upstream sends every field as a string; kept as-is
/// and interpreted where needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub match_id: String,
    pub league_id: String,
    pub league_name: String,
    pub match_date: String,
    pub match_status: String,
    pub match_hometeam_id: String,
    pub match_hometeam_name: String,
    pub match_hometeam_score: String,
    pub match_awayteam_id: String,
    pub match_awayteam_name: String,
    pub match_awayteam_score: String,
}

impl Fixture {
    /// "NS" or an empty status means the match has not started.
    pub fn is_upcoming(&self) -> bool {
        self.match_status.is_empty() || self.match_status == "NS"
    }

    pub fn final_result(&self) -> String {
        format!(
            "{} - {}",
            self.match_hometeam_score, self.match_awayteam_score
        )
    }

    /// Result line from one team's point of view, for form summaries.
    pub fn form_line(&self, team_id: &str) -> String {
        let at_home = self.match_hometeam_id == team_id;
        let (own, other, opponent) = if at_home {
            (
                &self.match_hometeam_score,
                &self.match_awayteam_score,
                &self.match_awayteam_name,
            )
        } else {
            (
                &self.match_awayteam_score,
                &self.match_hometeam_score,
                &self.match_hometeam_name,
            )
        };
        let venue = if at_home { "Domicile" } else { "Extérieur" };
        format!("{venue}: {own}-{other} vs {opponent}")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadToHead {
    #[serde(rename = "H2H", default)]
    pub h2h: Vec<Fixture>,
    #[serde(rename = "firstTeam_lastResults", default)]
    pub first_team_last_results: Vec<Fixture>,
    #[serde(rename = "secondTeam_lastResults", default)]
    pub second_team_last_results: Vec<Fixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StandingRow {
    pub team_id: String,
    pub team_name: String,
    pub league_name: String,
    pub overall_league_position: String,
    #[serde(rename = "overall_league_PTS")]
    pub overall_league_pts: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Team {
    pub team_key: String,
    pub team_name: String,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Player {
    pub player_name: String,
    pub player_type: String,
    pub player_goals: String,
}

impl Player {
    pub fn goals(&self) -> u32 {
        self.player_goals.trim().parse().unwrap_or(0)
    }
}

/// Event lookup parameters; exactly one id kind is usually set.
#[derive(Debug, Clone, Default)]
pub struct FixtureQuery {
    pub match_id: Option<String>,
    pub team_id: Option<String>,
    pub league_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FixtureQuery {
    pub fn by_match(match_id: impl Into<String>) -> Self {
        Self {
            match_id: Some(match_id.into()),
            ..Default::default()
        }
    }

    pub fn for_team_since(team_id: impl Into<String>, from: NaiveDate) -> Self {
        Self {
            team_id: Some(team_id.into()),
            from: Some(from),
            ..Default::default()
        }
    }

    pub fn for_league(league_id: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            league_id: Some(league_id.into()),
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = &self.match_id {
            params.push(("match_id", id.clone()));
        }
        if let Some(id) = &self.team_id {
            params.push(("team_id", id.clone()));
        }
        if let Some(id) = &self.league_id {
            params.push(("league_id", id.clone()));
        }
        if let Some(from) = self.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        params
    }
}
