use crate::providers::football::{Fixture, Player, StandingRow};

use super::{FORM_MATCHES, MatchContext};

pub const ANALYST_PERSONA: &str = "Tu es un analyste footballistique expert avec 20 ans \
d'expérience. Tes prédictions sont utilisées par des bookmakers professionnels.";

fn form_block(form: &[Fixture], team_id: &str) -> String {
    if form.is_empty() {
        return "Aucun match récent".to_string();
    }
    form.iter()
        .take(FORM_MATCHES)
        .map(|fixture| fixture.form_line(team_id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn h2h_block(h2h: &[Fixture]) -> String {
    if h2h.is_empty() {
        return "Pas de confrontations directes récentes".to_string();
    }
    h2h.iter()
        .map(|fixture| {
            format!(
                "{} {} {}",
                fixture.match_hometeam_name,
                fixture.final_result(),
                fixture.match_awayteam_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn scorers_block(scorers: &[Player]) -> String {
    if scorers.is_empty() {
        return "Inconnus".to_string();
    }
    scorers
        .iter()
        .map(|player| format!("{} ({} buts)", player.player_name, player.goals()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn standing_line(standings: &[StandingRow], team_id: &str) -> String {
    standings
        .iter()
        .find(|row| row.team_id == team_id)
        .map(|row| {
            format!(
                "{}e ({} pts)",
                row.overall_league_position, row.overall_league_pts
            )
        })
        .unwrap_or_else(|| "non classé".to_string())
}

/// Prompt for the detailed path; the answer feeds [`super::MatchPrediction`].
pub fn detailed_prompt(context: &MatchContext) -> String {
    let fixture = &context.fixture;
    format!(
        "Analyse le match suivant et fais une prédiction détaillée:\n\
        \n\
        Match: {home} vs {away}\n\
        Date: {date}\n\
        Ligue: {league}\n\
        \n\
        Équipe à domicile ({home}):\n\
        - Classement: {home_standing}\n\
        - Derniers matchs:\n{home_form}\n\
        - Meilleurs buteurs: {home_scorers}\n\
        \n\
        Équipe à l'extérieur ({away}):\n\
        - Classement: {away_standing}\n\
        - Derniers matchs:\n{away_form}\n\
        - Meilleurs buteurs: {away_scorers}\n\
        \n\
        Confrontations directes récentes:\n{h2h}\n\
        \n\
        Réponds au format JSON avec les champs suivants:\n\
        {{\n\
          \"predicted_winner\": \"nom_équipe ou null pour match nul\",\n\
          \"win_probabilities\": {{ \"home\": pourcentage, \"draw\": pourcentage, \"away\": pourcentage }},\n\
          \"predicted_score\": {{ \"home\": nombre_buts, \"away\": nombre_buts }},\n\
          \"confidence_level\": pourcentage (0-100),\n\
          \"key_factors\": [\"facteur1\", \"facteur2\", \"facteur3\"],\n\
          \"detailed_analysis\": \"analyse détaillée en 3-5 phrases\"\n\
        }}",
        home = fixture.match_hometeam_name,
        away = fixture.match_awayteam_name,
        date = fixture.match_date,
        league = fixture.league_name,
        home_standing = standing_line(&context.standings, &fixture.match_hometeam_id),
        away_standing = standing_line(&context.standings, &fixture.match_awayteam_id),
        home_form = form_block(&context.home_form, &fixture.match_hometeam_id),
        away_form = form_block(&context.away_form, &fixture.match_awayteam_id),
        home_scorers = scorers_block(&context.home_scorers),
        away_scorers = scorers_block(&context.away_scorers),
        h2h = h2h_block(&context.h2h.h2h),
    )
}

/// Prompt for the fast path; the answer feeds [`super::QuickPrediction`].
pub fn quick_prompt(context: &MatchContext) -> String {
    let fixture = &context.fixture;
    let league = context
        .standings
        .first()
        .map(|row| row.league_name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("N/A");
    format!(
        "En tant qu'expert en football avec accès à:\n\
        1. Dernières rencontres directes: {h2h_count} matches\n\
        2. Classement actuel: {league}\n\
        3. Forme des équipes (5 derniers matches):\n\
           - Domicile ({home}):\n{home_form}\n\
           - Extérieur ({away}):\n{away_form}\n\
        4. Match à analyser: {home} vs {away}, {league_name}\n\
        \n\
        Fournis une prédiction au format JSON avec:\n\
        - prediction (résultat probable: \"Victoire domicile\", \"Match nul\" ou \"Victoire extérieur\")\n\
        - confidence (0-100)\n\
        - score_prediction plausible\n\
        - recommended_bet (1X2/GG/Over 2.5/etc)\n\
        - reasoning (en français)",
        h2h_count = context.h2h.h2h.len(),
        league = league,
        home = fixture.match_hometeam_name,
        away = fixture.match_awayteam_name,
        home_form = form_block(&context.home_form, &fixture.match_hometeam_id),
        away_form = form_block(&context.away_form, &fixture.match_awayteam_id),
        league_name = fixture.league_name,
    )
}

/// Slices the first balanced-looking JSON object out of the model output.
/// Models wrap their JSON in prose often enough that this stays worthwhile
/// even with JSON mode requested.
pub fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::football::HeadToHead;

    fn context() -> MatchContext {
        let fixture = Fixture {
            match_id: "86392".into(),
            league_id: "177".into(),
            league_name: "Ligue 1".into(),
            match_date: "2026-08-09".into(),
            match_hometeam_id: "72".into(),
            match_hometeam_name: "AS Douanes".into(),
            match_awayteam_id: "96".into(),
            match_awayteam_name: "Étoile Filante".into(),
            ..Default::default()
        };
        let played = Fixture {
            match_hometeam_id: "72".into(),
            match_hometeam_name: "AS Douanes".into(),
            match_hometeam_score: "2".into(),
            match_awayteam_id: "96".into(),
            match_awayteam_name: "Étoile Filante".into(),
            match_awayteam_score: "0".into(),
            ..Default::default()
        };
        MatchContext {
            fixture,
            h2h: HeadToHead {
                h2h: vec![played.clone()],
                ..Default::default()
            },
            standings: vec![StandingRow {
                team_id: "72".into(),
                team_name: "AS Douanes".into(),
                league_name: "Ligue 1".into(),
                overall_league_position: "1".into(),
                overall_league_pts: "54".into(),
            }],
            home_form: vec![played.clone()],
            away_form: vec![played],
            home_scorers: vec![],
            away_scorers: vec![],
        }
    }

    #[test]
    fn detailed_prompt_embeds_the_match_facts() {
        let prompt = detailed_prompt(&context());
        assert!(prompt.contains("AS Douanes vs Étoile Filante"));
        assert!(prompt.contains("Ligue 1"));
        assert!(prompt.contains("Domicile: 2-0 vs Étoile Filante"));
        assert!(prompt.contains("Extérieur: 0-2 vs AS Douanes"));
        assert!(prompt.contains("\"predicted_winner\""));
        assert!(prompt.contains("1e (54 pts)"));
    }

    #[test]
    fn quick_prompt_counts_head_to_head() {
        let prompt = quick_prompt(&context());
        assert!(prompt.contains("Dernières rencontres directes: 1 matches"));
        assert!(prompt.contains("recommended_bet"));
    }

    #[test]
    fn extract_json_slices_the_outermost_object() {
        assert_eq!(
            extract_json("Voici ma réponse: {\"a\": {\"b\": 1}} merci"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json("aucun objet ici"), None);
        assert_eq!(extract_json("}{"), None);
    }
}
