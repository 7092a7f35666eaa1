//! Response types of the ScoreSaber API.
//!
//! Only the fields the CLI displays are required, everything else is optional so that
//! additions to the API do not break decoding.

use serde::{Deserialize, Serialize};

/// Pagination info attached to collection responses.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub total: u64,
    pub page: u64,
    pub items_per_page: u64,
}

impl Metadata {
    pub fn pages(&self) -> u64 {
        if self.items_per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.items_per_page)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub description: String,
    pub image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStats {
    pub total_score: u64,
    pub total_ranked_score: u64,
    pub average_ranked_accuracy: f64,
    pub total_play_count: u64,
    pub ranked_play_count: u64,
    pub replays_watched: u64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub country: String,
    pub pp: f64,
    pub rank: u64,
    pub country_rank: u64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub badges: Option<Vec<Badge>>,
    #[serde(default)]
    pub score_stats: Option<ScoreStats>,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub first_seen: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlayerCollection {
    pub players: Vec<Player>,
    pub metadata: Metadata,
}

/// The player of a leaderboard score.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPlayer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: u64,
    #[serde(default)]
    pub leaderboard_player_info: Option<LeaderboardPlayer>,
    pub rank: u64,
    pub base_score: u64,
    pub modified_score: u64,
    pub pp: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub modifiers: String,
    #[serde(default)]
    pub missed_notes: u64,
    #[serde(default)]
    pub bad_cuts: u64,
    #[serde(default)]
    pub full_combo: bool,
    #[serde(default)]
    pub time_set: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardInfo {
    pub id: u64,
    pub song_hash: String,
    pub song_name: String,
    #[serde(default)]
    pub song_sub_name: String,
    pub song_author_name: String,
    pub level_author_name: String,
    #[serde(default)]
    pub difficulty_raw: String,
    pub max_score: u64,
    #[serde(default)]
    pub ranked: bool,
    #[serde(default)]
    pub qualified: bool,
    #[serde(default)]
    pub stars: f64,
    #[serde(default)]
    pub plays: u64,
    #[serde(default)]
    pub daily_plays: u64,
}

impl LeaderboardInfo {
    /// The accuracy of `score` on this leaderboard, in percent.
    pub fn accuracy(&self, score: &Score) -> Option<f64> {
        (self.max_score > 0).then(|| score.base_score as f64 / self.max_score as f64 * 100.0)
    }

    /// The difficulty name, e.g. `ExpertPlus` for `_ExpertPlus_SoloStandard`.
    pub fn difficulty_name(&self) -> &str {
        self.difficulty_raw
            .trim_start_matches('_')
            .split('_')
            .next()
            .unwrap_or_default()
    }
}

/// A page of scores on one leaderboard.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScoreCollection {
    pub scores: Vec<Score>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlayerScore {
    pub score: Score,
    pub leaderboard: LeaderboardInfo,
}

/// A page of scores of one player.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScoreCollection {
    pub player_scores: Vec<PlayerScore>,
    pub metadata: Metadata,
}
