use anyhow::Result;
use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Row, Table, cell, row};
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::models::{
    LeaderboardInfo, Metadata, Player, PlayerCollection, PlayerScoreCollection, ScoreCollection,
};

/// Types that can be printed as a table.
pub trait Render {
    fn render(&self) -> Table;
}

pub fn print<D: Serialize + Render>(data: &D, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(data)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Table => data.render().printstd(),
    }
    Ok(())
}

fn details() -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table
}

fn listing(titles: Row) -> Table {
    let mut table = details();
    table.set_titles(titles);
    table
}

fn pagination(table: &mut Table, metadata: &Metadata, columns: usize) {
    let footer = format!(
        "page {} of {} ({} total)",
        metadata.page,
        metadata.pages(),
        metadata.total
    );
    table.add_row(Row::new(vec![cell!(i->footer).with_hspan(columns)]));
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Render for Value {
    fn render(&self) -> Table {
        let mut table = details();
        match self {
            Value::Object(map) => {
                for (key, value) in map {
                    table.add_row(row![r->format!("{key}:"), compact(value)]);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    table.add_row(row![r->format!("{i}:"), compact(item)]);
                }
            }
            other => {
                table.add_row(row![compact(other)]);
            }
        }
        table
    }
}

impl Render for Player {
    fn render(&self) -> Table {
        let mut table = details();
        table.add_row(row![r->"Name:", b->self.name]);
        table.add_row(row![r->"Id:", self.id]);
        let rank = format!(
            "#{} ({} #{})",
            self.rank, self.country, self.country_rank
        );
        table.add_row(row![r->"Rank:", rank]);
        table.add_row(row![r->"PP:", format!("{:.2}", self.pp)]);
        if let Some(role) = &self.role {
            table.add_row(row![r->"Role:", role]);
        }
        if let Some(stats) = &self.score_stats {
            let accuracy = format!("{:.2}%", stats.average_ranked_accuracy);
            let plays = format!(
                "{} ({} ranked)",
                stats.total_play_count, stats.ranked_play_count
            );
            table.add_row(row![r->"Ranked Acc:", accuracy]);
            table.add_row(row![r->"Play Count:", plays]);
            table.add_row(row![r->"Total Score:", stats.total_score]);
            table.add_row(row![r->"Replays Watched:", stats.replays_watched]);
        }
        if let Some(badges) = self.badges.as_deref().filter(|badges| !badges.is_empty()) {
            let badges: Vec<_> = badges
                .iter()
                .map(|badge| badge.description.as_str())
                .collect();
            table.add_row(row![r->"Badges:", badges.join(", ")]);
        }
        if self.banned {
            table.add_row(row![r->"Status:", Fr->"banned"]);
        } else if self.inactive {
            table.add_row(row![r->"Status:", "inactive"]);
        }
        table
    }
}

impl Render for PlayerCollection {
    fn render(&self) -> Table {
        let mut table = listing(row![b => "Rank", "Name", "Country", "PP"]);
        for player in &self.players {
            table.add_row(row![
                r->format!("#{}", player.rank),
                player.name,
                player.country,
                r->format!("{:.2}", player.pp),
            ]);
        }
        pagination(&mut table, &self.metadata, 4);
        table
    }
}

impl Render for LeaderboardInfo {
    fn render(&self) -> Table {
        let mut table = details();
        let song = match self.song_sub_name.as_str() {
            "" => self.song_name.clone(),
            sub_name => format!("{} {}", self.song_name, sub_name),
        };
        table.add_row(row![r->"Song:", b->song]);
        table.add_row(row![r->"Artist:", self.song_author_name]);
        table.add_row(row![r->"Mapper:", self.level_author_name]);
        table.add_row(row![r->"Difficulty:", self.difficulty_name()]);
        let status = if self.ranked {
            format!("ranked ({:.2}★)", self.stars)
        } else if self.qualified {
            "qualified".to_owned()
        } else {
            "unranked".to_owned()
        };
        table.add_row(row![r->"Status:", status]);
        table.add_row(row![r->"Plays:", format!("{} ({} today)", self.plays, self.daily_plays)]);
        table.add_row(row![r->"Hash:", self.song_hash]);
        table
    }
}

impl Render for ScoreCollection {
    fn render(&self) -> Table {
        let mut table = listing(row![b => "Rank", "Player", "Score", "PP", "Mods"]);
        for score in &self.scores {
            let player = score
                .leaderboard_player_info
                .as_ref()
                .map_or("", |player| player.name.as_str());
            table.add_row(row![
                r->format!("#{}", score.rank),
                player,
                r->score.modified_score,
                r->format!("{:.2}", score.pp),
                score.modifiers,
            ]);
        }
        pagination(&mut table, &self.metadata, 5);
        table
    }
}

impl Render for PlayerScoreCollection {
    fn render(&self) -> Table {
        let mut table = listing(row![b => "Rank", "Song", "Difficulty", "Acc", "PP"]);
        for entry in &self.player_scores {
            let (score, leaderboard) = (&entry.score, &entry.leaderboard);
            let accuracy = leaderboard
                .accuracy(score)
                .map(|acc| format!("{acc:.2}%"))
                .unwrap_or_default();
            table.add_row(row![
                r->format!("#{}", score.rank),
                leaderboard.song_name,
                leaderboard.difficulty_name(),
                r->accuracy,
                r->format!("{:.2}", score.pp),
            ]);
        }
        pagination(&mut table, &self.metadata, 5);
        table
    }
}
