//! Aggregation of participant rows into a year summary document.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::view::ParticipantView;
use crate::models::JobKey;

/// Entries kept per top-N ranking.
pub const TOP_N: usize = 10;

/// A ranked name with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RankedEntry {
    pub name: String,
    pub count: u32,
}

/// A notable game for the best/worst slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameHighlight {
    pub match_id: String,
    pub placement: i64,
    pub level: i64,
    pub gold_left: i64,
}

/// The persisted summary for one player and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct YearSummaryDocument {
    pub ready: bool,
    pub puuid: String,
    pub year: i32,
    pub games_played: u32,
    pub avg_placement: f64,
    pub top4_rate: f64,
    /// Keys "1" through "8"
    pub placements: BTreeMap<String, u32>,
    pub top_traits: Vec<RankedEntry>,
    pub top_augments: Vec<RankedEntry>,
    pub top_units: Vec<RankedEntry>,
    pub best_game: Option<GameHighlight>,
    pub worst_game: Option<GameHighlight>,
}

/// Occurrence counter that ranks ties by first appearance.
#[derive(Debug, Default)]
struct Tally {
    positions: HashMap<String, usize>,
    entries: Vec<RankedEntry>,
}

impl Tally {
    fn add(&mut self, name: &str) {
        match self.positions.get(name) {
            Some(&index) => self.entries[index].count += 1,
            None => {
                self.positions.insert(name.to_string(), self.entries.len());
                self.entries.push(RankedEntry {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn top(mut self, n: usize) -> Vec<RankedEntry> {
        // stable sort keeps first-seen order among equal counts
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        self.entries.truncate(n);
        self.entries
    }
}

/// Folds participant rows into a [`YearSummaryDocument`].
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    games_played: u32,
    placement_sum: i64,
    top4: u32,
    histogram: [u32; 8],
    traits: Tally,
    augments: Tally,
    units: Tally,
    best: Option<GameHighlight>,
    worst: Option<GameHighlight>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one game. Returns `false` when the placement is missing or
    /// outside 1..=8 and the game was skipped.
    pub fn observe(&mut self, match_id: &str, me: ParticipantView<'_>) -> bool {
        let Some(placement) = me.placement().filter(|p| (1..=8).contains(p)) else {
            return false;
        };

        self.games_played += 1;
        self.placement_sum += placement;
        self.histogram[(placement - 1) as usize] += 1;
        if placement <= 4 {
            self.top4 += 1;
        }

        let game = GameHighlight {
            match_id: match_id.to_string(),
            placement,
            level: me.level(),
            gold_left: me.gold_left(),
        };
        if self.best.as_ref().is_none_or(|best| is_better(&game, best)) {
            self.best = Some(game.clone());
        }
        if self.worst.as_ref().is_none_or(|worst| is_worse(&game, worst)) {
            self.worst = Some(game);
        }

        me.active_traits().for_each(|name| self.traits.add(name));
        me.augments().for_each(|name| self.augments.add(name));
        me.units().for_each(|name| self.units.add(name));
        true
    }

    pub fn finish(self, key: &JobKey) -> YearSummaryDocument {
        let (avg_placement, top4_rate) = if self.games_played == 0 {
            (0.0, 0.0)
        } else {
            let games = f64::from(self.games_played);
            (
                round2(self.placement_sum as f64 / games),
                round2(f64::from(self.top4) / games),
            )
        };

        let placements = self
            .histogram
            .iter()
            .enumerate()
            .map(|(index, count)| ((index + 1).to_string(), *count))
            .collect();

        YearSummaryDocument {
            ready: true,
            puuid: key.puuid.clone(),
            year: key.year,
            games_played: self.games_played,
            avg_placement,
            top4_rate,
            placements,
            top_traits: self.traits.top(TOP_N),
            top_augments: self.augments.top(TOP_N),
            top_units: self.units.top(TOP_N),
            best_game: self.best,
            worst_game: self.worst,
        }
    }
}

/// Strictly better: lower placement, then higher level, then more gold.
fn is_better(candidate: &GameHighlight, current: &GameHighlight) -> bool {
    (current.placement, -current.level, -current.gold_left)
        > (candidate.placement, -candidate.level, -candidate.gold_left)
}

/// Strictly worse: higher placement, then lower level, then less gold.
fn is_worse(candidate: &GameHighlight, current: &GameHighlight) -> bool {
    (candidate.placement, -candidate.level, -candidate.gold_left)
        > (current.placement, -current.level, -current.gold_left)
}

/// Round half up to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::view::MatchView;
    use serde_json::{Value, json};

    fn game(placement: i64, level: i64, gold_left: i64) -> Value {
        json!({
            "info": { "participants": [ {
                "puuid": "me",
                "placement": placement,
                "level": level,
                "gold_left": gold_left
            } ] }
        })
    }

    fn build(games: &[(&str, Value)]) -> YearSummaryDocument {
        let mut builder = SummaryBuilder::new();
        for (id, doc) in games {
            if let Some(me) = MatchView::new(doc).participant("me") {
                builder.observe(id, me);
            }
        }
        builder.finish(&JobKey::new("me", 2024))
    }

    #[test]
    fn empty_year_has_zero_rates() {
        let summary = build(&[]);
        assert_eq!(summary.games_played, 0);
        assert_eq!(summary.avg_placement, 0.0);
        assert_eq!(summary.top4_rate, 0.0);
        assert!(summary.best_game.is_none());
        assert!(summary.worst_game.is_none());
        assert_eq!(summary.placements.len(), 8);
        assert!(summary.placements.values().all(|c| *c == 0));
    }

    #[test]
    fn averages_round_half_up() {
        let summary = build(&[
            ("m1", game(1, 8, 0)),
            ("m2", game(2, 8, 0)),
            ("m3", game(2, 8, 0)),
        ]);
        // 5 / 3 = 1.666..
        assert_eq!(summary.avg_placement, 1.67);
        assert_eq!(summary.top4_rate, 1.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }

    #[test]
    fn out_of_range_placements_are_skipped() {
        let summary = build(&[
            ("m1", game(0, 8, 0)),
            ("m2", game(9, 8, 0)),
            ("m3", game(5, 8, 0)),
        ]);
        assert_eq!(summary.games_played, 1);
        assert_eq!(summary.top4_rate, 0.0);
    }

    #[test]
    fn histogram_sums_to_games_played() {
        let summary = build(&[
            ("m1", game(1, 8, 0)),
            ("m2", game(8, 8, 0)),
            ("m3", game(8, 8, 0)),
            ("m4", game(4, 8, 0)),
        ]);
        let total: u32 = summary.placements.values().sum();
        assert_eq!(total, summary.games_played);
        assert_eq!(summary.placements["8"], 2);
        assert_eq!(summary.top4_rate, 0.5);
    }

    #[test]
    fn equal_placement_prefers_level_then_gold() {
        let summary = build(&[
            ("low", game(3, 7, 50)),
            ("high", game(3, 9, 0)),
            ("rich", game(3, 9, 20)),
        ]);
        assert_eq!(summary.best_game.unwrap().match_id, "rich");
        assert_eq!(summary.worst_game.unwrap().match_id, "low");
    }

    #[test]
    fn worst_prefers_less_gold_on_equal_level() {
        let summary = build(&[("a", game(6, 7, 10)), ("b", game(6, 7, 3))]);
        assert_eq!(summary.worst_game.unwrap().match_id, "b");
    }

    #[test]
    fn full_ties_keep_the_earlier_game() {
        let summary = build(&[("first", game(2, 8, 5)), ("second", game(2, 8, 5))]);
        assert_eq!(summary.best_game.unwrap().match_id, "first");
        assert_eq!(summary.worst_game.unwrap().match_id, "first");
    }

    #[test]
    fn ranking_ties_follow_first_seen_order() {
        let doc = |augments: Value| {
            json!({ "info": { "participants": [ {
                "puuid": "me", "placement": 4, "augments": augments
            } ] } })
        };
        let summary = build(&[
            ("m1", doc(json!(["B", "A"]))),
            ("m2", doc(json!(["C", "A"]))),
            ("m3", doc(json!(["C"]))),
        ]);
        let names: Vec<_> = summary
            .top_augments
            .iter()
            .map(|e| (e.name.as_str(), e.count))
            .collect();
        assert_eq!(names, vec![("A", 2), ("C", 2), ("B", 1)]);
    }

    #[test]
    fn rankings_are_capped() {
        let units: Vec<Value> = (0..15)
            .map(|i| json!({ "character_id": format!("unit{i}") }))
            .collect();
        let doc = json!({ "info": { "participants": [ {
            "puuid": "me", "placement": 1, "units": units
        } ] } });
        let summary = build(&[("m1", doc)]);
        assert_eq!(summary.top_units.len(), TOP_N);
        assert_eq!(summary.top_units[0].name, "unit0");
    }

    #[test]
    fn document_uses_camel_case_keys() {
        let summary = build(&[("m1", game(1, 9, 3))]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["gamesPlayed"], 1);
        assert_eq!(value["top4Rate"], 1.0);
        assert_eq!(value["bestGame"]["matchId"], "m1");
        assert_eq!(value["bestGame"]["goldLeft"], 3);
        assert!(value["placements"].get("1").is_some());
    }
}
