//! Schema-tolerant views over cached match documents.
//!
//! Missing or mistyped fields are never errors; accessors return `None`,
//! a zero default, or skip the element.

use serde_json::Value as JsonValue;

/// A raw match document.
#[derive(Debug, Clone, Copy)]
pub struct MatchView<'a>(&'a JsonValue);

impl<'a> MatchView<'a> {
    pub fn new(document: &'a JsonValue) -> Self {
        Self(document)
    }

    /// The participant entry for `puuid` under `info.participants`.
    pub fn participant(&self, puuid: &str) -> Option<ParticipantView<'a>> {
        self.0
            .get("info")?
            .get("participants")?
            .as_array()?
            .iter()
            .find(|p| p.get("puuid").and_then(JsonValue::as_str) == Some(puuid))
            .map(ParticipantView)
    }
}

/// One participant inside a match document.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantView<'a>(&'a JsonValue);

impl<'a> ParticipantView<'a> {
    pub fn placement(&self) -> Option<i64> {
        self.0.get("placement").and_then(JsonValue::as_i64)
    }

    pub fn level(&self) -> i64 {
        self.int_or_zero("level")
    }

    pub fn gold_left(&self) -> i64 {
        self.int_or_zero("gold_left")
    }

    /// Names of traits counted as active: a current tier above zero or at
    /// least one contributing unit.
    pub fn active_traits(&self) -> impl Iterator<Item = &'a str> {
        self.array("traits").filter_map(|t| {
            let name = non_blank(t.get("name"))?;
            let tier = t.get("tier_current").and_then(JsonValue::as_i64).unwrap_or(0);
            let units = t.get("num_units").and_then(JsonValue::as_i64).unwrap_or(0);
            (tier > 0 || units > 0).then_some(name)
        })
    }

    pub fn augments(&self) -> impl Iterator<Item = &'a str> {
        self.array("augments").filter_map(JsonValue::as_str)
    }

    pub fn units(&self) -> impl Iterator<Item = &'a str> {
        self.array("units")
            .filter_map(|u| non_blank(u.get("character_id")))
    }

    fn int_or_zero(&self, field: &str) -> i64 {
        self.0.get(field).and_then(JsonValue::as_i64).unwrap_or(0)
    }

    fn array(&self, field: &str) -> impl Iterator<Item = &'a JsonValue> {
        self.0
            .get(field)
            .and_then(JsonValue::as_array)
            .map(|items| items.iter())
            .into_iter()
            .flatten()
    }
}

fn non_blank(value: Option<&JsonValue>) -> Option<&str> {
    value
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> JsonValue {
        json!({
            "info": {
                "participants": [
                    { "puuid": "other", "placement": 1 },
                    {
                        "puuid": "me",
                        "placement": 3,
                        "level": 8,
                        "gold_left": 12,
                        "traits": [
                            { "name": "Set10_Punk", "tier_current": 2, "num_units": 4 },
                            { "name": "Set10_Idle", "tier_current": 0, "num_units": 0 },
                            { "name": "Set10_Units", "tier_current": 0, "num_units": 1 },
                            { "name": "", "tier_current": 3 }
                        ],
                        "augments": ["TFT_Augment_A", 7, "TFT_Augment_B"],
                        "units": [
                            { "character_id": "TFT10_Ahri" },
                            { "character_id": " " },
                            { "rarity": 2 }
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn finds_participant_by_puuid() {
        let doc = document();
        let me = MatchView::new(&doc).participant("me").unwrap();
        assert_eq!(me.placement(), Some(3));
        assert_eq!(me.level(), 8);
        assert_eq!(me.gold_left(), 12);
        assert!(MatchView::new(&doc).participant("nobody").is_none());
    }

    #[test]
    fn inactive_and_unnamed_traits_are_skipped() {
        let doc = document();
        let me = MatchView::new(&doc).participant("me").unwrap();
        let traits: Vec<_> = me.active_traits().collect();
        assert_eq!(traits, vec!["Set10_Punk", "Set10_Units"]);
    }

    #[test]
    fn non_string_augments_and_blank_units_are_skipped() {
        let doc = document();
        let me = MatchView::new(&doc).participant("me").unwrap();
        assert_eq!(
            me.augments().collect::<Vec<_>>(),
            vec!["TFT_Augment_A", "TFT_Augment_B"]
        );
        assert_eq!(me.units().collect::<Vec<_>>(), vec!["TFT10_Ahri"]);
    }

    #[test]
    fn missing_sections_yield_nothing() {
        let doc = json!({ "info": { "participants": [ { "puuid": "me" } ] } });
        let me = MatchView::new(&doc).participant("me").unwrap();
        assert_eq!(me.placement(), None);
        assert_eq!(me.level(), 0);
        assert_eq!(me.active_traits().count(), 0);
        assert_eq!(me.augments().count(), 0);

        let malformed = json!({ "info": { "participants": "nope" } });
        assert!(MatchView::new(&malformed).participant("me").is_none());
    }
}
