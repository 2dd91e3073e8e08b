use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::category::CategoryName;
use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("malformed score record: {0}")]
    MalformedScore(String),
}

/// Running totals for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub correct: u32,
    pub possible: u32,
}

impl CategoryScore {
    #[must_use]
    pub fn new(correct: u32, possible: u32) -> Self {
        Self { correct, possible }
    }

    /// Rounded percentage, 0 when nothing has been attempted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u32 {
        if self.possible == 0 {
            return 0;
        }
        ((f64::from(self.correct) / f64::from(self.possible)) * 100.0).round() as u32
    }

    /// `[correct, possible, percent]`.
    #[must_use]
    pub fn triple(&self) -> [u32; 3] {
        [self.correct, self.possible, self.percent()]
    }
}

/// Per-user score keeping across categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    user_id: UserId,
    scores: BTreeMap<CategoryName, CategoryScore>,
}

impl Progress {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            scores: BTreeMap::new(),
        }
    }

    /// Rebuild from the persisted score string.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::MalformedScore` if the string is not a
    /// sequence of `name,correct,possible,` records.
    pub fn from_persisted(user_id: UserId, raw: &str) -> Result<Self, ProgressError> {
        Ok(Self {
            user_id,
            scores: decode_scores(raw)?,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn score_for(&self, category: &CategoryName) -> CategoryScore {
        self.scores.get(category).copied().unwrap_or_default()
    }

    /// Add to the totals of `category`.
    ///
    /// Both amounts are applied as absolute values, so a caller passing
    /// `-1` still counts one question.
    pub fn update_score(&mut self, category: &CategoryName, correct: i64, possible: i64) {
        let entry = self.scores.entry(category.clone()).or_default();
        entry.correct = entry.correct.saturating_add(abs_u32(correct));
        entry.possible = entry.possible.saturating_add(abs_u32(possible));
    }

    /// Scores for every known category, zeros for the ones never attempted.
    #[must_use]
    pub fn list_all_category_scores<'a>(
        &self,
        categories: impl IntoIterator<Item = &'a CategoryName>,
    ) -> BTreeMap<CategoryName, [u32; 3]> {
        let mut out: BTreeMap<CategoryName, [u32; 3]> = categories
            .into_iter()
            .map(|name| (name.clone(), self.score_for(name).triple()))
            .collect();
        for (name, score) in &self.scores {
            out.entry(name.clone()).or_insert_with(|| score.triple());
        }
        out
    }

    /// Persisted form: `name,correct,possible,` repeated.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_scores(&self.scores)
    }
}

fn abs_u32(value: i64) -> u32 {
    u32::try_from(value.unsigned_abs()).unwrap_or(u32::MAX)
}

fn encode_scores(scores: &BTreeMap<CategoryName, CategoryScore>) -> String {
    let mut out = String::new();
    for (name, score) in scores {
        out.push_str(&format!("{},{},{},", name, score.correct, score.possible));
    }
    out
}

fn decode_scores(raw: &str) -> Result<BTreeMap<CategoryName, CategoryScore>, ProgressError> {
    let parts: Vec<&str> = raw.split(',').filter(|p| !p.is_empty()).collect();
    if parts.len() % 3 != 0 {
        return Err(ProgressError::MalformedScore(raw.to_string()));
    }
    let mut scores = BTreeMap::new();
    for chunk in parts.chunks(3) {
        let malformed = || ProgressError::MalformedScore(raw.to_string());
        let name = CategoryName::normalize(chunk[0]).map_err(|_| malformed())?;
        let correct = chunk[1].parse::<u32>().map_err(|_| malformed())?;
        let possible = chunk[2].parse::<u32>().map_err(|_| malformed())?;
        scores.insert(name, CategoryScore::new(correct, possible));
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> CategoryName {
        CategoryName::normalize(raw).unwrap()
    }

    #[test]
    fn update_score_uses_absolute_values() {
        let mut progress = Progress::new(UserId::new(1));
        let cat = name("elderberries");

        progress.update_score(&cat, 3, 4);
        assert_eq!(progress.score_for(&cat).triple(), [3, 4, 75]);

        progress.update_score(&cat, 0, -1);
        assert_eq!(progress.score_for(&cat).triple(), [3, 5, 60]);

        progress.update_score(&cat, -1, 1);
        assert_eq!(progress.score_for(&cat).triple(), [4, 6, 67]);
    }

    #[test]
    fn all_categories_are_listed() {
        let mut progress = Progress::new(UserId::new(1));
        let apples = name("apples");
        let pears = name("pears");
        progress.update_score(&apples, 1, 2);

        let listed = progress.list_all_category_scores([&apples, &pears]);
        assert_eq!(listed.get(&apples), Some(&[1, 2, 50]));
        assert_eq!(listed.get(&pears), Some(&[0, 0, 0]));
    }

    #[test]
    fn score_string_round_trips() {
        let mut progress = Progress::new(UserId::new(9));
        progress.update_score(&name("apples"), 1, 2);
        progress.update_score(&name("pears"), 0, 3);
        let encoded = progress.encode();
        assert_eq!(encoded, "apples,1,2,pears,0,3,");

        let back = Progress::from_persisted(UserId::new(9), &encoded).unwrap();
        assert_eq!(back, progress);
        assert!(Progress::from_persisted(UserId::new(9), "").unwrap().encode().is_empty());
    }

    #[test]
    fn malformed_score_string_is_rejected() {
        let err = Progress::from_persisted(UserId::new(1), "apples,1,").unwrap_err();
        assert!(matches!(err, ProgressError::MalformedScore(_)));
        assert!(Progress::from_persisted(UserId::new(1), "apples,x,2,").is_err());
    }
}
