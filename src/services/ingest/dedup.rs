// src/services/ingest/dedup.rs

use std::collections::HashSet;

use crate::models::mcq::{McqKey, NewMcq};

/// Keeps the first entry for every (course, question) key; later repeats in
/// the same upload are dropped. Returns the survivors and the drop count.
pub fn dedup_within_batch(entries: Vec<NewMcq>) -> (Vec<NewMcq>, usize) {
    let total = entries.len();
    let mut seen: HashSet<McqKey> = HashSet::with_capacity(total);

    let unique: Vec<NewMcq> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.key()))
        .collect();

    let dropped = total - unique.len();
    (unique, dropped)
}

/// Drops entries whose key already exists in the store.
pub fn drop_existing(entries: Vec<NewMcq>, existing: &HashSet<McqKey>) -> (Vec<NewMcq>, usize) {
    let total = entries.len();

    let fresh: Vec<NewMcq> = entries
        .into_iter()
        .filter(|entry| !existing.contains(&entry.key()))
        .collect();

    let dropped = total - fresh.len();
    (fresh, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(course_id: i64, question: &str) -> NewMcq {
        NewMcq {
            course_id,
            question: question.to_string(),
            option1: "a".to_string(),
            option2: "b".to_string(),
            option3: "c".to_string(),
            option4: "d".to_string(),
            correct_option: "1".to_string(),
        }
    }

    #[test]
    fn keeps_first_occurrence() {
        let mut second = entry(1, "Q");
        second.correct_option = "4".to_string();
        let batch = vec![entry(1, "Q"), entry(1, "R"), second];

        let (unique, dropped) = dedup_within_batch(batch);

        assert_eq!(dropped, 1);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].correct_option, "1");
        assert_eq!(unique[1].question, "R");
    }

    #[test]
    fn key_is_case_and_whitespace_sensitive() {
        let batch = vec![entry(1, "Q"), entry(1, "q"), entry(1, "Q "), entry(2, "Q")];

        let (unique, dropped) = dedup_within_batch(batch);

        assert_eq!(dropped, 0);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn batch_dedup_is_a_fixed_point() {
        let batch = vec![entry(1, "A"), entry(1, "B"), entry(1, "A"), entry(1, "C"), entry(1, "B")];

        let (once, _) = dedup_within_batch(batch);
        let (twice, dropped) = dedup_within_batch(once.clone());

        assert_eq!(once, twice);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn drops_entries_already_stored() {
        let existing: HashSet<McqKey> = [(1, "A".to_string()), (2, "B".to_string())].into();
        let batch = vec![entry(1, "A"), entry(1, "B"), entry(2, "B")];

        let (fresh, dropped) = drop_existing(batch, &existing);

        assert_eq!(dropped, 2);
        assert_eq!(fresh, vec![entry(1, "B")]);
    }
}
