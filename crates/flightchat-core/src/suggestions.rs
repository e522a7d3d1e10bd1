//! Example questions offered on the welcome panel and by `flightchat suggest`

pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "Which airline has the most flights?",
    "What are the top 3 most frequent departure dates?",
    "What are the top 3 most frequent arrival dates?",
    "What is the distribution of flight classes?",
    "What are the descriptive statistics of fare?",
    "What are the most common extras purchased?",
    "What are the counts of different booking statuses?",
    "What are the most frequent gates?",
    "What are the most frequent terminals?",
    "What are the counts of flights with different numbers of layovers?",
    "What are the most frequent layover locations?",
    "What are the counts of different aircraft types?",
    "What is the distribution of reward program members vs. non-members?",
    "What is the average fare for each airline?",
    "What is the average duration of flights for each airline?",
];

/// Step through the suggestions, wrapping at either end.
///
/// `current` is the index last shown (`None` when nothing has been recalled yet).
pub fn cycle(current: Option<usize>, forward: bool) -> usize {
    let len = SUGGESTED_QUESTIONS.len();
    match (current, forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(i), true) => (i + 1) % len,
        (Some(i), false) => (i + len - 1) % len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps() {
        let last = SUGGESTED_QUESTIONS.len() - 1;
        assert_eq!(cycle(None, true), 0);
        assert_eq!(cycle(None, false), last);
        assert_eq!(cycle(Some(last), true), 0);
        assert_eq!(cycle(Some(0), false), last);
        assert_eq!(cycle(Some(3), true), 4);
    }
}
