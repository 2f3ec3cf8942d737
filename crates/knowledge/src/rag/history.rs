//! Bounded conversation history.

use ragchat_prompt::Turn;

/// Ordered question/answer turns, oldest first.
///
/// Turns are only ever added and evicted in asker/responder pairs, so the
/// length is always even and never exceeds the configured bound.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    /// History keeping at most `max_turns` turns, rounded down to whole
    /// pairs (minimum one pair).
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: (max_turns / 2).max(1) * 2,
        }
    }

    /// Append one exchange, evicting the oldest pairs past the bound.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn::asker(question));
        self.turns.push(Turn::responder(answer));

        while self.turns.len() > self.max_turns {
            self.turns.drain(..2);
        }
    }

    /// The last `n` turns, or all of them if there are fewer.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_prompt::Role;

    #[test]
    fn test_never_exceeds_bound_and_stays_even() {
        let mut history = ConversationHistory::new(10);
        for i in 0..7 {
            history.push_exchange(format!("q{}", i), format!("a{}", i));
            assert!(history.len() <= 10);
            assert_eq!(history.len() % 2, 0);
        }

        // Pairs 0 and 1 were evicted, oldest first
        assert_eq!(history.len(), 10);
        assert_eq!(history.turns()[0].content, "q2");
        assert_eq!(history.turns()[0].role, Role::Asker);
        assert_eq!(history.turns()[9].content, "a6");
    }

    #[test]
    fn test_recent_returns_tail() {
        let mut history = ConversationHistory::new(10);
        history.push_exchange("q0", "a0");
        history.push_exchange("q1", "a1");
        history.push_exchange("q2", "a2");

        let recent: Vec<&str> = history.recent(4).iter().map(|t| t.content.as_str()).collect();
        assert_eq!(recent, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(history.recent(100).len(), 6);
    }

    #[test]
    fn test_odd_bound_rounds_down_to_pairs() {
        assert_eq!(ConversationHistory::new(5).max_turns(), 4);
        assert_eq!(ConversationHistory::new(0).max_turns(), 2);
    }

    #[test]
    fn test_clear() {
        let mut history = ConversationHistory::new(4);
        history.push_exchange("q", "a");
        history.clear();
        assert!(history.is_empty());
    }
}
