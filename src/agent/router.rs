//! Model router - picks a model tier per user message.
//!
//! Deterministic keyword + length heuristic with a daily quota on the
//! smart tier. Ambiguous messages default to the smart tier while quota
//! remains; this bias toward answer quality is intentional.

use chrono::NaiveDate;
use tracing::debug;

/// Model quality/cost class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheap, high-throughput model for simple imperative tasks.
    Fast,
    /// Expensive model for analytic/creative tasks, daily-capped.
    Smart,
}

/// Daily budget of smart-tier invocations.
///
/// Owned by the session and mutated only through routing decisions.
/// Resets when the calendar day changes; no persistence across restarts.
#[derive(Debug, Clone)]
pub struct ModelQuota {
    used_today: u32,
    day: NaiveDate,
    daily_cap: u32,
}

impl ModelQuota {
    pub fn new(daily_cap: u32) -> Self {
        Self {
            used_today: 0,
            day: chrono::Local::now().date_naive(),
            daily_cap,
        }
    }

    /// Reset the counter if the calendar day changed. Idempotent within
    /// a day; must run before every routing decision.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today != self.day {
            debug!("quota day rollover: {} -> {}", self.day, today);
            self.used_today = 0;
            self.day = today;
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.used_today < self.daily_cap
    }

    fn consume(&mut self) {
        self.used_today += 1;
    }

    pub fn used_today(&self) -> u32 {
        self.used_today
    }

    pub fn daily_cap(&self) -> u32 {
        self.daily_cap
    }
}

/// Imperative action words that mark a message as simple.
const SIMPLE_KEYWORDS: &[&str] = &[
    "open", "click", "type", "screenshot", "save", "read", "scroll", "wait", "close", "show",
    "list", "go to", "navigate",
];

/// Analytic/creative stems that mark a message as complex.
const COMPLEX_KEYWORDS: &[&str] = &[
    "analyz",
    "compare",
    "strategy",
    "plan",
    "summar",
    "report",
    "insight",
    "optim",
    "explain",
    "why",
    "create",
    "design",
    "budget",
    "calcul",
    "step by step",
    "excel",
    "chart",
    "html",
    "table",
];

/// Messages longer than this are always treated as complex.
const COMPLEX_LENGTH_THRESHOLD: usize = 200;

/// Select a model tier for a user message, consuming quota when the
/// smart tier is chosen.
pub fn select_model(user_text: &str, quota: &mut ModelQuota) -> ModelTier {
    quota.roll_over(chrono::Local::now().date_naive());
    classify(user_text, quota)
}

fn classify(user_text: &str, quota: &mut ModelQuota) -> ModelTier {
    let lower = user_text.to_lowercase();

    let is_simple = SIMPLE_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let mut is_complex = COMPLEX_KEYWORDS.iter().any(|kw| lower.contains(kw));

    if user_text.chars().count() > COMPLEX_LENGTH_THRESHOLD {
        is_complex = true;
    }

    let tier = if is_complex && quota.has_remaining() {
        quota.consume();
        ModelTier::Smart
    } else if is_simple && !is_complex {
        ModelTier::Fast
    } else if quota.has_remaining() {
        // Ambiguous, or nothing matched: spend budget on quality.
        quota.consume();
        ModelTier::Smart
    } else {
        ModelTier::Fast
    };

    debug!(
        "routed to {:?} (simple: {}, complex: {}, quota: {}/{})",
        tier,
        is_simple,
        is_complex,
        quota.used_today(),
        quota.daily_cap()
    );
    tier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(cap: u32) -> ModelQuota {
        ModelQuota::new(cap)
    }

    #[test]
    fn test_simple_keyword_routes_fast_without_quota() {
        let mut q = quota(800);
        let tier = select_model("list files on desktop", &mut q);
        assert_eq!(tier, ModelTier::Fast);
        assert_eq!(q.used_today(), 0);
    }

    #[test]
    fn test_complex_keyword_routes_smart_and_consumes() {
        let mut q = quota(800);
        let tier = select_model("analyze this quarter's sales", &mut q);
        assert_eq!(tier, ModelTier::Smart);
        assert_eq!(q.used_today(), 1);
    }

    #[test]
    fn test_long_message_always_complex() {
        let mut q = quota(800);
        // A long message full of "simple" vocabulary still routes smart.
        let text = "open ".repeat(50);
        assert!(text.chars().count() > 200);
        let tier = select_model(&text, &mut q);
        assert_eq!(tier, ModelTier::Smart);
        assert_eq!(q.used_today(), 1);
    }

    #[test]
    fn test_complex_beats_simple_when_both_match() {
        let mut q = quota(800);
        let tier = select_model("open the report and compare numbers", &mut q);
        assert_eq!(tier, ModelTier::Smart);
    }

    #[test]
    fn test_ambiguous_defaults_smart_with_quota() {
        let mut q = quota(800);
        let tier = select_model("hello there", &mut q);
        assert_eq!(tier, ModelTier::Smart);
        assert_eq!(q.used_today(), 1);
    }

    #[test]
    fn test_quota_exhausted_falls_back_fast() {
        let mut q = quota(1);
        assert_eq!(select_model("analyze things", &mut q), ModelTier::Smart);
        assert_eq!(select_model("analyze more things", &mut q), ModelTier::Fast);
        assert_eq!(select_model("hello there", &mut q), ModelTier::Fast);
        assert_eq!(q.used_today(), 1);
    }

    #[test]
    fn test_day_rollover_resets_once() {
        let mut q = quota(10);
        let day1 = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();

        q.roll_over(day1);
        classify("analyze", &mut q);
        classify("analyze", &mut q);
        assert_eq!(q.used_today(), 2);

        q.roll_over(day2);
        assert_eq!(q.used_today(), 0);

        // Repeated checks within the same day never re-reset.
        classify("analyze", &mut q);
        q.roll_over(day2);
        assert_eq!(q.used_today(), 1);
    }
}
