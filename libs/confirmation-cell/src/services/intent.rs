use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a free-text customer reply asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyIntent {
    Confirm,
    Cancel,
    Reschedule,
    Unknown,
}

/// Keyword classifier for confirmation replies. Customers answer in
/// Portuguese or English, usually with one short phrase; precedence is
/// reschedule > cancel > confirm so "nao posso, quero remarcar" lands on
/// the reschedule path.
pub struct IntentClassifier {
    reschedule: Regex,
    cancel: Regex,
    confirm: Regex,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            reschedule: Regex::new(
                r"(?i)\b(remarcar|reagendar|adiar|mudar|trocar|outro\s+(dia|hor[aá]rio)|reschedule|rebook|another\s+(day|time)|move)\b",
            )
            .expect("reschedule pattern is valid"),
            cancel: Regex::new(
                r"(?i)\b(cancelar?|cancela|desmarcar|n[aã]o\s+(vou|posso|quero)|cancel|can.?t\s+make)\b",
            )
            .expect("cancel pattern is valid"),
            confirm: Regex::new(
                r"(?i)\b(sim|confirm(o|ado|ar|ed)?|certo|claro|pode\s+ser|combinado|yes|yep|ok|okay|sure)\b",
            )
            .expect("confirm pattern is valid"),
        }
    }

    pub fn classify(&self, text: &str) -> ReplyIntent {
        let text = text.trim();
        if text.is_empty() {
            return ReplyIntent::Unknown;
        }
        if self.reschedule.is_match(text) {
            ReplyIntent::Reschedule
        } else if self.cancel.is_match(text) {
            ReplyIntent::Cancel
        } else if self.confirm.is_match(text) {
            ReplyIntent::Confirm
        } else {
            ReplyIntent::Unknown
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
