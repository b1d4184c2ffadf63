//! Keyword relevance between a question and an agent description.

use std::collections::BTreeSet;

use waypoint_core::types::AgentHandle;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "what", "how", "this", "that", "from", "are", "you", "your",
    "please", "about", "into", "can", "will", "should", "would", "there", "then", "than",
];

/// Lowercase word set, dropping short words and stopwords.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Everything a node says about itself, tokenized.
pub fn node_tokens(handle: &AgentHandle) -> BTreeSet<String> {
    let mut text = format!("{} {} {}", handle.id, handle.agent_type, handle.description);
    for cap in &handle.capabilities {
        text.push(' ');
        text.push_str(cap);
    }
    tokenize(&text)
}

/// Share of (up to four) question keywords the node mentions, 0.0 to 1.0.
pub fn keyword_relevance(question: &BTreeSet<String>, handle: &AgentHandle) -> f64 {
    if question.is_empty() {
        return 0.0;
    }
    let node = node_tokens(handle);
    let matched = question
        .iter()
        .filter(|q| node.iter().any(|n| n.starts_with(q.as_str()) || q.starts_with(n.as_str())))
        .count();
    (matched as f64 / question.len().min(4) as f64).min(1.0)
}

/// Whether the node produces the final answer.
pub fn is_responder(handle: &AgentHandle) -> bool {
    let mentions = |s: &str| {
        let s = s.to_lowercase();
        s.contains("response") || s.contains("answer")
    };
    mentions(&handle.agent_type) || handle.capabilities.iter().any(|c| mentions(c))
}
