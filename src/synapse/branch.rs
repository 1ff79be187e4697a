//! Matcher + callback bundles installed on a [`Path`](crate::synapse::path::Path).

use crate::synapse::error::CoreError;
use crate::synapse::message::Message;
use crate::synapse::middleware::Middleware;
use crate::synapse::nlu::NluQuery;
use crate::synapse::state::State;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A branch's stable identifier within a [`Path`](crate::synapse::path::Path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BranchId(String);

impl BranchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BranchId {
    fn from(value: &str) -> Self {
        BranchId(value.to_string())
    }
}

impl From<String> for BranchId {
    fn from(value: String) -> Self {
        BranchId(value)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A matcher evaluates a message and either rejects it (`None`) or accepts
/// it with zero or more captured fragments (`Some(captures)`).
///
/// Implementations are synchronous: matching never needs to suspend, only
/// the branch callback that runs after a match does.
pub trait Matcher: Send + Sync {
    fn evaluate(&self, message: &Message) -> Option<Vec<String>>;
}

/// Matches `Text` messages against a regular expression. Captures, if the
/// pattern has any capture groups, are the groups in order; otherwise the
/// capture list is the whole match.
pub struct RegexMatcher(pub regex::Regex);

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(regex::Regex::new(pattern)?))
    }
}

impl Matcher for RegexMatcher {
    fn evaluate(&self, message: &Message) -> Option<Vec<String>> {
        let text = message.text_content()?;
        let caps = self.0.captures(text)?;
        if caps.len() > 1 {
            Some(
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect(),
            )
        } else {
            Some(vec![caps.get(0)?.as_str().to_string()])
        }
    }
}

/// Matches `Text` messages by extracting the substring following `after`
/// and, when given, preceding `before`. Case-insensitive. The captured
/// fragment is trimmed of surrounding whitespace and commas, which is what
/// lets `{after: "call me", before: "please"}` capture `"bb"` rather than
/// `"bb,"` from `"Call me bb, please"`.
pub struct CaptureMatcher {
    pub after: String,
    pub before: Option<String>,
}

impl CaptureMatcher {
    pub fn new(after: impl Into<String>) -> Self {
        Self {
            after: after.into(),
            before: None,
        }
    }

    pub fn before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }
}

impl Matcher for CaptureMatcher {
    fn evaluate(&self, message: &Message) -> Option<Vec<String>> {
        let text = message.text_content()?;
        let lower = text.to_lowercase();
        let after_idx = lower.find(&self.after.to_lowercase())?;
        let start = after_idx + self.after.len();
        let rest = &text[start..];

        let captured = match &self.before {
            Some(before) => {
                let rest_lower = rest.to_lowercase();
                let before_idx = rest_lower.find(&before.to_lowercase())?;
                &rest[..before_idx]
            }
            None => rest,
        };

        let trimmed = captured.trim_matches(|c: char| c.is_whitespace() || c == ',');
        Some(vec![trimmed.to_string()])
    }
}

/// Matches `Server`/`Rich` messages by shallow key equality against an
/// expected JSON object: every key in `expected` must be present in the
/// message's payload with an equal value.
pub struct EqualityMatcher {
    pub expected: Value,
}

impl EqualityMatcher {
    pub fn new(expected: Value) -> Self {
        Self { expected }
    }

    fn payload_of(message: &Message) -> Option<&Value> {
        match message {
            Message::Server { data, .. } => Some(data),
            Message::Rich { payload, .. } => Some(payload),
            Message::CatchAll { original } => Self::payload_of(original),
            _ => None,
        }
    }
}

impl Matcher for EqualityMatcher {
    fn evaluate(&self, message: &Message) -> Option<Vec<String>> {
        let payload = Self::payload_of(message)?;
        let expected_obj = self.expected.as_object()?;
        let payload_obj = payload.as_object()?;
        let all_match = expected_obj
            .iter()
            .all(|(k, v)| payload_obj.get(k) == Some(v));
        all_match.then(Vec::new)
    }
}

/// Matches a `Text` message's attached NLU result against a query.
pub struct NluMatcher(pub NluQuery);

impl Matcher for NluMatcher {
    fn evaluate(&self, message: &Message) -> Option<Vec<String>> {
        let result = message.nlu_result()?;
        result.matches(&self.0).then(Vec::new)
    }
}

/// Runs once a branch's matcher fires, under that stage's middleware.
#[async_trait]
pub trait BranchCallback: Send + Sync {
    async fn call(&self, state: &mut State) -> Result<(), CoreError>;
}

/// A matcher + callback bundle installed on a [`Path`](crate::synapse::path::Path)
/// stage collection.
#[derive(Clone)]
pub struct Branch {
    pub id: BranchId,
    pub matcher: Arc<dyn Matcher>,
    pub callback: Arc<dyn BranchCallback>,
    /// When true, this branch is included in a stage's `forced` collapse
    /// (see [`Path::forced`](crate::synapse::path::Path::forced)) and still
    /// runs even after another branch in the same stage set `state.done`.
    pub force: bool,
}

impl Branch {
    pub fn new(
        id: impl Into<BranchId>,
        matcher: Arc<dyn Matcher>,
        callback: Arc<dyn BranchCallback>,
    ) -> Self {
        Self {
            id: id.into(),
            matcher,
            callback,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Evaluate this branch's matcher and, on a match, run its callback
    /// through `middleware`.
    ///
    /// Returns `true` if the matcher fired (regardless of whether the
    /// middleware short-circuited before the callback ran) and `false`
    /// otherwise.
    pub async fn process(
        &self,
        state: &mut State,
        middleware: &Middleware,
    ) -> Result<bool, CoreError> {
        let Some(message) = state.message.as_ref() else {
            return Ok(false);
        };
        let Some(conditions) = self.matcher.evaluate(message) else {
            return Ok(false);
        };

        state.record_match(self.id.clone(), conditions);

        let callback = Arc::clone(&self.callback);
        middleware
            .execute(state, move |state| {
                let callback = Arc::clone(&callback);
                Box::pin(async move { callback.call(state).await })
            })
            .await?;

        Ok(true)
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::directory::{Room, User};

    fn user() -> User {
        User::new("u1", Room::new("general"))
    }

    #[test]
    fn regex_matcher_captures_groups() {
        let matcher = RegexMatcher::new(r"remind me to (.+)").unwrap();
        let msg = Message::text(user(), "remind me to buy milk");
        assert_eq!(
            matcher.evaluate(&msg),
            Some(vec!["buy milk".to_string()])
        );
    }

    #[test]
    fn regex_matcher_without_groups_returns_whole_match() {
        let matcher = RegexMatcher::new(r"hello").unwrap();
        let msg = Message::text(user(), "well hello there");
        assert_eq!(matcher.evaluate(&msg), Some(vec!["hello".to_string()]));
    }

    #[test]
    fn capture_matcher_trims_trailing_punctuation_with_before() {
        let matcher = CaptureMatcher::new("call me").before("please");
        let msg = Message::text(user(), "Call me bb, please");
        assert_eq!(matcher.evaluate(&msg), Some(vec!["bb".to_string()]));
    }

    #[test]
    fn capture_matcher_without_before_runs_to_end() {
        let matcher = CaptureMatcher::new("call me");
        let msg = Message::text(user(), "Call me bb, please");
        assert_eq!(
            matcher.evaluate(&msg),
            Some(vec!["bb, please".to_string()])
        );
    }

    #[test]
    fn capture_matcher_rejects_missing_after() {
        let matcher = CaptureMatcher::new("page me");
        let msg = Message::text(user(), "Call me bb");
        assert!(matcher.evaluate(&msg).is_none());
    }

    #[test]
    fn equality_matcher_matches_subset_of_server_payload() {
        let matcher = EqualityMatcher::new(serde_json::json!({"kind": "deploy"}));
        let msg = Message::server(user(), serde_json::json!({"kind": "deploy", "env": "prod"}));
        assert!(matcher.evaluate(&msg).is_some());

        let other = Message::server(user(), serde_json::json!({"kind": "rollback"}));
        assert!(matcher.evaluate(&other).is_none());
    }
}
