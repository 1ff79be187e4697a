//! Normalised accessor over provider-shaped NLU results.
//!
//! NLU adapters return a raw, per-provider JSON mapping. Branches should
//! never inspect that shape directly — [`NluResult`] isolates the
//! normalisation behind `intents()`, `entities()`, `language()`,
//! `sentiment()`, and a uniform [`matches`](NluResult::matches) predicate, so
//! the same branch works unmodified against any provider that fills in the
//! conventional `intents`/`entities`/`language`/`sentiment` keys.

use serde_json::Value;

/// A single recognised intent with its confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub id: String,
    pub score: f64,
}

/// A single recognised entity with its type, value, and confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: String,
    pub value: String,
    pub score: f64,
}

/// A query against an [`NluResult`] used by [`NluResult::matches`].
///
/// Both fields are optional and conjunctive: an absent `id` matches any
/// intent id, an absent `min_score` accepts any score.
#[derive(Debug, Clone, Default)]
pub struct NluQuery {
    pub id: Option<String>,
    pub min_score: Option<f64>,
}

impl NluQuery {
    /// An unconstrained query — matches any non-empty intent list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the intent id to equal this value.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Require the intent score to be at least this value.
    pub fn with_min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }
}

/// Normalised view over a raw NLU provider payload.
///
/// Wraps the adapter's raw JSON and exposes uniform accessors. An empty
/// mapping (or JSON `null`) means "no result" and every accessor returns an
/// empty/`None` value accordingly.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct NluResult {
    raw: Value,
}

impl NluResult {
    /// Wrap a raw provider payload.
    pub fn from_raw(raw: Value) -> Self {
        Self { raw }
    }

    /// The canonical "no result" value.
    pub fn empty() -> Self {
        Self {
            raw: Value::Object(serde_json::Map::new()),
        }
    }

    /// `true` when the adapter returned no usable result.
    pub fn is_empty(&self) -> bool {
        match &self.raw {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// The raw payload, for adapters or callbacks that need provider-specific
    /// fields this accessor doesn't normalise.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Recognised intents, highest confidence first if the provider didn't
    /// already sort them — callers should not assume an order beyond what
    /// the provider returned.
    pub fn intents(&self) -> Vec<Intent> {
        self.raw
            .get("intents")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_intent).collect())
            .unwrap_or_default()
    }

    /// Recognised entities.
    pub fn entities(&self) -> Vec<Entity> {
        self.raw
            .get("entities")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_entity).collect())
            .unwrap_or_default()
    }

    /// Detected language code (e.g. `"en"`), if the provider reported one.
    pub fn language(&self) -> Option<&str> {
        self.raw.get("language").and_then(Value::as_str)
    }

    /// Overall sentiment score, if the provider reported one. Accepts
    /// either a bare number or `{"score": ...}`.
    pub fn sentiment(&self) -> Option<f64> {
        match self.raw.get("sentiment") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::Object(_)) => self
                .raw
                .get("sentiment")
                .and_then(|s| s.get("score"))
                .and_then(Value::as_f64),
            _ => None,
        }
    }

    /// Whether any recognised intent satisfies `query`.
    pub fn matches(&self, query: &NluQuery) -> bool {
        self.intents().iter().any(|intent| {
            query.id.as_deref().is_none_or(|id| id == intent.id)
                && query.min_score.is_none_or(|min| intent.score >= min)
        })
    }
}

fn parse_intent(value: &Value) -> Option<Intent> {
    let id = value
        .get("id")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)?
        .to_string();
    let score = value.get("score").and_then(Value::as_f64).unwrap_or(1.0);
    Some(Intent { id, score })
}

fn parse_entity(value: &Value) -> Option<Entity> {
    let kind = value
        .get("type")
        .or_else(|| value.get("kind"))
        .and_then(Value::as_str)?
        .to_string();
    let entity_value = value
        .get("value")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let score = value.get("score").and_then(Value::as_f64).unwrap_or(1.0);
    Some(Entity {
        kind,
        value: entity_value,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_result_has_no_intents() {
        let result = NluResult::empty();
        assert!(result.is_empty());
        assert!(result.intents().is_empty());
        assert!(result.language().is_none());
    }

    #[test]
    fn parses_intents_entities_language_sentiment() {
        let result = NluResult::from_raw(json!({
            "intents": [{"id": "greeting", "score": 0.92}, {"name": "farewell", "score": 0.1}],
            "entities": [{"type": "person", "value": "Ada", "score": 0.8}],
            "language": "en",
            "sentiment": {"score": 0.5}
        }));

        assert!(!result.is_empty());
        assert_eq!(result.language(), Some("en"));
        assert_eq!(result.sentiment(), Some(0.5));

        let intents = result.intents();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].id, "greeting");
        assert_eq!(intents[1].id, "farewell");

        let entities = result.entities();
        assert_eq!(entities[0].kind, "person");
        assert_eq!(entities[0].value, "Ada");
    }

    #[test]
    fn matches_conjoins_id_and_min_score() {
        let result = NluResult::from_raw(json!({
            "intents": [{"id": "greeting", "score": 0.92}]
        }));

        assert!(result.matches(&NluQuery::new().with_id("greeting")));
        assert!(result.matches(&NluQuery::new().with_min_score(0.9)));
        assert!(!result.matches(&NluQuery::new().with_id("farewell")));
        assert!(!result.matches(&NluQuery::new().with_min_score(0.95)));
    }

    #[test]
    fn bare_numeric_sentiment_is_supported() {
        let result = NluResult::from_raw(json!({"sentiment": -0.3}));
        assert_eq!(result.sentiment(), Some(-0.3));
    }
}
