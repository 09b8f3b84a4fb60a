//! URL-template strategies.

use crate::core::{FetchError, FetchRequest, Identifier, Strategy};
use crate::extract::Extractor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

const PLACEHOLDER: &str = "{query}";

/// Which built-in identifier scheme a configured strategy extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    /// WO publication numbers.
    Wo,
    /// BR patent numbers.
    Br,
}

impl SchemeKind {
    fn extractor(self) -> Extractor {
        match self {
            Self::Wo => Extractor::wo(),
            Self::Br => Extractor::br(),
        }
    }
}

/// Serializable description of a [`TemplateStrategy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    /// Stable strategy name.
    pub name: String,

    /// URL containing a `{query}` placeholder.
    pub url_template: String,

    /// Optional rewrite applied to the query before encoding, also containing
    /// `{query}`.
    #[serde(default)]
    pub query_template: Option<String>,

    /// Identifiers to extract.
    pub scheme: SchemeKind,
}

/// A strategy that fills a URL template and extracts with an [`Extractor`].
///
/// The query is form-encoded (spaces become `+`) before substitution.
///
/// # Example
///
/// ```rust
/// use patentbridge::core::Strategy;
/// use patentbridge::extract::Extractor;
/// use patentbridge::strategy::TemplateStrategy;
///
/// let strategy = TemplateStrategy::new(
///     "google-patents",
///     "https://patents.google.com/?q={query}&num=20",
///     Extractor::wo(),
/// );
/// let request = strategy.build_request("aspirin patent").unwrap();
/// assert_eq!(request.url, "https://patents.google.com/?q=aspirin+patent&num=20");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateStrategy {
    name: String,
    url_template: String,
    query_template: Option<String>,
    headers: Vec<(String, String)>,
    extractor: Extractor,
}

impl TemplateStrategy {
    /// Creates a strategy.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        extractor: Extractor,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            query_template: None,
            headers: Vec::new(),
            extractor,
        }
    }

    /// Creates a strategy from its serializable definition.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the URL template lacks the
    /// `{query}` placeholder.
    pub fn from_definition(definition: StrategyDefinition) -> Result<Self, FetchError> {
        if !definition.url_template.contains(PLACEHOLDER) {
            return Err(FetchError::configuration(format!(
                "strategy '{}' url_template has no {PLACEHOLDER} placeholder",
                definition.name
            )));
        }

        let mut strategy = Self::new(
            definition.name,
            definition.url_template,
            definition.scheme.extractor(),
        );
        strategy.query_template = definition.query_template;
        Ok(strategy)
    }

    /// Rewrites the query before encoding, e.g. `"{query} site:example.com"`.
    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = Some(template.into());
        self
    }

    /// Adds a header to every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }
}

impl Strategy for TemplateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_request(&self, query: &str) -> Result<FetchRequest, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FetchError::invalid_request(&self.name, "query is empty"));
        }

        let query = match &self.query_template {
            Some(template) => template.replace(PLACEHOLDER, query),
            None => query.to_string(),
        };
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let url = self.url_template.replace(PLACEHOLDER, &encoded);

        Url::parse(&url).map_err(|e| FetchError::invalid_request(&self.name, e.to_string()))?;

        let mut request = FetchRequest::get(url);
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        Ok(request)
    }

    fn extract(&self, body: &str) -> BTreeSet<Identifier> {
        self.extractor.extract(body, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpMethod;

    #[test]
    fn test_build_request_encodes_query() {
        let strategy = TemplateStrategy::new(
            "google-site",
            "https://www.google.com/search?q={query}&num=20",
            Extractor::wo(),
        )
        .with_query_template("{query} site:patents.google.com");

        let request = strategy.build_request("darolutamide WO2016").unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.url,
            "https://www.google.com/search?q=darolutamide+WO2016+site%3Apatents.google.com&num=20"
        );
    }

    #[test]
    fn test_build_request_rejects_empty_query() {
        let strategy = TemplateStrategy::new("lens", "https://lens.org/?q={query}", Extractor::wo());
        let err = strategy.build_request("   ").unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest { ref strategy, .. } if strategy == "lens"));
    }

    #[test]
    fn test_build_request_rejects_bad_template() {
        let strategy = TemplateStrategy::new("broken", "not a url {query}", Extractor::wo());
        assert!(strategy.build_request("x").is_err());
    }

    #[test]
    fn test_headers_are_attached() {
        let strategy = TemplateStrategy::new("s", "https://example.com/?q={query}", Extractor::wo())
            .with_header("Accept", "application/json");
        let request = strategy.build_request("x").unwrap();
        assert_eq!(
            request.headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_extract_tags_strategy_name() {
        let strategy = TemplateStrategy::new("espacenet", "https://e/?q={query}", Extractor::wo());
        let ids = strategy.extract("WO2016162604");
        assert_eq!(ids.iter().next().unwrap().source_strategy, "espacenet");
    }

    #[test]
    fn test_from_definition() {
        let definition: StrategyDefinition = serde_json::from_str(
            r#"{"name": "custom", "url_template": "https://example.com/s?q={query}", "scheme": "br"}"#,
        )
        .unwrap();
        let strategy = TemplateStrategy::from_definition(definition).unwrap();
        assert_eq!(strategy.name(), "custom");
        assert_eq!(strategy.extract("BR112017024082").len(), 1);

        let missing = StrategyDefinition {
            name: "x".into(),
            url_template: "https://example.com/".into(),
            query_template: None,
            scheme: SchemeKind::Wo,
        };
        assert!(TemplateStrategy::from_definition(missing).is_err());
    }
}
