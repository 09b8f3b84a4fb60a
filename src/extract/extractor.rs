//! Maps response bodies to identifier sets.

use crate::core::Identifier;
use crate::extract::scheme::IdentifierScheme;

use std::collections::BTreeSet;

/// Applies one or more identifier schemes to raw text.
///
/// Invalid candidates (out-of-range year, wrong digit count) are dropped
/// silently. The result is a set of normalized identifiers, so the same number
/// matched by several patterns appears once.
///
/// # Example
///
/// ```rust
/// use patentbridge::extract::Extractor;
///
/// let extractor = Extractor::wo();
/// let found = extractor.extract_values("Publication: WO 2016/162604 A1, WO2018162793");
/// assert_eq!(
///     found.into_iter().collect::<Vec<_>>(),
///     vec!["WO2016162604", "WO2018162793"]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    schemes: Vec<IdentifierScheme>,
}

impl Extractor {
    /// Creates an extractor over the given schemes.
    pub fn new(schemes: Vec<IdentifierScheme>) -> Self {
        Self { schemes }
    }

    /// An extractor for WO publication numbers.
    pub fn wo() -> Self {
        Self::new(vec![IdentifierScheme::wo()])
    }

    /// An extractor for BR patent numbers.
    pub fn br() -> Self {
        Self::new(vec![IdentifierScheme::br()])
    }

    /// Adds a scheme.
    pub fn with_scheme(mut self, scheme: IdentifierScheme) -> Self {
        self.schemes.push(scheme);
        self
    }

    /// Returns the configured schemes.
    pub fn schemes(&self) -> &[IdentifierScheme] {
        &self.schemes
    }

    /// Returns the normalized values found in `text`.
    pub fn extract_values(&self, text: &str) -> BTreeSet<String> {
        self.schemes
            .iter()
            .flat_map(|scheme| scheme.find_all(text))
            .collect()
    }

    /// Returns the identifiers found in `text`, tagged with `source_strategy`.
    pub fn extract(&self, text: &str, source_strategy: &str) -> BTreeSet<Identifier> {
        self.extract_values(text)
            .into_iter()
            .map(|value| Identifier::new(value, source_strategy))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mixed_formats() {
        let extractor = Extractor::wo();
        let found =
            extractor.extract_values("Publication: WO 2016/162604 A1\n<td>WO2018162793</td>");
        let expected: BTreeSet<String> = ["WO2016162604", "WO2018162793"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_extract_rejects_invalid_year() {
        assert!(Extractor::wo().extract_values("WO1899000001").is_empty());
    }

    #[test]
    fn test_extract_deduplicates_across_patterns() {
        let extractor = Extractor::wo();
        let html = r#"<a href="/patent/WO2016162604A1/en">WO2016162604</a>
            <meta name="citation_patent_id=WO2016162604">"#;
        let found = extractor.extract(html, "google-patents");
        assert_eq!(found.len(), 1);
        let id = found.into_iter().next().unwrap();
        assert_eq!(id.value, "WO2016162604");
        assert_eq!(id.source_strategy, "google-patents");
    }

    #[test]
    fn test_extract_multiple_schemes() {
        let extractor = Extractor::wo().with_scheme(IdentifierScheme::br());
        let found = extractor.extract_values("WO2016162604 also published as BR112017024082A2");
        assert!(found.contains("WO2016162604"));
        assert!(found.contains("BR112017024082"));
    }

    #[test]
    fn test_extract_nothing() {
        assert!(Extractor::br().extract_values("<html>No results</html>").is_empty());
        assert!(Extractor::default().extract_values("WO2016162604").is_empty());
    }
}
