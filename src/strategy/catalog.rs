//! Built-in strategies for public patent sources.

use crate::core::ArcStrategy;
use crate::extract::Extractor;
use crate::strategy::template::TemplateStrategy;

use std::sync::Arc;

/// Google Patents full-text search.
pub const GOOGLE_PATENTS: &str = "google-patents";
/// Google web search restricted to `patents.google.com`.
pub const GOOGLE_SITE_SEARCH: &str = "google-site-search";
/// EPO Espacenet worldwide search.
pub const ESPACENET: &str = "espacenet";
/// WIPO Patentscope search.
pub const WIPO_PATENTSCOPE: &str = "wipo-patentscope";
/// Lens.org patent search.
pub const LENS: &str = "lens";

/// Google Patents publication page, for detail lookups.
pub const GOOGLE_PATENTS_PAGE: &str = "google-patents-page";
/// Google Patents query on the identifier, for detail lookups.
pub const GOOGLE_PATENTS_QUERY: &str = "google-patents-query";
/// Espacenet publication-number query, for detail lookups.
pub const ESPACENET_PN: &str = "espacenet-pn";
/// Lens.org query on the identifier, for detail lookups.
pub const LENS_QUERY: &str = "lens-query";

/// Search strategies that find WO numbers for a free-text query, in
/// priority order.
pub fn search_strategies() -> Vec<ArcStrategy> {
    vec![
        Arc::new(TemplateStrategy::new(
            GOOGLE_PATENTS,
            "https://patents.google.com/?q={query}&num=20",
            Extractor::wo(),
        )),
        Arc::new(
            TemplateStrategy::new(
                GOOGLE_SITE_SEARCH,
                "https://www.google.com/search?q={query}&num=20",
                Extractor::wo(),
            )
            .with_query_template("{query} site:patents.google.com"),
        ),
        Arc::new(TemplateStrategy::new(
            ESPACENET,
            "https://worldwide.espacenet.com/patent/search?q={query}",
            Extractor::wo(),
        )),
        Arc::new(TemplateStrategy::new(
            WIPO_PATENTSCOPE,
            "https://patentscope.wipo.int/search/en/search.jsf?query={query}",
            Extractor::wo(),
        )),
        Arc::new(TemplateStrategy::new(
            LENS,
            "https://www.lens.org/lens/search/patent/list?q={query}",
            Extractor::wo(),
        )),
    ]
}

/// Detail strategies that resolve a WO number into BR numbers, in priority
/// order.
pub fn detail_strategies() -> Vec<ArcStrategy> {
    vec![
        Arc::new(TemplateStrategy::new(
            GOOGLE_PATENTS_PAGE,
            "https://patents.google.com/patent/{query}",
            Extractor::br(),
        )),
        Arc::new(TemplateStrategy::new(
            GOOGLE_PATENTS_QUERY,
            "https://patents.google.com/?q={query}",
            Extractor::br(),
        )),
        Arc::new(TemplateStrategy::new(
            ESPACENET_PN,
            "https://worldwide.espacenet.com/patent/search?q=pn={query}",
            Extractor::br(),
        )),
        Arc::new(TemplateStrategy::new(
            LENS_QUERY,
            "https://www.lens.org/lens/search/patent/list?q={query}",
            Extractor::br(),
        )),
    ]
}
