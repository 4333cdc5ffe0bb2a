use crate::browser::{Selector, SelectorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declarative pointer to a page element
///
/// Produced by the schema-generation step. `xpath` is the primary selector and
/// `css_selector` the fallback; `id` and `index` are carried for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub xpath: Option<String>,

    #[serde(default)]
    pub css_selector: Option<String>,

    #[serde(default)]
    pub index: Option<u32>,

    #[serde(default)]
    pub element_description: Option<String>,
}

impl ElementRef {
    /// Builds a reference from an xpath query
    pub fn xpath(query: impl Into<String>) -> Self {
        Self {
            xpath: Some(query.into()),
            ..Self::default()
        }
    }

    /// Builds a reference from a CSS selector
    pub fn css(query: impl Into<String>) -> Self {
        Self {
            css_selector: Some(query.into()),
            ..Self::default()
        }
    }

    /// Attaches a human-readable description
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.element_description = Some(description.into());
        self
    }

    /// Returns the selector strategies for this element in priority order
    ///
    /// The xpath query comes first, the CSS selector second. Blank selectors are
    /// left out, so an empty result means the reference is unusable.
    pub fn strategies(&self) -> Vec<Selector> {
        let candidates = [
            (SelectorKind::XPath, self.xpath.as_deref()),
            (SelectorKind::Css, self.css_selector.as_deref()),
        ];

        candidates
            .into_iter()
            .filter_map(|(kind, query)| {
                query
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(|q| Selector::new(kind, q))
            })
            .collect()
    }

    /// Returns true if at least one selector is configured
    pub fn has_selector(&self) -> bool {
        !self.strategies().is_empty()
    }

    /// Description used in logs and errors
    pub fn description(&self) -> &str {
        self.element_description
            .as_deref()
            .unwrap_or("[no description]")
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())?;
        if let Some(id) = &self.id {
            write!(f, " (id={})", id)?;
        }
        if let Some(index) = self.index {
            write!(f, " (index={})", index)?;
        }
        Ok(())
    }
}

/// Declarative description of a site's search flow
///
/// Describes where the search form lives, which control submits it, which
/// control moves to the next result page, and the pattern matching detail links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    /// Address of the search page
    pub search_page_url: String,

    /// Control that submits the search form
    #[serde(default)]
    pub submit_button: ElementRef,

    /// Control that advances to the next page of results
    pub next_page_button: ElementRef,

    /// Pattern matching every detail link on a results page
    pub detail_page_link: ElementRef,

    /// Elements clicked, in order, before submitting the search
    #[serde(default)]
    pub pre_search_steps: Vec<ElementRef>,

    /// Elements clicked, in order, after submitting the search
    #[serde(default)]
    pub post_search_steps: Vec<ElementRef>,

    /// Results are shown on the search page itself; do not click submit
    #[serde(default)]
    pub skip_search: bool,
}
