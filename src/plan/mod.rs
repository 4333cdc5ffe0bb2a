//! Search plan module
//!
//! A search plan is the JSON document produced by the schema-generation step.
//! It tells the crawler which page to open, what to click, and which elements
//! are detail links. This module only loads and validates plans; it never
//! decides which selectors to use.

mod types;

pub use types::{ElementRef, SearchPlan};

use crate::PlanError;
use std::path::Path;
use url::Url;

/// Loads and validates a search plan from a JSON file
///
/// # Arguments
///
/// * `path` - Path to the search plan document
///
/// # Returns
///
/// * `Ok(SearchPlan)` - Successfully loaded and validated plan
/// * `Err(PlanError)` - Failed to read, parse, or validate the plan
pub fn load_plan(path: &Path) -> Result<SearchPlan, PlanError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let plan: SearchPlan = serde_json::from_str(&content).map_err(|source| PlanError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    validate_plan(&plan)?;
    Ok(plan)
}

/// Validates a search plan
///
/// Every element the crawler may need must carry at least one selector, and the
/// search page must be an absolute HTTP(S) address. The submit button is not
/// needed when the plan skips the search.
pub fn validate_plan(plan: &SearchPlan) -> Result<(), PlanError> {
    let url = Url::parse(&plan.search_page_url)
        .map_err(|_| PlanError::InvalidUrl(plan.search_page_url.clone()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PlanError::InvalidUrl(plan.search_page_url.clone()));
    }

    let required = [
        ("submit_button", &plan.submit_button),
        ("next_page_button", &plan.next_page_button),
        ("detail_page_link", &plan.detail_page_link),
    ];

    for (name, element) in required {
        if name == "submit_button" && plan.skip_search {
            continue;
        }
        if !element.has_selector() {
            return Err(PlanError::MissingSelector(name.to_string()));
        }
    }

    for (i, step) in plan.pre_search_steps.iter().enumerate() {
        if !step.has_selector() {
            return Err(PlanError::MissingSelector(format!("pre_search_steps[{}]", i)));
        }
    }

    for (i, step) in plan.post_search_steps.iter().enumerate() {
        if !step.has_selector() {
            return Err(PlanError::MissingSelector(format!(
                "post_search_steps[{}]",
                i
            )));
        }
    }

    Ok(())
}
