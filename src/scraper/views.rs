//! Expansion of a site into concrete fetch targets

use crate::config::SiteConfig;
use crate::models::{DEFAULT_VIEW, FetchTarget};

/// One target per configured view, in configuration order.
///
/// Single-view sites get one `default` target at the base URL. Suffixes are
/// appended verbatim, so `"?type=latest"` and `"latest/"` both work.
pub fn resolve_targets(config: &SiteConfig) -> Vec<FetchTarget> {
    if !config.multi_view {
        return vec![FetchTarget {
            url: config.url.clone(),
            view_label: DEFAULT_VIEW.to_string(),
        }];
    }

    config
        .views
        .iter()
        .map(|view| FetchTarget {
            url: format!("{}{}", config.url, view.suffix),
            view_label: view.label.clone(),
        })
        .collect()
}
