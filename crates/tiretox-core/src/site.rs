use std::path::Path;

use crate::config::{PipelineConfig, SiteConfig};
use crate::error::{PipelineError, Result};

/// Picks the site whose longest matching pattern is the longest match overall, so
/// `northfield_bridgeBT_0412.csv` selects `northfield_bridgeBT` over `northfield_bridge`.
/// Two different sites tying on that length is ambiguous.
pub fn detect_site<'a>(config: &'a PipelineConfig, file_name: &str) -> Result<&'a SiteConfig> {
    let mut best: Vec<(&SiteConfig, usize)> = Vec::new();

    for site in &config.sites {
        let Some(len) = site
            .patterns
            .iter()
            .filter(|pattern| file_name.contains(pattern.as_str()))
            .map(|pattern| pattern.len())
            .max()
        else {
            continue;
        };

        match best.first().map(|(_, best_len)| *best_len) {
            Some(best_len) if len < best_len => {}
            Some(best_len) if len == best_len => best.push((site, len)),
            _ => best = vec![(site, len)],
        }
    }

    match best.as_slice() {
        [] => Err(PipelineError::UnknownSite {
            file_name: file_name.to_string(),
        }),
        [(site, _)] => Ok(*site),
        many => Err(PipelineError::AmbiguousSite {
            file_name: file_name.to_string(),
            candidates: many.iter().map(|(site, _)| site.name.clone()).collect(),
        }),
    }
}

pub fn detect_site_for_path<'a>(config: &'a PipelineConfig, path: &Path) -> Result<&'a SiteConfig> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    detect_site(config, &file_name)
}

/// Resolves a caller-supplied site name, bypassing detection.
pub fn site_by_name<'a>(config: &'a PipelineConfig, name: &str) -> Result<&'a SiteConfig> {
    config.site(name).ok_or_else(|| PipelineError::UnknownSite {
        file_name: name.to_string(),
    })
}

/// Barometric-source site for `site`; `None` when the site measures barometric pressure
/// itself.
pub fn companion_of<'a>(
    config: &'a PipelineConfig,
    site: &SiteConfig,
) -> Result<Option<&'a SiteConfig>> {
    if site.barometric {
        return Ok(None);
    }
    let name = site
        .companion
        .as_deref()
        .ok_or_else(|| PipelineError::UnknownCompanion(site.name.clone()))?;
    config
        .site(name)
        .map(Some)
        .ok_or_else(|| PipelineError::UnknownCompanion(site.name.clone()))
}
