//! Selector resolution
//!
//! Turns an [`ElementRef`] into the single concrete [`Query`] that identifies
//! exactly one element on the current page. Strategies are tried in priority
//! order and the first one that matches anything decides: one match resolves,
//! several matches fail with `AmbiguousMatch`. A weaker strategy is never
//! consulted to break a tie.

use tracing::{debug, warn};

use crate::driver::{PageDriver, Probe};
use crate::error::{E2eError, E2eResult};
use crate::locator::{ElementRef, Query};

/// What the page currently shows for a reference, without requiring
/// uniqueness. Used by the wait coordinator.
#[derive(Debug, Clone, Default)]
pub struct Sighting {
    /// The strategy that produced matches, if any
    pub query: Option<Query>,
    pub probe: Probe,
}

#[derive(Debug, Clone, Default)]
pub struct SelectorResolver {
    allow_positional: bool,
}

impl SelectorResolver {
    pub fn new(allow_positional: bool) -> Self {
        Self { allow_positional }
    }

    /// Concrete queries for `target`, in resolution order.
    pub fn candidates(&self, target: &ElementRef) -> Vec<Query> {
        target
            .ordered()
            .into_iter()
            .filter(|s| self.allow_positional || !s.is_positional())
            .map(|s| Query::for_ref(target, s))
            .collect()
    }

    /// Resolve `target` to exactly one element.
    pub async fn resolve(&self, driver: &dyn PageDriver, target: &ElementRef) -> E2eResult<Query> {
        if let Some(fragment) = &target.within_row {
            self.resolve_row(driver, fragment).await?;
        }

        let candidates = self.candidates(target);
        for query in &candidates {
            let probe = driver.probe(query).await?;
            match probe.matches {
                0 => continue,
                1 => {
                    if query.strategy.is_positional() {
                        warn!(
                            target = %target,
                            query = %query,
                            "Resolved by positional fallback; this breaks if the controls are reordered"
                        );
                    } else {
                        debug!(target = %target, query = %query, "Resolved");
                    }
                    return Ok(query.clone());
                }
                count => {
                    return Err(E2eError::AmbiguousMatch {
                        reference: format!("{} via {}", target, query),
                        count,
                    });
                }
            }
        }

        Err(E2eError::ElementNotFound {
            reference: target.to_string(),
            tried: describe_tried(&candidates),
        })
    }

    /// Find the unique listing row containing `fragment`.
    pub async fn resolve_row(&self, driver: &dyn PageDriver, fragment: &str) -> E2eResult<Query> {
        let rows = Query::rows(fragment);
        let probe = driver.probe(&rows).await?;
        match probe.matches {
            1 => Ok(rows),
            0 => Err(E2eError::ElementNotFound {
                reference: format!("row containing '{}'", fragment),
                tried: rows.to_string(),
            }),
            count => Err(E2eError::AmbiguousMatch {
                reference: format!("row containing '{}'", fragment),
                count,
            }),
        }
    }

    /// Report what the page shows for `target` right now.
    ///
    /// Missing rows count as no matches; several rows for the scope is still
    /// an `AmbiguousMatch`.
    pub async fn locate(&self, driver: &dyn PageDriver, target: &ElementRef) -> E2eResult<Sighting> {
        if let Some(fragment) = &target.within_row {
            match self.resolve_row(driver, fragment).await {
                Ok(_) => {}
                Err(E2eError::ElementNotFound { .. }) => return Ok(Sighting::default()),
                Err(e) => return Err(e),
            }
        }

        for query in self.candidates(target) {
            let probe = driver.probe(&query).await?;
            if probe.matches > 0 {
                return Ok(Sighting {
                    query: Some(query),
                    probe,
                });
            }
        }
        Ok(Sighting::default())
    }
}

fn describe_tried(candidates: &[Query]) -> String {
    if candidates.is_empty() {
        return "no usable strategy".to_string();
    }
    candidates
        .iter()
        .map(|q| q.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
