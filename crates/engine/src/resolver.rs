//! Element lookup for the generic action language.
//!
//! Filters apply in a fixed order: selector, text, style, display, frame,
//! child. Each one only narrows the candidates of the previous.

use async_recursion::async_recursion;
use consent_core::{Document, DomError, ElementQuery, MatchKind, Matcher, NodeId, PresenceMatcher, Scope};
use tracing::warn;

/// A resolved target together with the parent it was found under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolved {
    pub parent: Option<NodeId>,
    pub target: Option<NodeId>,
}

pub struct Resolver<'a> {
    doc: &'a dyn Document,
}

impl<'a> Resolver<'a> {
    pub fn new(doc: &'a dyn Document) -> Self {
        Self { doc }
    }

    /// All elements below `within` that pass every filter of `query`.
    #[async_recursion(?Send)]
    pub async fn find_elements(
        &self,
        query: &ElementQuery,
        within: Scope,
    ) -> Result<Vec<NodeId>, DomError> {
        let mut candidates = self.doc.query_all(within, &query.selector).await?;

        if let Some(filter) = &query.text_filter {
            let mut kept = Vec::with_capacity(candidates.len());
            for node in candidates {
                if filter.matches(&self.doc.text_content(node).await?) {
                    kept.push(node);
                }
            }
            candidates = kept;
        }

        if !query.style_filters.is_empty() {
            let mut kept = Vec::with_capacity(candidates.len());
            'nodes: for node in candidates {
                for filter in &query.style_filters {
                    let actual = self.doc.computed_style(node, &filter.property).await?;
                    if !filter.keeps(actual.as_deref()) {
                        continue 'nodes;
                    }
                }
                kept.push(node);
            }
            candidates = kept;
        }

        if let Some(displayed) = query.display_filter {
            let mut kept = Vec::with_capacity(candidates.len());
            for node in candidates {
                if (self.doc.offset_height(node).await? != 0.0) == displayed {
                    kept.push(node);
                }
            }
            candidates = kept;
        }

        if let Some(in_frame) = query.iframe_filter {
            let framed = !self.doc.is_top_frame().await?;
            if framed != in_frame {
                candidates.clear();
            }
        }

        if let Some(child) = &query.child_filter {
            let mut kept = Vec::with_capacity(candidates.len());
            for node in candidates {
                if self.find(child, Scope::Node(node)).await?.target.is_some() {
                    kept.push(node);
                }
            }
            candidates = kept;
        }

        Ok(candidates)
    }

    /// First match of `matcher`. With a parent query the target is searched
    /// inside the first parent only; no parent match means no target.
    pub async fn find(&self, matcher: &Matcher, scope: Scope) -> Result<Resolved, DomError> {
        let search_root = match &matcher.parent {
            Some(parent_query) => {
                let parents = self.find_elements(parent_query, scope).await?;
                if parents.len() > 1 {
                    warn!(
                        selector = %parent_query.selector,
                        count = parents.len(),
                        "multiple parents found, using the first"
                    );
                }
                match parents.first() {
                    Some(parent) => Some(*parent),
                    None => return Ok(Resolved::default()),
                }
            }
            None => None,
        };

        let within = search_root.map(Scope::Node).unwrap_or(scope);
        let targets = self.find_elements(&matcher.target, within).await?;
        if targets.len() > 1 {
            warn!(
                selector = %matcher.target.selector,
                count = targets.len(),
                "multiple targets found, using the first"
            );
        }

        Ok(Resolved {
            parent: search_root,
            target: targets.first().copied(),
        })
    }

    /// Every match of `matcher`, paired with the parent it was found under.
    pub async fn find_all(&self, matcher: &Matcher, scope: Scope) -> Result<Vec<Resolved>, DomError> {
        let Some(parent_query) = &matcher.parent else {
            let targets = self.find_elements(&matcher.target, scope).await?;
            return Ok(targets
                .into_iter()
                .map(|target| Resolved {
                    parent: None,
                    target: Some(target),
                })
                .collect());
        };

        let mut out = Vec::new();
        for parent in self.find_elements(parent_query, scope).await? {
            for target in self.find_elements(&matcher.target, Scope::Node(parent)).await? {
                out.push(Resolved {
                    parent: Some(parent),
                    target: Some(target),
                });
            }
        }
        Ok(out)
    }

    /// `css` matchers need a target; `checkbox` matchers a checked one.
    pub async fn matches(&self, matcher: &PresenceMatcher, scope: Scope) -> Result<bool, DomError> {
        let resolved = self.find(&matcher.matcher, scope).await?;
        match (matcher.kind, resolved.target) {
            (_, None) => Ok(false),
            (MatchKind::Css, Some(_)) => Ok(true),
            (MatchKind::Checkbox, Some(node)) => self.doc.is_checked(node).await,
        }
    }
}
