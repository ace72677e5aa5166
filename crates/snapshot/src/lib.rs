//! Static HTML snapshot implementing [`Document`].
//!
//! The markup itself never changes; page side effects (clicks, classes,
//! style sheets, pointer events) are recorded in an event log and the few
//! that matter for lookups (checked state, removals, display overrides) are
//! kept as overlays on top of the parsed tree.

mod sink;
mod style;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use consent_core::{Document, DomError, MouseEventKind, NodeId, Rect, Scope};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

pub use sink::RecordingSink;
pub use style::InlineStyle;

/// Default height of a displayed element without an explicit one.
const DEFAULT_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    Click(NodeId),
    AddClass(NodeId, String),
    Mouse {
        node: NodeId,
        kind: MouseEventKind,
        x: f64,
        y: f64,
    },
    Evaluate(String),
    Close,
}

type ClickHook = Rc<dyn Fn(&SnapshotDocument)>;

struct PageState {
    url: String,
    top_frame: bool,
    ready_state: String,
    cookie: String,
    checked: HashMap<NodeId, bool>,
    classes: HashMap<NodeId, Vec<String>>,
    removed: HashSet<NodeId>,
    displayed: HashMap<NodeId, bool>,
    styles: BTreeMap<String, String>,
    evals: HashMap<String, Value>,
    hooks: Vec<(Selector, ClickHook)>,
    events: Vec<DomEvent>,
}

pub struct SnapshotDocument {
    html: Html,
    elements: Vec<ego_tree::NodeId>,
    ids: HashMap<ego_tree::NodeId, NodeId>,
    state: RefCell<PageState>,
}

fn parse_selector(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|_| DomError::InvalidSelector(selector.to_string()))
}

impl SnapshotDocument {
    pub fn parse(markup: &str) -> Self {
        let html = Html::parse_document(markup);
        let elements: Vec<ego_tree::NodeId> = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| el.id())
            .collect();
        let ids = elements
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, NodeId(idx as u64)))
            .collect();

        Self {
            html,
            elements,
            ids,
            state: RefCell::new(PageState {
                url: "https://snapshot.test/".to_string(),
                top_frame: true,
                ready_state: "complete".to_string(),
                cookie: String::new(),
                checked: HashMap::new(),
                classes: HashMap::new(),
                removed: HashSet::new(),
                displayed: HashMap::new(),
                styles: BTreeMap::new(),
                evals: HashMap::new(),
                hooks: Vec::new(),
                events: Vec::new(),
            }),
        }
    }

    pub fn with_url(self, url: &str) -> Self {
        self.state.borrow_mut().url = url.to_string();
        self
    }

    pub fn in_frame(self) -> Self {
        self.state.borrow_mut().top_frame = false;
        self
    }

    pub fn with_cookie(self, cookie: &str) -> Self {
        self.state.borrow_mut().cookie = cookie.to_string();
        self
    }

    pub fn set_cookie(&self, cookie: &str) {
        self.state.borrow_mut().cookie = cookie.to_string();
    }

    /// Scripted result for an exact piece of page code.
    pub fn with_eval(self, code: &str, result: Value) -> Self {
        self.set_eval(code, result);
        self
    }

    pub fn set_eval(&self, code: &str, result: Value) {
        self.state
            .borrow_mut()
            .evals
            .insert(code.to_string(), result);
    }

    pub fn set_ready_state(&self, ready_state: &str) {
        self.state.borrow_mut().ready_state = ready_state.to_string();
    }

    /// Runs `hook` after every click on an element matching `selector`.
    pub fn on_click<F>(&self, selector: &str, hook: F) -> Result<(), DomError>
    where
        F: Fn(&SnapshotDocument) + 'static,
    {
        let selector = parse_selector(selector)?;
        self.state
            .borrow_mut()
            .hooks
            .push((selector, Rc::new(hook)));
        Ok(())
    }

    /// Detaches every element matching `selector` (and its subtree).
    pub fn remove(&self, selector: &str) {
        let nodes = self.select_raw(selector);
        self.state.borrow_mut().removed.extend(nodes);
    }

    /// Forces the display state of every element matching `selector`.
    pub fn set_displayed(&self, selector: &str, displayed: bool) {
        let nodes = self.select_raw(selector);
        let mut state = self.state.borrow_mut();
        for node in nodes {
            state.displayed.insert(node, displayed);
        }
    }

    pub fn first(&self, selector: &str) -> Option<NodeId> {
        self.select_raw(selector).into_iter().next()
    }

    pub fn events(&self) -> Vec<DomEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                DomEvent::Click(node) => Some(*node),
                _ => None,
            })
            .collect()
    }

    pub fn was_clicked(&self, selector: &str) -> bool {
        let clicks = self.clicks();
        self.select_raw(selector)
            .iter()
            .any(|node| clicks.contains(node))
    }

    pub fn style_text(&self, style_id: &str) -> Option<String> {
        self.state.borrow().styles.get(style_id).cloned()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        if self
            .state
            .borrow()
            .classes
            .get(&node)
            .is_some_and(|added| added.iter().any(|c| c == class))
        {
            return true;
        }
        self.element(node)
            .ok()
            .and_then(|el| el.value().attr("class").map(|c| c.split_whitespace().any(|c| c == class)))
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .borrow()
            .events
            .iter()
            .any(|e| matches!(e, DomEvent::Close))
    }

    fn select_raw(&self, selector: &str) -> Vec<NodeId> {
        let Ok(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        self.html
            .select(&selector)
            .filter_map(|el| self.ids.get(&el.id()).copied())
            .collect()
    }

    fn element(&self, node: NodeId) -> Result<ElementRef<'_>, DomError> {
        let raw = self
            .elements
            .get(node.0 as usize)
            .ok_or(DomError::NodeGone(node.0))?;
        self.html
            .tree
            .get(*raw)
            .and_then(ElementRef::wrap)
            .ok_or(DomError::NodeGone(node.0))
    }

    /// The element and its element ancestors, innermost first.
    fn lineage(&self, node: NodeId) -> Result<Vec<NodeId>, DomError> {
        let el = self.element(node)?;
        let mut out = vec![node];
        out.extend(
            el.ancestors()
                .filter_map(ElementRef::wrap)
                .filter_map(|a| self.ids.get(&a.id()).copied()),
        );
        Ok(out)
    }

    fn attached(&self, node: NodeId) -> bool {
        let state = self.state.borrow();
        match self.lineage(node) {
            Ok(lineage) => !lineage.iter().any(|n| state.removed.contains(n)),
            Err(_) => false,
        }
    }

    fn live_element(&self, node: NodeId) -> Result<ElementRef<'_>, DomError> {
        if !self.attached(node) {
            return Err(DomError::NodeGone(node.0));
        }
        self.element(node)
    }

    fn inline_style(&self, node: NodeId) -> Result<InlineStyle, DomError> {
        let el = self.element(node)?;
        Ok(InlineStyle::parse(el.value().attr("style").unwrap_or("")))
    }

    /// Own display state, ignoring ancestors.
    fn self_displayed(&self, node: NodeId) -> Result<bool, DomError> {
        if let Some(forced) = self.state.borrow().displayed.get(&node) {
            return Ok(*forced);
        }
        let el = self.element(node)?;
        if el.value().attr("hidden").is_some() {
            return Ok(false);
        }
        Ok(self.inline_style(node)?.get("display") != Some("none"))
    }

    fn rendered(&self, node: NodeId) -> Result<bool, DomError> {
        for n in self.lineage(node)? {
            if !self.self_displayed(n)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn run_click_hooks(&self, node: NodeId) -> Result<(), DomError> {
        let el = self.element(node)?;
        let hooks: Vec<ClickHook> = self
            .state
            .borrow()
            .hooks
            .iter()
            .filter(|(selector, _)| selector.matches(&el))
            .map(|(_, hook)| Rc::clone(hook))
            .collect();
        for hook in hooks {
            hook(self);
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Document for SnapshotDocument {
    async fn location(&self) -> Result<String, DomError> {
        Ok(self.state.borrow().url.clone())
    }

    async fn is_top_frame(&self) -> Result<bool, DomError> {
        Ok(self.state.borrow().top_frame)
    }

    async fn ready_state(&self) -> Result<String, DomError> {
        Ok(self.state.borrow().ready_state.clone())
    }

    async fn cookie(&self) -> Result<String, DomError> {
        Ok(self.state.borrow().cookie.clone())
    }

    async fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let parsed = parse_selector(selector)?;
        let matches: Vec<NodeId> = match scope {
            Scope::Document => self
                .html
                .select(&parsed)
                .filter_map(|el| self.ids.get(&el.id()).copied())
                .collect(),
            Scope::Node(node) => self
                .live_element(node)?
                .select(&parsed)
                .filter_map(|el| self.ids.get(&el.id()).copied())
                .collect(),
        };
        Ok(matches.into_iter().filter(|n| self.attached(*n)).collect())
    }

    async fn text_content(&self, node: NodeId) -> Result<String, DomError> {
        Ok(self.live_element(node)?.text().collect())
    }

    async fn computed_style(&self, node: NodeId, property: &str) -> Result<Option<String>, DomError> {
        self.live_element(node)?;
        if property == "display" {
            if !self.self_displayed(node)? {
                return Ok(Some("none".to_string()));
            }
            let declared = self.inline_style(node)?.get("display").map(str::to_string);
            return Ok(Some(declared.unwrap_or_else(|| "block".to_string())));
        }
        Ok(self.inline_style(node)?.get(property).map(str::to_string))
    }

    async fn offset_height(&self, node: NodeId) -> Result<f64, DomError> {
        self.live_element(node)?;
        if !self.rendered(node)? {
            return Ok(0.0);
        }
        Ok(self
            .inline_style(node)?
            .pixels("height")
            .unwrap_or(DEFAULT_HEIGHT))
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool, DomError> {
        self.live_element(node)?;
        if self.inline_style(node)?.get("position") == Some("fixed") {
            return self.self_displayed(node);
        }
        self.rendered(node)
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool, DomError> {
        let el = self.live_element(node)?;
        if let Some(checked) = self.state.borrow().checked.get(&node) {
            return Ok(*checked);
        }
        Ok(el.value().attr("checked").is_some())
    }

    async fn click(&self, node: NodeId) -> Result<(), DomError> {
        let el = self.live_element(node)?;
        let toggles = el.value().name() == "input"
            && matches!(el.value().attr("type"), Some("checkbox") | Some("radio"));
        let checked = self.is_checked(node).await?;
        {
            let mut state = self.state.borrow_mut();
            state.events.push(DomEvent::Click(node));
            if toggles {
                state.checked.insert(node, !checked);
            }
        }
        debug!(node = %node, "click");
        self.run_click_hooks(node)
    }

    async fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        self.live_element(node)?;
        let mut state = self.state.borrow_mut();
        state
            .classes
            .entry(node)
            .or_default()
            .push(class.to_string());
        state.events.push(DomEvent::AddClass(node, class.to_string()));
        Ok(())
    }

    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, DomError> {
        self.live_element(node)?;
        let style = self.inline_style(node)?;
        Ok(Rect {
            left: style.pixels("left").unwrap_or(0.0),
            top: style.pixels("top").unwrap_or(0.0),
            width: style.pixels("width").unwrap_or(0.0),
            height: style.pixels("height").unwrap_or(0.0),
        })
    }

    async fn dispatch_mouse(
        &self,
        node: NodeId,
        kind: MouseEventKind,
        client_x: f64,
        client_y: f64,
    ) -> Result<(), DomError> {
        self.live_element(node)?;
        self.state.borrow_mut().events.push(DomEvent::Mouse {
            node,
            kind,
            x: client_x,
            y: client_y,
        });
        Ok(())
    }

    async fn append_style(&self, style_id: &str, css: &str) -> Result<(), DomError> {
        self.state
            .borrow_mut()
            .styles
            .entry(style_id.to_string())
            .or_default()
            .push_str(css);
        Ok(())
    }

    async fn remove_style(&self, style_id: &str) -> Result<bool, DomError> {
        Ok(self.state.borrow_mut().styles.remove(style_id).is_some())
    }

    async fn evaluate(&self, code: &str) -> Result<Value, DomError> {
        let mut state = self.state.borrow_mut();
        state.events.push(DomEvent::Evaluate(code.to_string()));
        state
            .evals
            .get(code)
            .cloned()
            .ok_or_else(|| DomError::Script(format!("no scripted result for `{}`", code)))
    }

    async fn close(&self) -> Result<(), DomError> {
        self.state.borrow_mut().events.push(DomEvent::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"
        <html><body>
          <div id="banner" style="position: fixed; height: 80px; left: 10px; top: 500px; width: 300px">
            <p class="text">We use Cookies</p>
            <button id="reject">Reject all</button>
            <input id="ads" type="checkbox" checked>
          </div>
          <div id="gone" style="display: none"><span class="inner">x</span></div>
          <section hidden><a id="hidden-link">settings</a></section>
        </body></html>
    "#;

    #[tokio::test]
    async fn scoped_queries_exclude_scope_element() {
        let doc = SnapshotDocument::parse(PAGE);
        let banner = doc.first("#banner").unwrap();

        let divs = doc.query_all(Scope::Node(banner), "div").await.unwrap();
        assert!(divs.is_empty());
        let buttons = doc.query_all(Scope::Node(banner), "button").await.unwrap();
        assert_eq!(buttons, vec![doc.first("#reject").unwrap()]);
    }

    #[tokio::test]
    async fn visibility_follows_display_chain() {
        let doc = SnapshotDocument::parse(PAGE);
        let inner = doc.first(".inner").unwrap();
        let link = doc.first("#hidden-link").unwrap();
        let banner = doc.first("#banner").unwrap();

        assert!(!doc.is_visible(inner).await.unwrap());
        assert!(!doc.is_visible(link).await.unwrap());
        assert!(doc.is_visible(banner).await.unwrap());
        assert_eq!(doc.offset_height(banner).await.unwrap(), 80.0);
        assert_eq!(doc.offset_height(inner).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn clicking_checkbox_toggles_and_runs_hooks() {
        let doc = SnapshotDocument::parse(PAGE);
        doc.on_click("#reject", |page| page.remove("#banner")).unwrap();
        let ads = doc.first("#ads").unwrap();

        doc.click(ads).await.unwrap();
        assert!(!doc.is_checked(ads).await.unwrap());

        let reject = doc.first("#reject").unwrap();
        doc.click(reject).await.unwrap();
        assert!(doc.query_all(Scope::Document, "#banner").await.unwrap().is_empty());
        assert_eq!(doc.click(reject).await, Err(DomError::NodeGone(reject.0)));
    }

    #[tokio::test]
    async fn styles_and_evals() {
        let doc = SnapshotDocument::parse(PAGE).with_eval("window.cmp", json!({"ok": true}));

        doc.append_style("a", "x {} ").await.unwrap();
        doc.append_style("a", "y {} ").await.unwrap();
        assert_eq!(doc.style_text("a").as_deref(), Some("x {} y {} "));
        assert!(doc.remove_style("a").await.unwrap());
        assert!(!doc.remove_style("a").await.unwrap());

        assert_eq!(doc.evaluate("window.cmp").await.unwrap(), json!({"ok": true}));
        assert!(matches!(doc.evaluate("boom()").await, Err(DomError::Script(_))));
    }

    #[tokio::test]
    async fn invalid_selector_is_reported() {
        let doc = SnapshotDocument::parse(PAGE);
        assert_eq!(
            doc.query_all(Scope::Document, "div[").await,
            Err(DomError::InvalidSelector("div[".into()))
        );
    }
}
