use async_trait::async_trait;
use chromiumoxide::page::Page;
use consent_core::{Document, DomError, MouseEventKind, NodeId, Rect, Scope};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::shared::js::{self, build_js_call, node_call};
use crate::shared::to_dom_error;

/// A [`Document`] over the main frame of a live Chromium page.
#[derive(Clone)]
pub struct ChromiumDocument {
    page: Page,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Reply {
    gone: bool,
    invalid: bool,
    ids: Vec<u64>,
    value: Value,
}

impl ChromiumDocument {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn run(&self, func: &str, args: &[Value], action: &str) -> Result<Value, DomError> {
        let call = build_js_call(func, args);
        trace!(action, "evaluate");
        let result = self
            .page
            .evaluate(call)
            .await
            .map_err(|e| to_dom_error(e, action))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn on_node(&self, node: NodeId, body: &str, arg: Value, action: &str) -> Result<Value, DomError> {
        let raw = self
            .run(&node_call(body), &[json!(node.0), arg], action)
            .await?;
        let reply: Reply = serde_json::from_value(raw).map_err(|e| to_dom_error(e, action))?;
        if reply.gone {
            return Err(DomError::NodeGone(node.0));
        }
        Ok(reply.value)
    }

    async fn string(&self, func: &str, action: &str) -> Result<String, DomError> {
        Ok(self
            .run(func, &[], action)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait(?Send)]
impl Document for ChromiumDocument {
    async fn location(&self) -> Result<String, DomError> {
        self.string(js::page::LOCATION, "location").await
    }

    async fn is_top_frame(&self) -> Result<bool, DomError> {
        Ok(self
            .run(js::page::IS_TOP_FRAME, &[], "is_top_frame")
            .await?
            .as_bool()
            .unwrap_or(true))
    }

    async fn ready_state(&self) -> Result<String, DomError> {
        self.string(js::page::READY_STATE, "ready_state").await
    }

    async fn cookie(&self) -> Result<String, DomError> {
        self.string(js::page::COOKIE, "cookie").await
    }

    async fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let scope_id = scope.node().map_or(Value::Null, |n| json!(n.0));
        let raw = self
            .run(js::element::QUERY_ALL, &[scope_id, json!(selector)], "query_all")
            .await?;
        let reply: Reply = serde_json::from_value(raw).map_err(|e| to_dom_error(e, "query_all"))?;
        if reply.invalid {
            return Err(DomError::InvalidSelector(selector.to_string()));
        }
        if reply.gone {
            return Err(DomError::NodeGone(scope.node().map_or(0, |n| n.0)));
        }
        Ok(reply.ids.into_iter().map(NodeId).collect())
    }

    async fn text_content(&self, node: NodeId) -> Result<String, DomError> {
        let value = self
            .on_node(node, js::element::TEXT_CONTENT, Value::Null, "text_content")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn computed_style(&self, node: NodeId, property: &str) -> Result<Option<String>, DomError> {
        let value = self
            .on_node(node, js::element::COMPUTED_STYLE, json!(property), "computed_style")
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn offset_height(&self, node: NodeId) -> Result<f64, DomError> {
        let value = self
            .on_node(node, js::element::OFFSET_HEIGHT, Value::Null, "offset_height")
            .await?;
        Ok(value.as_f64().unwrap_or(0.0))
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool, DomError> {
        let value = self
            .on_node(node, js::element::IS_VISIBLE, Value::Null, "is_visible")
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool, DomError> {
        let value = self
            .on_node(node, js::element::IS_CHECKED, Value::Null, "is_checked")
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, node: NodeId) -> Result<(), DomError> {
        self.on_node(node, js::element::CLICK, Value::Null, "click")
            .await
            .map(|_| ())
    }

    async fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        self.on_node(node, js::element::ADD_CLASS, json!(class), "add_class")
            .await
            .map(|_| ())
    }

    async fn bounding_rect(&self, node: NodeId) -> Result<Rect, DomError> {
        let value = self
            .on_node(node, js::element::BOUNDING_RECT, Value::Null, "bounding_rect")
            .await?;
        serde_json::from_value(value).map_err(|e| to_dom_error(e, "bounding_rect"))
    }

    async fn dispatch_mouse(
        &self,
        node: NodeId,
        kind: MouseEventKind,
        client_x: f64,
        client_y: f64,
    ) -> Result<(), DomError> {
        let arg = json!({ "kind": kind, "x": client_x, "y": client_y });
        self.on_node(node, js::element::DISPATCH_MOUSE, arg, "dispatch_mouse")
            .await
            .map(|_| ())
    }

    async fn append_style(&self, style_id: &str, css: &str) -> Result<(), DomError> {
        self.run(js::style::APPEND_STYLE, &[json!(style_id), json!(css)], "append_style")
            .await
            .map(|_| ())
    }

    async fn remove_style(&self, style_id: &str) -> Result<bool, DomError> {
        Ok(self
            .run(js::style::REMOVE_STYLE, &[json!(style_id)], "remove_style")
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn evaluate(&self, code: &str) -> Result<Value, DomError> {
        self.run(js::page::EVAL_IN_PAGE, &[json!(code)], "evaluate")
            .await
    }

    async fn close(&self) -> Result<(), DomError> {
        self.run(js::page::CLOSE, &[], "close").await.map(|_| ())
    }
}
