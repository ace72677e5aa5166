/// `(scopeId, selector)`: registers every match and replies with their ids.
/// `scopeId` null means the whole document.
pub const QUERY_ALL: &str = r#"
(scopeId, selector) => {
    const reg = window.__consentNodes ||
        (window.__consentNodes = { next: 1, byId: new Map(), ids: new WeakMap() });
    const root = scopeId === null ? document : reg.byId.get(scopeId);
    if (!root || (scopeId !== null && !root.isConnected)) return { gone: true };
    let found;
    try {
        found = root.querySelectorAll(selector);
    } catch (e) {
        return { invalid: true };
    }
    return {
        ids: Array.from(found).map((el) => {
            let id = reg.ids.get(el);
            if (id === undefined) {
                id = reg.next++;
                reg.ids.set(el, id);
                reg.byId.set(id, el);
            }
            return id;
        })
    };
}
"#;

pub const TEXT_CONTENT: &str = "(el) => el.textContent";

pub const COMPUTED_STYLE: &str = "(el, prop) => window.getComputedStyle(el)[prop] ?? null";

pub const OFFSET_HEIGHT: &str = "(el) => el.offsetHeight";

/// Fixed elements may be shown even when their parent is not.
pub const IS_VISIBLE: &str = r#"
(el) => {
    if (el.offsetParent !== null) return true;
    const css = window.getComputedStyle(el);
    return css.position === 'fixed' && css.display !== 'none';
}
"#;

pub const IS_CHECKED: &str = "(el) => !!el.checked";

pub const CLICK: &str = "(el) => { el.click(); return true; }";

pub const ADD_CLASS: &str = "(el, cls) => { el.classList.add(cls); return true; }";

pub const BOUNDING_RECT: &str = r#"
(el) => {
    const r = el.getBoundingClientRect();
    return { left: r.left, top: r.top, width: r.width, height: r.height };
}
"#;

/// `arg` is `{ kind, x, y }`.
pub const DISPATCH_MOUSE: &str = r#"
(el, arg) => {
    el.dispatchEvent(new MouseEvent(arg.kind, {
        bubbles: true, cancelable: true, view: window,
        clientX: arg.x, clientY: arg.y
    }));
    return true;
}
"#;
