pub const APPEND_STYLE: &str = r#"
(id, css) => {
    let style = document.getElementById(id);
    if (!style) {
        style = document.createElement('style');
        style.id = id;
        (document.head || document.documentElement).appendChild(style);
    }
    style.textContent += css;
    return true;
}
"#;

pub const REMOVE_STYLE: &str = r#"
(id) => {
    const style = document.getElementById(id);
    if (!style) return false;
    style.remove();
    return true;
}
"#;
