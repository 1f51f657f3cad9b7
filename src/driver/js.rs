//! Injected page scripts.
//!
//! Everything the driver knows about the live DOM comes from these scripts:
//! the extraction script serializes the element tree to JSON, the resolver
//! walks synthetic xpaths across iframe and shadow boundaries, and the idle
//! script watches network and mutation activity.

/// Serializes the page to the JSON element tree.
///
/// Same-origin iframe documents are spliced under their `iframe` node and
/// shadow roots appear as a synthetic `#shadow-root` child of the host.
/// Visibility, viewport membership (with iframe offset accumulation) and
/// topmost hit-testing are computed here so the Rust side never needs layout.
pub const EXTRACT_DOM: &str = r#"
(function() {
    function isVisible(el) {
        if (!el.checkVisibility || !el.checkVisibility({checkOpacity: false})) return false;
        const rect = el.getBoundingClientRect();
        return rect.width + rect.height >= 5;
    }

    function isTopmost(el, cx, cy) {
        let doc = el.ownerDocument;
        let hit = doc.elementFromPoint(cx, cy);
        while (hit && hit.shadowRoot) {
            const inner = hit.shadowRoot.elementFromPoint(cx, cy);
            if (!inner || inner === hit) break;
            hit = inner;
        }
        while (hit) {
            if (hit === el) return true;
            hit = hit.parentElement || (hit.getRootNode() instanceof ShadowRoot
                ? hit.getRootNode().host : null);
        }
        return false;
    }

    function serialize(el, offsetX, offsetY, viewport) {
        const rect = el.getBoundingClientRect();
        const x = rect.x + offsetX;
        const y = rect.y + offsetY;
        const cx = x + rect.width / 2;
        const cy = y + rect.height / 2;
        const visible = isVisible(el);
        const node = {
            tag_name: el.tagName.toLowerCase(),
            attributes: {},
            children: [],
            is_visible: visible,
            in_viewport: visible && cx >= 0 && cy >= 0
                && cx < viewport.width && cy < viewport.height,
            topmost: !visible || isTopmost(el, rect.x + rect.width / 2, rect.y + rect.height / 2),
            bounding_box: {x: x, y: y, width: rect.width, height: rect.height}
        };
        for (const attr of el.attributes) {
            node.attributes[attr.name] = attr.value;
        }
        let text = '';
        for (const child of el.childNodes) {
            if (child.nodeType === Node.TEXT_NODE) text += child.textContent;
        }
        text = text.trim();
        if (text) node.text = text;

        if (el.shadowRoot) {
            const shadow = {
                tag_name: '#shadow-root', attributes: {}, children: [],
                is_visible: false, in_viewport: false, topmost: true, bounding_box: null
            };
            for (const child of el.shadowRoot.children) {
                shadow.children.push(serialize(child, offsetX, offsetY, viewport));
            }
            node.children.push(shadow);
        }
        if (el.tagName === 'IFRAME') {
            try {
                const doc = el.contentDocument;
                if (doc && doc.documentElement) {
                    node.children.push(serialize(
                        doc.documentElement, x, y, viewport));
                }
            } catch (e) { /* cross-origin frame, skip */ }
        } else {
            for (const child of el.children) {
                node.children.push(serialize(child, offsetX, offsetY, viewport));
            }
        }
        return node;
    }

    const viewport = {width: window.innerWidth, height: window.innerHeight};
    return JSON.stringify(serialize(document.documentElement, 0, 0, viewport));
})()
"#;

/// Function body resolving a synthetic xpath to a live element.
///
/// The walker follows the same convention the snapshot uses to generate
/// paths: `tag[n]` segments counted among same-tag siblings, `iframe`
/// segments descending into the content document, `//` re-rooting into a
/// shadow root. Returns `null` when any segment fails.
pub const RESOLVE_FN: &str = r#"
    function __wpChild(parent, seg) {
        const m = seg.match(/^([^\[]+)(?:\[(\d+)\])?$/);
        if (!m) return null;
        const tag = m[1].toUpperCase();
        const idx = m[2] ? parseInt(m[2], 10) : 1;
        let n = 0;
        for (const child of parent.children) {
            if (child.tagName === tag) {
                n += 1;
                if (n === idx) return child;
            }
        }
        return null;
    }
    function __wpResolve(xpath) {
        const shadowParts = xpath.split('//');
        let node = null;
        for (let s = 0; s < shadowParts.length; s++) {
            let root;
            if (s === 0) {
                root = document;
            } else {
                if (!node || !node.shadowRoot) return null;
                root = node.shadowRoot;
                node = null;
            }
            const segs = shadowParts[s].split('/').filter(Boolean);
            for (const seg of segs) {
                if (node && node.tagName === 'IFRAME') {
                    const doc = node.contentDocument;
                    if (!doc || !doc.documentElement) return null;
                    root = doc;
                    node = null;
                }
                if (node === null) {
                    // Root level: documents expose their single document
                    // element, shadow roots their direct children
                    node = __wpChild(root.documentElement
                        ? {children: [root.documentElement]} : root, seg);
                } else {
                    node = __wpChild(node, seg);
                }
                if (!node) return null;
            }
        }
        return node;
    }
"#;

/// Waits until the page is idle: no in-flight fetch/XHR started through the
/// instrumented wrappers and no DOM mutation for the debounce window.
/// Resolves `true` on idle, `false` on timeout.
pub fn wait_dom_idle(timeout_ms: u64, debounce_ms: u64) -> String {
    format!(
        r#"
(function() {{
    if (!window.__wpNetHook) {{
        window.__wpNetHook = true;
        window.__wpPending = 0;
        const origFetch = window.fetch;
        window.fetch = function() {{
            window.__wpPending += 1;
            return origFetch.apply(this, arguments)
                .finally(() => {{ window.__wpPending -= 1; }});
        }};
        const origSend = XMLHttpRequest.prototype.send;
        XMLHttpRequest.prototype.send = function() {{
            window.__wpPending += 1;
            this.addEventListener('loadend', () => {{ window.__wpPending -= 1; }});
            return origSend.apply(this, arguments);
        }};
    }}
    return new Promise((resolve) => {{
        let lastMutation = Date.now();
        const observer = new MutationObserver(() => {{ lastMutation = Date.now(); }});
        observer.observe(document, {{childList: true, subtree: true, attributes: true}});
        const started = Date.now();
        const timer = setInterval(() => {{
            const quiet = Date.now() - lastMutation >= {debounce_ms};
            const idle = quiet && window.__wpPending === 0
                && document.readyState === 'complete';
            if (idle || Date.now() - started >= {timeout_ms}) {{
                clearInterval(timer);
                observer.disconnect();
                resolve(idle);
            }}
        }}, 50);
    }});
}})()
"#
    )
}

/// Click an element after scrolling it into view
pub fn click(xpath_json: &str) -> String {
    format!(
        r#"
(function() {{
    {RESOLVE_FN}
    const el = __wpResolve({xpath_json});
    if (!el) return false;
    el.scrollIntoView({{block: 'center', inline: 'center'}});
    el.click();
    return true;
}})()
"#
    )
}

/// Dispatch hover events on an element
pub fn hover(xpath_json: &str) -> String {
    format!(
        r#"
(function() {{
    {RESOLVE_FN}
    const el = __wpResolve({xpath_json});
    if (!el) return false;
    el.scrollIntoView({{block: 'center', inline: 'center'}});
    for (const type of ['mouseover', 'mouseenter', 'mousemove']) {{
        el.dispatchEvent(new MouseEvent(type, {{bubbles: true, cancelable: true}}));
    }}
    return true;
}})()
"#
    )
}

/// Set an element's value.
///
/// Select elements pick the option by value first, visible text second.
/// Text inputs are cleared and set through the native value setter so
/// framework change detection fires; `enter` additionally dispatches an
/// Enter key sequence.
pub fn set_value(xpath_json: &str, value_json: &str, enter: bool) -> String {
    format!(
        r#"
(function() {{
    {RESOLVE_FN}
    const el = __wpResolve({xpath_json});
    if (!el) return false;
    const value = {value_json};
    el.scrollIntoView({{block: 'center', inline: 'center'}});
    if (el.tagName === 'SELECT') {{
        let matched = false;
        for (const opt of el.options) {{
            if (opt.value === value) {{ el.value = opt.value; matched = true; break; }}
        }}
        if (!matched) {{
            for (const opt of el.options) {{
                if (opt.textContent.trim() === value) {{ el.value = opt.value; matched = true; break; }}
            }}
        }}
        if (!matched) return false;
        el.dispatchEvent(new Event('change', {{bubbles: true}}));
        return true;
    }}
    el.focus();
    if (el.isContentEditable) {{
        el.textContent = value;
    }} else {{
        const proto = el.tagName === 'TEXTAREA'
            ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
        const setter = Object.getOwnPropertyDescriptor(proto, 'value');
        if (setter && setter.set) {{ setter.set.call(el, value); }} else {{ el.value = value; }}
    }}
    el.dispatchEvent(new Event('input', {{bubbles: true}}));
    el.dispatchEvent(new Event('change', {{bubbles: true}}));
    if ({enter}) {{
        for (const type of ['keydown', 'keypress', 'keyup']) {{
            el.dispatchEvent(new KeyboardEvent(type, {{
                key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true, cancelable: true
            }}));
        }}
        if (el.form && el.form.requestSubmit) {{ el.form.requestSubmit(); }}
    }}
    return true;
}})()
"#
    )
}

/// Scroll the nearest scrollable ancestor of the target by
/// [`SCROLL_FACTOR`](crate::dom::SCROLL_FACTOR) of its dimension, falling
/// back to the page when nothing above it scrolls. With no target, scrolls
/// the page.
pub fn scroll(xpath_json: Option<&str>, sign_x: i64, sign_y: i64) -> String {
    let factor = crate::dom::SCROLL_FACTOR;
    let anchor = match xpath_json {
        Some(json) => format!("const el = __wpResolve({json});"),
        None => "const el = null;".to_string(),
    };
    format!(
        r#"
(function() {{
    {RESOLVE_FN}
    {anchor}
    function scrollable(node) {{
        while (node && node !== document.body && node !== document.documentElement) {{
            const style = getComputedStyle(node);
            const overflow = style.overflowY + style.overflowX;
            const can = (overflow.includes('auto') || overflow.includes('scroll'))
                && (node.scrollHeight > node.clientHeight || node.scrollWidth > node.clientWidth);
            if (can) return node;
            node = node.parentElement || (node.getRootNode() instanceof ShadowRoot
                ? node.getRootNode().host : null);
        }}
        return null;
    }}
    const container = el ? scrollable(el) : null;
    if (container) {{
        container.scrollBy({sign_x} * {factor} * container.clientWidth,
                           {sign_y} * {factor} * container.clientHeight);
    }} else {{
        window.scrollBy({sign_x} * {factor} * window.innerWidth,
                        {sign_y} * {factor} * window.innerHeight);
    }}
    return true;
}})()
"#
    )
}

/// Whether the element at the xpath exists in the live DOM
pub fn element_exists(xpath_json: &str) -> String {
    format!(
        r#"
(function() {{
    {RESOLVE_FN}
    return __wpResolve({xpath_json}) !== null;
}})()
"#
    )
}

/// Whether history can go back; uses the Navigation API when available
pub const CAN_GO_BACK: &str = r#"
(function() {
    if (window.navigation && typeof window.navigation.canGoBack === 'boolean') {
        return window.navigation.canGoBack;
    }
    return window.history.length > 1;
})()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_embed_arguments() {
        let js = click("\"/html/body/a\"");
        assert!(js.contains("__wpResolve(\"/html/body/a\")"));

        let js = set_value("\"/html/body/input\"", "\"hello\"", true);
        assert!(js.contains("\"hello\""));
        assert!(js.contains("requestSubmit"));

        let js = scroll(None, 0, 1);
        assert!(js.contains("0.75"));
        assert!(js.contains("const el = null;"));
    }

    #[test]
    fn test_wait_dom_idle_parameters() {
        let js = wait_dom_idle(10_000, 100);
        assert!(js.contains("10000"));
        assert!(js.contains("100"));
    }
}
