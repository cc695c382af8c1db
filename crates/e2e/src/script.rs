//! Page-side JavaScript for the Chromium backend
//!
//! Each function compiles a [`Query`] into a self-contained expression that
//! re-runs the lookup against the live DOM and returns its result as a JSON
//! string. Nothing survives between evaluations except the one-shot
//! `data-e2e-ref` mark used to hand an element to CDP input dispatch.

use serde_json::{json, Value};

use crate::error::E2eResult;
use crate::locator::{Choice, Query};

/// Attribute carrying the token of the element about to receive input.
pub const MARK_ATTRIBUTE: &str = "data-e2e-ref";

const LIB: &str = r#"
const lib = (() => {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const matches = (actual, expected, exact) => {
    const a = norm(actual);
    const e = norm(expected);
    return exact ? a === e : a.includes(e);
  };
  const INPUT_ROLES = {
    button: 'button', submit: 'button', reset: 'button', image: 'button',
    checkbox: 'checkbox', radio: 'radio', number: 'spinbutton',
    range: 'slider', search: 'searchbox',
  };
  const implicitRole = (el) => {
    switch (el.tagName.toLowerCase()) {
      case 'a': return el.hasAttribute('href') ? 'link' : null;
      case 'button': return 'button';
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'select': return el.multiple || el.size > 1 ? 'listbox' : 'combobox';
      case 'textarea': return 'textbox';
      case 'option': return 'option';
      case 'tr': return 'row';
      case 'td': return 'cell';
      case 'th': return 'columnheader';
      case 'table': return 'table';
      case 'ul': case 'ol': return 'list';
      case 'li': return 'listitem';
      case 'dialog': return 'dialog';
      case 'nav': return 'navigation';
      case 'input': {
        const type = (el.getAttribute('type') || 'text').toLowerCase();
        if (type === 'hidden') return null;
        return INPUT_ROLES[type] || 'textbox';
      }
      default: return null;
    }
  };
  const roleOf = (el) => {
    const explicit = (el.getAttribute('role') || '').trim().split(/\s+/)[0];
    return explicit || implicitRole(el);
  };
  const labelOf = (el) => {
    const ids = el.getAttribute('aria-labelledby');
    if (ids) {
      const text = ids.split(/\s+/)
        .map((id) => document.getElementById(id))
        .filter(Boolean)
        .map((n) => n.textContent)
        .join(' ');
      if (norm(text)) return text;
    }
    const aria = el.getAttribute('aria-label');
    if (aria && norm(aria)) return aria;
    if (el.labels && el.labels.length) {
      return Array.from(el.labels).map((l) => l.textContent).join(' ');
    }
    return null;
  };
  const NAME_FROM_CONTENT = new Set([
    'button', 'link', 'heading', 'option', 'row', 'cell', 'columnheader',
    'tab', 'menuitem', 'listitem',
  ]);
  const nameOf = (el, role) => {
    const label = labelOf(el);
    if (label !== null) return label;
    if (NAME_FROM_CONTENT.has(role) && norm(el.textContent)) return el.textContent;
    return el.getAttribute('title') || el.getAttribute('placeholder') || '';
  };
  const ariaHidden = (el) => {
    for (let n = el; n && n.nodeType === 1; n = n.parentElement) {
      if (n.getAttribute('aria-hidden') === 'true') return true;
    }
    return false;
  };
  const isVisible = (el) => {
    if (!el.isConnected) return false;
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 && rect.height === 0) return false;
    for (let n = el; n && n.nodeType === 1; n = n.parentElement) {
      const style = getComputedStyle(n);
      if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') {
        return false;
      }
    }
    return true;
  };
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD', 'TITLE']);
  const elements = (root) => Array.from(root.querySelectorAll('*')).filter((el) => !SKIP.has(el.tagName));
  const rowsFor = (fragment) => elements(document).filter(
    (el) => roleOf(el) === 'row' && !ariaHidden(el) && matches(nameOf(el, 'row'), fragment, false)
  );
  const findIn = (root, s, exact) => {
    const all = elements(root);
    switch (s.by) {
      case 'role':
        return all.filter((el) => roleOf(el) === s.role && !ariaHidden(el)
          && (s.name == null || matches(nameOf(el, s.role), s.name, exact)));
      case 'label':
        return all.filter((el) => {
          const label = labelOf(el);
          return label !== null && matches(label, s.text, exact);
        });
      case 'placeholder':
        return all.filter((el) => el.hasAttribute('placeholder')
          && matches(el.getAttribute('placeholder'), s.text, exact));
      case 'title':
        return all.filter((el) => el.hasAttribute('title')
          && matches(el.getAttribute('title'), s.text, exact));
      case 'text': {
        const hits = all.filter((el) => matches(el.textContent, s.text, exact));
        return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
      }
      case 'positional': {
        const same = all.filter((el) => roleOf(el) === s.role && !ariaHidden(el));
        return s.index < same.length ? [same[s.index]] : [];
      }
      default:
        throw new Error('unknown strategy: ' + s.by);
    }
  };
  const find = (q) => {
    if (!q.scope) return findIn(document, q.strategy, q.exact);
    return rowsFor(q.scope).flatMap((row) => findIn(row, q.strategy, q.exact));
  };
  return { norm, roleOf, isVisible, find };
})();
"#;

fn wrap(query: &Query, args: Value, body: &str) -> E2eResult<String> {
    let query = serde_json::to_string(query)?;
    Ok(format!(
        "(() => {{\n{lib}\nconst q = {query};\nconst args = {args};\nconst result = (() => {{\n{body}\n}})();\nreturn JSON.stringify(result);\n}})()",
        lib = LIB,
        query = query,
        args = args,
        body = body,
    ))
}

/// `{matches, visible}`
pub fn probe(query: &Query) -> E2eResult<String> {
    wrap(
        query,
        Value::Null,
        "const found = lib.find(q);\nreturn { matches: found.length, visible: found.filter(lib.isVisible).length };",
    )
}

/// Tag the unique match with `token` and scroll it into view. `{count, ok}`
pub fn mark(query: &Query, token: &str) -> E2eResult<String> {
    wrap(
        query,
        json!({ "attribute": MARK_ATTRIBUTE, "token": token }),
        r#"document.querySelectorAll('[' + args.attribute + ']').forEach((el) => el.removeAttribute(args.attribute));
const found = lib.find(q);
if (found.length !== 1) return { count: found.length, ok: false };
found[0].setAttribute(args.attribute, args.token);
found[0].scrollIntoView({ block: 'center', inline: 'center' });
return { count: 1, ok: true };"#,
    )
}

/// `{count, info?}` where `info` deserializes as `ElementInfo`.
pub fn inspect(query: &Query) -> E2eResult<String> {
    wrap(
        query,
        Value::Null,
        r#"const found = lib.find(q);
if (found.length !== 1) return { count: found.length };
const el = found[0];
return {
  count: 1,
  info: {
    tag: el.tagName.toLowerCase(),
    role: lib.roleOf(el),
    disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
    read_only: !!el.readOnly || el.getAttribute('aria-readonly') === 'true',
    value: typeof el.value === 'string' ? el.value : null,
    visible: lib.isVisible(el),
  },
};"#,
    )
}

/// Set the value through the native setter so framework-managed inputs see
/// the change. `{count, ok, reason?}`
pub fn fill(query: &Query, value: &str) -> E2eResult<String> {
    wrap(
        query,
        json!({ "value": value }),
        r#"const found = lib.find(q);
if (found.length !== 1) return { count: found.length, ok: false };
const el = found[0];
if (el.disabled || el.readOnly) return { count: 1, ok: false, reason: 'element is not editable' };
if (typeof el.value !== 'string') {
  return { count: 1, ok: false, reason: 'element takes no value: ' + el.tagName.toLowerCase() };
}
el.focus();
const descriptor = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
if (descriptor && descriptor.set) descriptor.set.call(el, args.value); else el.value = args.value;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return { count: 1, ok: true };"#,
    )
}

/// Choose an option of a `<select>` by value, then by label. `{count, ok, reason?}`
pub fn select_native(query: &Query, choice: &Choice) -> E2eResult<String> {
    wrap(
        query,
        json!({ "value": choice.value, "label": choice.label }),
        r#"const found = lib.find(q);
if (found.length !== 1) return { count: found.length, ok: false };
const el = found[0];
if (el.tagName !== 'SELECT') return { count: 1, ok: false, reason: 'not a select: ' + el.tagName.toLowerCase() };
if (el.disabled) return { count: 1, ok: false, reason: 'select is disabled' };
const options = Array.from(el.options);
const option = options.find((o) => o.value === args.value)
  || options.find((o) => lib.norm(o.textContent) === lib.norm(args.label));
if (!option) return { count: 1, ok: false, reason: 'no option ' + args.value + ' / ' + args.label };
const descriptor = Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value');
descriptor.set.call(el, option.value);
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return { count: 1, ok: true };"#,
    )
}

/// CSS selector for an element tagged by [`mark`].
pub fn marked(token: &str) -> String {
    format!("[{}=\"{}\"]", MARK_ATTRIBUTE, token)
}
