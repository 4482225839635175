//! Interactive element indexing.
//!
//! The LLM never sees raw HTML. Instead every visible link, button, input and
//! similar control is stamped with a `data-agent-index` attribute and listed
//! with a short label, and tools address elements by that index.

use serde::{Deserialize, Serialize};

/// Attribute stamped on indexed elements.
pub const INDEX_ATTRIBUTE: &str = "data-agent-index";

/// Collects visible interactive elements, numbers them, and returns their
/// descriptions as a JSON array.
pub const INDEX_ELEMENTS_SCRIPT: &str = r#"(() => {
  const selector = 'a[href], button, input, textarea, select, [role="button"], [role="link"], [role="option"], [role="menuitem"], [contenteditable="true"]';
  document.querySelectorAll('[data-agent-index]').forEach(el => el.removeAttribute('data-agent-index'));
  const out = [];
  let index = 0;
  for (const el of document.querySelectorAll(selector)) {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (rect.width === 0 || rect.height === 0 || style.visibility === 'hidden' || style.display === 'none') {
      continue;
    }
    el.setAttribute('data-agent-index', String(index));
    const text = (el.innerText || el.value || el.getAttribute('aria-label') || '').trim().replace(/\s+/g, ' ');
    out.push({
      index,
      tag: el.tagName.toLowerCase(),
      text: text.slice(0, 120),
      placeholder: el.getAttribute('placeholder'),
      href: el.getAttribute('href'),
    });
    index += 1;
  }
  return out;
})()"#;

/// A visible control the agent can click or type into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub index: u32,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
}

impl InteractiveElement {
    /// CSS selector addressing the element with `index`.
    pub fn selector(index: u32) -> String {
        format!("[{INDEX_ATTRIBUTE}=\"{index}\"]")
    }

    /// One-line description, e.g. `[3] <input placeholder="Search in Pizza Hut">`.
    pub fn describe(&self) -> String {
        let mut line = format!("[{}] <{}", self.index, self.tag);
        if let Some(placeholder) = self.placeholder.as_deref().filter(|p| !p.is_empty()) {
            line.push_str(&format!(" placeholder=\"{placeholder}\""));
        }
        if let Some(href) = self.href.as_deref().filter(|h| !h.is_empty()) {
            line.push_str(&format!(" href=\"{href}\""));
        }
        line.push('>');
        if !self.text.is_empty() {
            line.push(' ');
            line.push_str(&self.text);
        }
        line
    }
}

/// Decode the output of [`INDEX_ELEMENTS_SCRIPT`].
pub fn parse_elements(value: serde_json::Value) -> anyhow::Result<Vec<InteractiveElement>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}
