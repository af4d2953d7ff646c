use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::driver::{DriverError, PageDriver};
use crate::error::AgentError;
use crate::types::{
    ELEMENT_TEXT_MAX_CHARS, ElementRef, FormRef, PageSnapshot, SNAPSHOT_MAX_ELEMENTS,
    SNAPSHOT_TEXT_MAX_CHARS, truncate_chars,
};

/// Visible text of the page. Reads `innerText`, which already skips
/// script and style content, so nothing is removed from the document.
const TEXT_JS: &str = r#"
(() => {
  const body = document.body;
  if (!body) return '';
  return body.innerText || body.textContent || '';
})()
"#;

/// Interactive elements, in document order, tagged with `data-agent-id` so
/// every entry has a selector that resolves to exactly that node. Tags from
/// earlier captures are removed first. Returns a JSON string.
const ELEMENTS_JS: &str = r#"
(() => {
  const QUERY = 'button, input, select, textarea, a[href], [onclick], [role="button"]';
  const MAX = 50;
  document.querySelectorAll('[data-agent-id]').forEach(el => el.removeAttribute('data-agent-id'));
  const out = [];
  let id = 0;
  for (const el of document.querySelectorAll(QUERY)) {
    if (out.length >= MAX) break;
    if (el.offsetParent === null && getComputedStyle(el).position !== 'fixed') continue;
    if (el.type === 'hidden') continue;
    const eid = String(id++);
    el.setAttribute('data-agent-id', eid);
    out.push({
      tag: el.tagName.toLowerCase(),
      subtype: el.type || el.getAttribute('role') || '',
      visible_text: (el.innerText || el.value || '').trim().slice(0, 100),
      placeholder: el.placeholder || '',
      href: el.href || '',
      selector: '[data-agent-id="' + eid + '"]'
    });
  }
  return JSON.stringify(out);
})()
"#;

/// Forms and their fields. Returns a JSON string.
const FORMS_JS: &str = r#"
(() => {
  document.querySelectorAll('[data-agent-form]').forEach(el => el.removeAttribute('data-agent-form'));
  document.querySelectorAll('[data-agent-field]').forEach(el => el.removeAttribute('data-agent-field'));
  const forms = [];
  document.querySelectorAll('form').forEach((form, index) => {
    const fid = String(index);
    form.setAttribute('data-agent-form', fid);
    const fields = [];
    form.querySelectorAll('input, select, textarea').forEach((field, fieldIndex) => {
      if (field.type === 'hidden') return;
      const tag = 'f' + fid + '-' + fieldIndex;
      field.setAttribute('data-agent-field', tag);
      fields.push({
        name: field.name || '',
        subtype: field.type || field.tagName.toLowerCase(),
        placeholder: field.placeholder || '',
        required: !!field.required,
        selector: '[data-agent-field="' + tag + '"]'
      });
    });
    forms.push({
      action: form.action || '',
      method: (form.method || 'get').toLowerCase(),
      fields: fields,
      selector: '[data-agent-form="' + fid + '"]'
    });
  });
  return JSON.stringify(forms);
})()
"#;

/// Describe the current page.
///
/// Title and URL are mandatory: if the driver cannot produce them the page is
/// unusable and the error is returned. Text, elements and forms degrade to
/// empty with [`PageSnapshot::error`] set.
pub async fn capture_snapshot(driver: &dyn PageDriver) -> Result<PageSnapshot, AgentError> {
    let title = driver
        .title()
        .await
        .map_err(|e| AgentError::Snapshot(e.to_string()))?;
    let url = driver
        .url()
        .await
        .map_err(|e| AgentError::Snapshot(e.to_string()))?;

    let mut problems = Vec::new();

    let text = match driver.evaluate(TEXT_JS).await {
        Ok(value) => value.as_str().unwrap_or_default().to_string(),
        Err(e) => {
            problems.push(format!("text: {e}"));
            String::new()
        }
    };

    let mut elements: Vec<ElementRef> = match evaluate_json(driver, ELEMENTS_JS).await {
        Ok(elements) => elements,
        Err(e) => {
            problems.push(format!("elements: {e}"));
            Vec::new()
        }
    };
    elements.truncate(SNAPSHOT_MAX_ELEMENTS);
    for el in &mut elements {
        el.visible_text = truncate_chars(&el.visible_text, ELEMENT_TEXT_MAX_CHARS);
    }

    let forms: Vec<FormRef> = match evaluate_json(driver, FORMS_JS).await {
        Ok(forms) => forms,
        Err(e) => {
            problems.push(format!("forms: {e}"));
            Vec::new()
        }
    };

    let error = if problems.is_empty() {
        None
    } else {
        let joined = problems.join("; ");
        warn!(%url, "partial page snapshot: {joined}");
        Some(joined)
    };

    Ok(PageSnapshot {
        title,
        url,
        text: truncate_chars(&text, SNAPSHOT_TEXT_MAX_CHARS),
        elements,
        forms,
        error,
        captured_at: Utc::now(),
    })
}

async fn evaluate_json<T: DeserializeOwned>(
    driver: &dyn PageDriver,
    script: &str,
) -> Result<T, DriverError> {
    let value = driver.evaluate(script).await?;
    let raw = value
        .as_str()
        .ok_or_else(|| DriverError::failed("script did not return a JSON string"))?;
    serde_json::from_str(raw).map_err(|e| DriverError::failed(format!("bad script output: {e}")))
}
