use std::fmt::Write;

use crate::types::PageSnapshot;

const ACTION_SCHEMA: &str = r#"Respond with ONE JSON object and nothing else:
{"actions": [ <action>, ... ]}

Each <action> is one of:
- {"type":"click","selector":"<css>"}
- {"type":"type","selector":"<css>","text":"<text>"}
- {"type":"navigate","url":"https://..."}
- {"type":"wait","selector":"<css>","timeout":5000}
- {"type":"scroll","direction":"down","amount":500}
- {"type":"select","selector":"<css>","value":"<option value or label>"}
Add "completes_task": true to the action that finishes the task.

Rules:
1. Use selectors exactly as listed under INTERACTIVE ELEMENTS or FORMS.
2. Only the first action is executed; you will see the page again before the next one.
3. If the task is already accomplished, return {"actions": []}.
4. If the task cannot be done on this page, return {"success": false, "error": "<why>"}."#;

/// Prompt asking for the next action towards `task`.
pub fn task_analysis_prompt(snapshot: &PageSnapshot, task: &str) -> String {
    let mut prompt = String::from(
        "You are a browser automation agent controlling a real browser one action at a time.\n\n",
    );
    let _ = writeln!(prompt, "TASK: {task}\n");
    render_page(&mut prompt, snapshot);
    prompt.push('\n');
    prompt.push_str(ACTION_SCHEMA);
    prompt
}

/// Prompt asking for a different route after `error` interrupted `task`.
pub fn error_recovery_prompt(snapshot: &PageSnapshot, error: &str, task: &str) -> String {
    let mut prompt = String::from(
        "You are a browser automation agent. The last action failed and you must find another way.\n\n",
    );
    let _ = writeln!(prompt, "ORIGINAL TASK: {task}");
    let _ = writeln!(prompt, "ERROR: {error}\n");
    render_page(&mut prompt, snapshot);
    prompt.push_str(
        "\nDo not repeat the action that failed. Prefer a different selector, waiting for the element, \
         scrolling it into view, or navigating elsewhere.\n\n",
    );
    prompt.push_str(ACTION_SCHEMA);
    prompt
}

fn render_page(out: &mut String, snapshot: &PageSnapshot) {
    let _ = writeln!(out, "PAGE TITLE: {}", snapshot.title);
    let _ = writeln!(out, "PAGE URL: {}", snapshot.url);
    if let Some(err) = &snapshot.error {
        let _ = writeln!(out, "NOTE: page description is incomplete ({err})");
    }

    out.push_str("\nINTERACTIVE ELEMENTS:\n");
    if snapshot.elements.is_empty() {
        out.push_str("  (none found)\n");
    }
    for el in &snapshot.elements {
        let _ = write!(out, "  {} <{}", el.selector, el.tag);
        if !el.subtype.is_empty() {
            let _ = write!(out, " type={}", el.subtype);
        }
        out.push('>');
        if !el.visible_text.is_empty() {
            let _ = write!(out, " \"{}\"", el.visible_text);
        }
        if !el.placeholder.is_empty() {
            let _ = write!(out, " placeholder=\"{}\"", el.placeholder);
        }
        if !el.href.is_empty() {
            let _ = write!(out, " href={}", el.href);
        }
        out.push('\n');
    }

    if !snapshot.forms.is_empty() {
        out.push_str("\nFORMS:\n");
        for form in &snapshot.forms {
            let _ = writeln!(
                out,
                "  {} {} {}",
                form.selector,
                form.method.to_uppercase(),
                form.action
            );
            for field in &form.fields {
                let _ = writeln!(
                    out,
                    "    {} name={} type={}{}{}",
                    field.selector,
                    field.name,
                    field.subtype,
                    if field.placeholder.is_empty() {
                        String::new()
                    } else {
                        format!(" placeholder=\"{}\"", field.placeholder)
                    },
                    if field.required { " required" } else { "" }
                );
            }
        }
    }

    let _ = writeln!(out, "\nVISIBLE TEXT:\n{}", snapshot.text);
}
