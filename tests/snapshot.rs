mod common;

use std::sync::atomic::Ordering;

use ai_browser_agent::AgentError;
use ai_browser_agent::dom::capture_snapshot;
use common::MockDriver;
use serde_json::json;

#[tokio::test]
async fn snapshot_carries_elements_and_forms() {
    let driver = MockDriver::default();
    *driver.forms.lock().unwrap() = json!([{
        "action": "https://example.com/search",
        "method": "get",
        "fields": [{"name": "q", "subtype": "text", "placeholder": "Search",
                    "required": true, "selector": "[data-agent-field=\"f0-0\"]"}],
        "selector": "[data-agent-form=\"0\"]"
    }]);

    let snapshot = capture_snapshot(&driver).await.unwrap();

    assert_eq!(snapshot.title, "Example Domain");
    assert_eq!(snapshot.url, "https://example.com/");
    assert!(snapshot.text.starts_with("Example Domain"));
    assert_eq!(snapshot.elements.len(), 1);
    assert_eq!(snapshot.elements[0].selector, "[data-agent-id=\"0\"]");
    assert_eq!(snapshot.forms.len(), 1);
    assert_eq!(snapshot.forms[0].fields[0].name, "q");
    assert!(snapshot.forms[0].fields[0].required);
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn snapshot_limits_are_enforced() {
    let driver = MockDriver::default();
    *driver.text.lock().unwrap() = "é".repeat(6000);
    let elements: Vec<_> = (0..60)
        .map(|i| {
            json!({
                "tag": "button",
                "visible_text": "x".repeat(150),
                "selector": format!("[data-agent-id=\"{i}\"]"),
            })
        })
        .collect();
    *driver.elements.lock().unwrap() = json!(elements);

    let snapshot = capture_snapshot(&driver).await.unwrap();

    assert_eq!(snapshot.text.chars().count(), 5000);
    assert_eq!(snapshot.elements.len(), 50);
    assert!(
        snapshot
            .elements
            .iter()
            .all(|e| e.visible_text.chars().count() == 100)
    );
}

#[tokio::test]
async fn broken_extraction_degrades_to_partial_snapshot() {
    let driver = MockDriver::default();
    driver.broken_extraction.store(true, Ordering::SeqCst);

    let snapshot = capture_snapshot(&driver).await.unwrap();

    assert_eq!(snapshot.title, "Example Domain");
    assert_eq!(snapshot.url, "https://example.com/");
    assert!(!snapshot.text.is_empty());
    assert!(snapshot.elements.is_empty());
    assert!(snapshot.forms.is_empty());
    let error = snapshot.error.expect("partial snapshot error");
    assert!(error.contains("elements:"));
    assert!(error.contains("forms:"));
}

#[tokio::test]
async fn closed_page_cannot_be_described() {
    let driver = MockDriver::default();
    driver.close();

    let err = capture_snapshot(&driver).await.unwrap_err();

    assert!(matches!(err, AgentError::Snapshot(_)));
}
