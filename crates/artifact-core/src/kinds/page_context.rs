//! Page Context Artifact Kind
//!
//! Snapshot of the browser page the agent is operating on.

use crate::kind::{private, replace_if_present, ArtifactKind};
use crate::metadata::now_ms;
use crate::validation::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Page context kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContextKind;

impl private::Sealed for PageContextKind {}

impl ArtifactKind for PageContextKind {
    type Data = PageContext;
    type Patch = PageContextPatch;

    const KIND: &'static str = "page_context";
    const VERSION: u32 = 1;

    fn default_patch() -> Self::Patch {
        PageContextPatch {
            url: Some(String::new()),
            title: Some(String::new()),
            text_content: Some(String::new()),
            links: Some(Vec::new()),
            forms: Some(Vec::new()),
            viewport: Some(Viewport::default()),
            screenshot: None,
            timestamp: Some(now_ms()),
        }
    }

    fn merge(current: &mut Self::Patch, delta: Self::Patch) {
        current.merge(delta);
    }

    fn check_invariants(page: &Self::Data) -> Result<(), ValidationError> {
        if let Some(bad) = page.links.iter().position(|l| l.href.trim().is_empty()) {
            return Err(ValidationError::single(
                Self::KIND,
                format!("/links/{bad}/href"),
                "link href is empty",
            ));
        }
        Ok(())
    }
}

/// Complete page context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub title: String,
    /// Visible text, already trimmed by the extractor
    pub text_content: String,
    pub links: Vec<Link>,
    pub forms: Vec<FormInfo>,
    pub viewport: Viewport,
    /// Base64 data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Capture time, epoch milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Link {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormField {
    pub name: String,
    /// Input type (`text`, `email`, `select`, ...)
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Partial page context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct PageContextPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forms: Option<Vec<FormInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl PageContextPatch {
    /// Top-level merge; lists and the viewport are replaced wholesale
    pub fn merge(&mut self, delta: Self) {
        replace_if_present(&mut self.url, delta.url);
        replace_if_present(&mut self.title, delta.title);
        replace_if_present(&mut self.text_content, delta.text_content);
        replace_if_present(&mut self.links, delta.links);
        replace_if_present(&mut self.forms, delta.forms);
        replace_if_present(&mut self.viewport, delta.viewport);
        replace_if_present(&mut self.screenshot, delta.screenshot);
        replace_if_present(&mut self.timestamp, delta.timestamp);
    }
}

impl From<PageContext> for PageContextPatch {
    fn from(page: PageContext) -> Self {
        Self {
            url: Some(page.url),
            title: Some(page.title),
            text_content: Some(page.text_content),
            links: Some(page.links),
            forms: Some(page.forms),
            viewport: Some(page.viewport),
            screenshot: page.screenshot,
            timestamp: Some(page.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_field_type_uses_wire_name() {
        let field = FormField {
            name: "email".into(),
            field_type: "email".into(),
            required: true,
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "email");
    }

    #[test]
    fn viewport_replaced_not_merged() {
        let mut current = PageContextKind::default_patch();
        current.viewport = Some(Viewport { width: 800, height: 600 });
        current.merge(PageContextPatch {
            viewport: Some(Viewport { width: 1024, height: 0 }),
            ..PageContextPatch::default()
        });
        assert_eq!(current.viewport, Some(Viewport { width: 1024, height: 0 }));
    }
}
