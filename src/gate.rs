//! Access gate and render-pass lifecycle.
//!
//! Every inbound page request goes `Received → Gated`, then either
//! `Rendering → Rendered` or straight to `Denied`. The boxes collected along
//! the way belong to that one request and are never shared.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

pub const ACCESS_DENIED_TITLE: &str = "Access denied!";
pub const ACCESS_DENIED_BODY: &str = "Access to this page for hosts with full access rights only.";

/// How far the caller's host is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallerTrust {
    Restricted,
    Full,
}

/// `true` unless the page needs full access and the caller lacks it.
pub fn is_allowed(caller_trust: CallerTrust, page_requires_full_access: bool) -> bool {
    !page_requires_full_access || caller_trust == CallerTrust::Full
}

/// One content box on a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderBox {
    pub title: String,
    /// Raw HTML.
    pub body: String,
    pub id: Option<String>,
}

/// Boxes accumulated during one render pass, in insertion order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RenderBoxList {
    boxes: Vec<RenderBox>,
}

impl RenderBoxList {
    /// Single quotes in `body` are rewritten to double quotes so templates can
    /// be written with either.
    pub fn add(&mut self, title: impl Into<String>, body: &str, id: Option<&str>) {
        self.boxes.push(RenderBox {
            title: title.into(),
            body: body.replace('\'', "\""),
            id: id.map(str::to_string),
        });
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderBox> {
        self.boxes.iter()
    }

    pub fn into_vec(self) -> Vec<RenderBox> {
        self.boxes
    }
}

/// Fresh, empty box list. Call once per request before any rendering.
pub fn begin_render() -> RenderBoxList {
    RenderBoxList::default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderPhase {
    Received,
    Gated { allowed: bool },
    Rendering,
    Rendered,
    Denied,
}

/// Request-scoped render state.
#[derive(Debug)]
pub struct RenderPass {
    pub request_id: Uuid,
    phase: RenderPhase,
    boxes: RenderBoxList,
}

/// Output of a finished render pass.
#[derive(Debug)]
pub struct FinishedPass {
    pub request_id: Uuid,
    pub phase: RenderPhase,
    pub boxes: Vec<RenderBox>,
}

impl RenderPass {
    /// Start a pass and gate it. A denied pass already holds its only box.
    pub fn begin(caller_trust: CallerTrust, page_requires_full_access: bool) -> Self {
        let mut pass = Self {
            request_id: Uuid::new_v4(),
            phase: RenderPhase::Received,
            boxes: begin_render(),
        };

        let allowed = is_allowed(caller_trust, page_requires_full_access);
        pass.phase = RenderPhase::Gated { allowed };
        debug!(request_id = %pass.request_id, ?caller_trust, allowed, "Request gated");

        if allowed {
            pass.phase = RenderPhase::Rendering;
        } else {
            pass.boxes.add(ACCESS_DENIED_TITLE, ACCESS_DENIED_BODY, None);
            pass.phase = RenderPhase::Denied;
        }
        pass
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn is_rendering(&self) -> bool {
        self.phase == RenderPhase::Rendering
    }

    /// Add a box. Ignored unless the pass was allowed.
    pub fn add_box(&mut self, title: impl Into<String>, body: &str, id: Option<&str>) {
        if self.is_rendering() {
            self.boxes.add(title, body, id);
        }
    }

    pub fn boxes(&self) -> &RenderBoxList {
        &self.boxes
    }

    pub fn finish(self) -> FinishedPass {
        let phase = match self.phase {
            RenderPhase::Rendering => RenderPhase::Rendered,
            other => other,
        };
        FinishedPass {
            request_id: self.request_id,
            phase,
            boxes: self.boxes.into_vec(),
        }
    }
}
