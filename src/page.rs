//! Page registry and HTML rendering.

use std::collections::BTreeMap;

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::gate::{FinishedPass, RenderBox};

const LAYOUT_TEMPLATE: &str = "layout";

const LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>{{title}}</title>
{{#if refresh}}<meta http-equiv="refresh" content="{{refresh.period_secs}};URL={{refresh.target}}">
{{/if}}<link rel="stylesheet" href="static/style.css" type="text/css">
</head>
<body>
{{#each boxes}}<div class="infobox"{{#if id}} id="{{id}}"{{/if}}>
<div class="infobox-header">{{title}}</div>
<div class="infobox-content">{{{body}}}</div>
</div>
{{/each}}</body>
</html>
"#;

/// A registered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSpec {
    pub name: String,
    pub title: String,
    pub full_access_only: bool,
}

impl PageSpec {
    pub fn new(name: impl Into<String>, title: impl Into<String>, full_access_only: bool) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            full_access_only,
        }
    }
}

/// Pages served under one plugin path.
pub struct PageRegistry {
    base_path: String,
    pages: RwLock<BTreeMap<String, PageSpec>>,
}

impl PageRegistry {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
            pages: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub async fn register(&self, page: PageSpec) {
        info!(page = %page.name, path = %self.path_of(&page.name), "Page registered");
        self.pages.write().await.insert(page.name.clone(), page);
    }

    pub async fn get(&self, name: &str) -> Option<PageSpec> {
        self.pages.read().await.get(name).cloned()
    }

    /// Returns `false` if no page has that name.
    pub async fn restrict_to_full_access_hosts(&self, name: &str, restrict: bool) -> bool {
        match self.pages.write().await.get_mut(name) {
            Some(page) => {
                page.full_access_only = restrict;
                true
            }
            None => false,
        }
    }

    pub fn path_of(&self, name: &str) -> String {
        format!("{}/{}", self.base_path, name)
    }
}

/// Meta-refresh instruction for pages that poll for a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Refresh {
    pub period_secs: u32,
    pub target: Option<String>,
}

impl Refresh {
    pub fn every(period_secs: u32) -> Self {
        Self {
            period_secs,
            target: None,
        }
    }

    pub fn to(period_secs: u32, target: impl Into<String>) -> Self {
        Self {
            period_secs,
            target: Some(target.into()),
        }
    }

    /// Fill in the target from the current request when none was given.
    fn resolved(&self, path: &str, query: Option<&str>) -> ResolvedRefresh {
        let target = match (&self.target, query) {
            (Some(target), _) => target.clone(),
            (None, Some(q)) if !q.is_empty() => format!("{path}?{q}"),
            (None, _) => path.to_string(),
        };
        ResolvedRefresh {
            period_secs: self.period_secs,
            target,
        }
    }
}

#[derive(Serialize)]
struct ResolvedRefresh {
    period_secs: u32,
    target: String,
}

#[derive(Serialize)]
struct LayoutData<'a> {
    title: &'a str,
    refresh: Option<ResolvedRefresh>,
    boxes: &'a [RenderBox],
}

/// Renders finished render passes to HTML.
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(LAYOUT_TEMPLATE, LAYOUT)?;
        Ok(Self { registry })
    }

    pub fn render(
        &self,
        title: &str,
        pass: &FinishedPass,
        refresh: Option<&Refresh>,
        request_path: &str,
        request_query: Option<&str>,
    ) -> Result<String, RenderError> {
        let data = LayoutData {
            title,
            refresh: refresh.map(|r| r.resolved(request_path, request_query)),
            boxes: &pass.boxes,
        };
        self.registry.render(LAYOUT_TEMPLATE, &data)
    }
}
