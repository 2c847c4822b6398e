//! Tenant authored knowledge snippets and their selection for a query

use crate::core::error::{Error, Result};
use crate::core::traits::ContextService;
use crate::core::validation;
use crate::infrastructure::entities::{Context, ContextKind};
use crate::infrastructure::repositories::is_unique_violation;
use crate::infrastructure::traits::{ContextRepository, TenantRepository};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::info;
use serde::Deserialize;
use sqlx::types::Json;

const MAX_KEYWORDS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDraft {
    #[serde(default)]
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    pub kind: Option<ContextKind>,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    #[serde(default)]
    pub always_include: bool,
    #[serde(default)]
    pub priority: i64,
    pub is_active: Option<bool>,
}

/// Picks the contexts to inject for `query`: active ones that are always included or whose
/// trigger keywords occur in the query (case-insensitive), highest priority first.
pub fn select_contexts<'a>(contexts: &'a [Context], query: &str) -> Vec<&'a Context> {
    let query = query.to_lowercase();

    let mut selected: Vec<&Context> = contexts
        .iter()
        .filter(|context| context.is_active)
        .filter(|context| {
            context.always_include
                || context
                    .trigger_keywords
                    .iter()
                    .any(|keyword| !keyword.is_empty() && query.contains(&keyword.to_lowercase()))
        })
        .collect();

    selected.sort_by(|a, b| b.priority.cmp(&a.priority));
    selected
}

/// Renders selected contexts into the text block sent upstream.
pub fn context_block(contexts: &[&Context]) -> Option<String> {
    if contexts.is_empty() {
        return None;
    }

    Some(
        contexts
            .iter()
            .map(|context| format!("## {}\n{}", context.title, context.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

fn normalize_keywords(keywords: Vec<String>) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !normalized.contains(&keyword) {
            normalized.push(keyword);
        }
    }

    if normalized.len() > MAX_KEYWORDS {
        return Err(Error::bad_request(format!(
            "at most {MAX_KEYWORDS} trigger keywords are allowed"
        )));
    }
    Ok(normalized)
}

fn build_context(tenant_id: i64, draft: ContextDraft) -> Result<Context> {
    let title = validation::required_text("title", &draft.title, 200)?;
    let slug = match draft.slug {
        Some(slug) if !slug.trim().is_empty() => validation::slug("slug", &slug)?,
        _ => {
            let derived = validation::slugify(&title);
            if derived.is_empty() {
                return Err(Error::bad_request("slug is required for this title"));
            }
            derived
        }
    };

    let now = Utc::now();
    Ok(Context {
        id: 0,
        tenant_id,
        title,
        slug,
        content: validation::required_text("content", &draft.content, 20_000)?,
        kind: draft.kind.unwrap_or(ContextKind::General),
        trigger_keywords: Json(normalize_keywords(draft.trigger_keywords)?),
        always_include: draft.always_include,
        priority: validation::in_range("priority", draft.priority, -1000, 1000)?,
        is_active: draft.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    })
}

fn slug_conflict(e: sqlx::Error, slug: &str) -> Error {
    if is_unique_violation(&e) {
        Error::Conflict(format!("a context with slug {slug:?} already exists"))
    } else {
        Error::from(e)
    }
}

#[injectable(ContextService)]
pub struct MyContextService {
    contexts: Ref<dyn ContextRepository>,
    tenants: Ref<dyn TenantRepository>,
}

impl MyContextService {
    async fn ensure_tenant(&self, tenant_id: i64) -> Result<()> {
        match self.tenants.find_tenant(tenant_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound("tenant")),
        }
    }
}

#[async_trait]
impl ContextService for MyContextService {
    async fn list(&self, tenant_id: i64) -> Result<Vec<Context>> {
        self.ensure_tenant(tenant_id).await?;
        Ok(self.contexts.list_contexts(tenant_id, false).await?)
    }

    async fn get(&self, tenant_id: i64, context_id: i64) -> Result<Context> {
        self.contexts
            .find_context(tenant_id, context_id)
            .await?
            .ok_or(Error::NotFound("context"))
    }

    async fn create(&self, tenant_id: i64, draft: ContextDraft) -> Result<Context> {
        self.ensure_tenant(tenant_id).await?;

        let context = build_context(tenant_id, draft)?;
        let created = self
            .contexts
            .create_context(&context)
            .await
            .map_err(|e| slug_conflict(e, &context.slug))?;

        info!("created context {} for tenant {tenant_id}", created.id);
        Ok(created)
    }

    async fn update(&self, tenant_id: i64, context_id: i64, draft: ContextDraft) -> Result<Context> {
        let existing = self.get(tenant_id, context_id).await?;

        let mut context = build_context(tenant_id, draft)?;
        context.id = existing.id;
        context.created_at = existing.created_at;

        self.contexts
            .update_context(&context)
            .await
            .map_err(|e| slug_conflict(e, &context.slug))
    }

    async fn delete(&self, tenant_id: i64, context_id: i64) -> Result<()> {
        if self.contexts.delete_context(tenant_id, context_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("context"))
        }
    }

    async fn matching(&self, tenant_id: i64, query: &str) -> Result<Vec<Context>> {
        self.ensure_tenant(tenant_id).await?;

        let contexts = self.contexts.list_contexts(tenant_id, true).await?;
        Ok(select_contexts(&contexts, query)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: i64, keywords: &[&str], always_include: bool, priority: i64) -> Context {
        let now = Utc::now();
        Context {
            id,
            tenant_id: 1,
            title: format!("Context {id}"),
            slug: format!("context-{id}"),
            content: format!("content {id}"),
            kind: ContextKind::General,
            trigger_keywords: Json(keywords.iter().map(|k| k.to_string()).collect()),
            always_include,
            priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_select_matches_keywords_case_insensitively() {
        let contexts = vec![
            context(1, &["shipping", "delivery"], false, 0),
            context(2, &["returns"], false, 0),
        ];

        let selected = select_contexts(&contexts, "How long does SHIPPING take?");
        assert_eq!(selected.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_select_orders_by_priority_and_skips_inactive() {
        let mut inactive = context(3, &[], true, 100);
        inactive.is_active = false;
        let contexts = vec![
            context(1, &[], true, 1),
            context(2, &["hat"], false, 10),
            inactive,
        ];

        let selected = select_contexts(&contexts, "red hat");
        assert_eq!(selected.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_context_block() {
        let contexts = vec![context(1, &[], true, 0), context(2, &[], true, 0)];
        let refs: Vec<&Context> = contexts.iter().collect();

        assert_eq!(
            context_block(&refs).unwrap(),
            "## Context 1\ncontent 1\n\n## Context 2\ncontent 2"
        );
        assert_eq!(context_block(&[]), None);
    }

    #[test]
    fn test_build_context_derives_slug_and_normalizes_keywords() {
        let draft = ContextDraft {
            title: "Shipping Policy".to_owned(),
            slug: None,
            content: "We ship worldwide.".to_owned(),
            kind: Some(ContextKind::Shipping),
            trigger_keywords: vec![" Ship ".to_owned(), "ship".to_owned(), "".to_owned()],
            always_include: false,
            priority: 5,
            is_active: None,
        };

        let built = build_context(7, draft).unwrap();
        assert_eq!(built.slug, "shipping-policy");
        assert_eq!(built.trigger_keywords.0, vec!["ship".to_owned()]);
        assert!(built.is_active);
        assert_eq!(built.tenant_id, 7);
    }
}
