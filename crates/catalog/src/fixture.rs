use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use adsel_core::domain::content::{Content, ContentId};
use adsel_core::domain::targeting::TargetingGroup;
use adsel_core::lookup::{ContentLookup, CustomerSegmentSource, TargetingGroupLookup};
use adsel_core::targeting::predicate::TargetingPredicate;
use adsel_core::targeting::predicates::{Always, CustomerIn, CustomerInSegment, MarketplaceIs, Not};

use crate::memory::{InMemoryContentLookup, InMemorySegmentSource, InMemoryTargetingGroupLookup};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("unsupported catalog file extension for `{0}` (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("could not parse TOML catalog: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("could not parse JSON catalog: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogFormat {
    Toml,
    Json,
}

impl CatalogFormat {
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read-only content and targeting data backing the lookup collaborators.
pub struct Catalog {
    pub contents: Arc<InMemoryContentLookup>,
    pub targeting_groups: Arc<InMemoryTargetingGroupLookup>,
    pub segments: Arc<InMemorySegmentSource>,
    pub content_count: usize,
    pub targeting_group_count: usize,
}

impl Catalog {
    pub fn content_lookup(&self) -> Arc<dyn ContentLookup> {
        Arc::clone(&self.contents) as Arc<dyn ContentLookup>
    }

    pub fn targeting_group_lookup(&self) -> Arc<dyn TargetingGroupLookup> {
        Arc::clone(&self.targeting_groups) as Arc<dyn TargetingGroupLookup>
    }
}

pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let format = CatalogFormat::from_path(path)?;
    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
    let catalog = parse_catalog(&raw, format)?;
    info!(
        event_name = "catalog.loaded",
        path = %path.display(),
        content_count = catalog.content_count,
        targeting_group_count = catalog.targeting_group_count,
        "catalog loaded"
    );
    Ok(catalog)
}

pub fn parse_catalog(raw: &str, format: CatalogFormat) -> Result<Catalog, CatalogError> {
    let file: CatalogFile = match format {
        CatalogFormat::Toml => toml::from_str(raw)?,
        CatalogFormat::Json => serde_json::from_str(raw)?,
    };
    build(file)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CatalogFile {
    #[serde(default)]
    pub(crate) segments: Vec<SegmentEntry>,
    #[serde(default)]
    pub(crate) content: Vec<ContentEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SegmentEntry {
    pub(crate) customer_id: String,
    pub(crate) segments: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEntry {
    pub(crate) id: String,
    pub(crate) marketplace_id: String,
    #[serde(default)]
    pub(crate) body: String,
    #[serde(default)]
    pub(crate) targeting_groups: Vec<TargetingGroupEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetingGroupEntry {
    pub(crate) id: String,
    pub(crate) click_through_rate: f64,
    #[serde(default)]
    pub(crate) predicates: Vec<PredicateSpec>,
}

/// Declarative form of the built-in predicates.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PredicateSpec {
    MarketplaceIs { marketplace_id: String },
    CustomerIn { customers: Vec<String> },
    CustomerInSegment { segment: String },
    Not { predicate: Box<PredicateSpec> },
    Always { value: bool },
}

impl PredicateSpec {
    fn build(&self, segments: &Arc<dyn CustomerSegmentSource>) -> Arc<dyn TargetingPredicate> {
        match self {
            Self::MarketplaceIs { marketplace_id } => {
                Arc::new(MarketplaceIs::new(marketplace_id.clone()))
            }
            Self::CustomerIn { customers } => Arc::new(CustomerIn::new(customers.iter().cloned())),
            Self::CustomerInSegment { segment } => {
                Arc::new(CustomerInSegment::new(segment.clone(), Arc::clone(segments)))
            }
            Self::Not { predicate } => Arc::new(Not::new(predicate.build(segments))),
            Self::Always { value } => Arc::new(Always(*value)),
        }
    }
}

pub(crate) fn build(file: CatalogFile) -> Result<Catalog, CatalogError> {
    validate(&file)?;

    let memberships = file
        .segments
        .into_iter()
        .fold(HashMap::<String, Vec<String>>::new(), |mut memberships, entry| {
            memberships.entry(entry.customer_id).or_default().extend(entry.segments);
            memberships
        });
    let segments = Arc::new(InMemorySegmentSource::from_memberships(memberships));
    let segment_source = Arc::clone(&segments) as Arc<dyn CustomerSegmentSource>;

    let mut contents = Vec::with_capacity(file.content.len());
    let mut groups = Vec::new();
    for entry in file.content {
        let content_id = ContentId(entry.id.clone());
        for group in entry.targeting_groups {
            let predicates =
                group.predicates.iter().map(|spec| spec.build(&segment_source)).collect();
            groups.push(TargetingGroup::new(
                group.id,
                content_id.clone(),
                group.click_through_rate,
                predicates,
            ));
        }
        contents.push(Content::new(entry.id, entry.marketplace_id, entry.body));
    }

    let content_count = contents.len();
    let targeting_group_count = groups.len();
    Ok(Catalog {
        contents: Arc::new(InMemoryContentLookup::from_contents(contents)),
        targeting_groups: Arc::new(InMemoryTargetingGroupLookup::from_groups(groups)),
        segments,
        content_count,
        targeting_group_count,
    })
}

fn validate(file: &CatalogFile) -> Result<(), CatalogError> {
    let mut content_ids = HashSet::new();
    for content in &file.content {
        if content.id.trim().is_empty() {
            return Err(CatalogError::Validation("content.id must not be empty".to_string()));
        }
        if content.marketplace_id.trim().is_empty() {
            return Err(CatalogError::Validation(format!(
                "content `{}` must declare a marketplace_id",
                content.id
            )));
        }
        if !content_ids.insert(content.id.as_str()) {
            return Err(CatalogError::Validation(format!(
                "content id `{}` is declared more than once",
                content.id
            )));
        }

        let mut group_ids = HashSet::new();
        for group in &content.targeting_groups {
            if !group_ids.insert(group.id.as_str()) {
                return Err(CatalogError::Validation(format!(
                    "targeting group `{}` is declared more than once for content `{}`",
                    group.id, content.id
                )));
            }
            let rate = group.click_through_rate;
            if !rate.is_finite() || rate < 0.0 {
                return Err(CatalogError::Validation(format!(
                    "targeting group `{}` has invalid click_through_rate {rate}",
                    group.id
                )));
            }
        }
    }

    let mut customers = HashSet::new();
    for entry in &file.segments {
        if !customers.insert(entry.customer_id.as_str()) {
            return Err(CatalogError::Validation(format!(
                "segments for customer `{}` are declared more than once",
                entry.customer_id
            )));
        }
    }

    Ok(())
}
