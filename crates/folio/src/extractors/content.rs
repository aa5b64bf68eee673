// ABOUTME: Content extractor: applies a SourceProfile to page markup to produce article text and image URLs.
// ABOUTME: Locates the container (primary, then secondary rule), strips cleanup nodes and joins text by line.

//! Article text extraction driven by [`SourceProfile`] data.
//!
//! Key behaviors:
//! - Container rules are tried in order; the first one that matches wins.
//! - Elements matching the matched rule's cleanup selectors are skipped together
//!   with everything beneath them, as are paragraphs left without text.
//! - Text is joined with `\n` so paragraph structure survives.
//! - No matching container yields `main_text: None`; a container that holds
//!   no text yields `Some("")`.
//! - Extraction is a pure function of its inputs.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node};
use url::Url;

use crate::error::PipelineError;
use crate::extractors::compiled::get_or_compile;
use crate::extractors::images::{collect_image_sources, filter_relevant};
use crate::profiles::{ContainerRule, SourceProfile, TextMode};

/// The outcome of running the extractor over one page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    /// Article text, or `None` when no content container was located.
    pub main_text: Option<String>,
    /// Relevant image URLs in document order.
    pub image_urls: Vec<String>,
}

impl Extraction {
    /// Converts a missing container into an Extract error for `url`.
    pub fn require_text(self, url: &str) -> Result<(String, Vec<String>), PipelineError> {
        match self.main_text {
            Some(text) => Ok((text, self.image_urls)),
            None => Err(PipelineError::extract(
                url,
                "Extract",
                Some(anyhow::anyhow!("no content container matched")),
            )),
        }
    }
}

/// Parses `html` and extracts article text and relevant image URLs.
///
/// `base_url` resolves relative image sources; it does not influence the text.
pub fn extract(html: &str, profile: &SourceProfile, base_url: Option<&Url>) -> Extraction {
    let doc = Html::parse_document(html);
    extract_document(&doc, profile, base_url)
}

/// Same as [`extract`] for an already-parsed document.
pub fn extract_document(doc: &Html, profile: &SourceProfile, base_url: Option<&Url>) -> Extraction {
    let image_urls = filter_relevant(collect_image_sources(doc, base_url), &profile.image_filter);
    let main_text = locate_container(doc, profile).map(|(c, rule)| container_text(c, rule));
    Extraction {
        main_text,
        image_urls,
    }
}

/// Finds the content container using the profile's rules in order, along
/// with the rule that matched.
pub fn locate_container<'a, 'p>(
    doc: &'a Html,
    profile: &'p SourceProfile,
) -> Option<(ElementRef<'a>, &'p ContainerRule)> {
    profile
        .locators()
        .find_map(|rule| apply_rule(doc, rule).map(|container| (container, rule)))
}

fn apply_rule<'a>(doc: &'a Html, rule: &ContainerRule) -> Option<ElementRef<'a>> {
    let outer = get_or_compile(rule.outer)?;
    let container = doc.select(&outer).next()?;
    match rule.inner {
        Some(inner) => {
            let inner = get_or_compile(inner)?;
            container.select(&inner).next()
        }
        None => Some(container),
    }
}

/// Reads the cleaned text of a container located by `rule`.
pub fn container_text(container: ElementRef<'_>, rule: &ContainerRule) -> String {
    let mut skip = HashSet::new();
    for css in rule.cleanup {
        if let Some(selector) = get_or_compile(css) {
            for matched in container.select(&selector) {
                collect_node_ids(*matched, &mut skip);
            }
        }
    }
    skip_empty_paragraphs(container, &mut skip);

    let lines = match &rule.text_mode {
        TextMode::TextNodes => text_node_lines(container, &skip),
        TextMode::Blocks {
            tags,
            drop_trailing,
        } => block_lines(container, tags, *drop_trailing, &skip),
    };
    lines.join("\n")
}

fn text_node_lines(container: ElementRef<'_>, skip: &HashSet<NodeId>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack = vec![*container];
    // Depth-first, pruning skipped subtrees.
    while let Some(node) = stack.pop() {
        if skip.contains(&node.id()) {
            continue;
        }
        if let Node::Text(text) = node.value() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    lines
}

fn block_lines(
    container: ElementRef<'_>,
    tags: &[&str],
    drop_trailing: usize,
    skip: &HashSet<NodeId>,
) -> Vec<String> {
    let Some(selector) = get_or_compile(&tags.join(", ")) else {
        return Vec::new();
    };

    let mut lines: Vec<String> = container
        .select(&selector)
        .filter(|block| !skip.contains(&block.id()))
        .map(|block| visible_text(block, skip))
        .filter(|text| !text.is_empty())
        .collect();

    let keep = lines.len().saturating_sub(drop_trailing);
    lines.truncate(keep);
    lines
}

/// Whitespace-normalized text of an element, ignoring skipped subtrees.
fn visible_text(element: ElementRef<'_>, skip: &HashSet<NodeId>) -> String {
    let mut parts = Vec::new();
    let mut stack = vec![*element];
    while let Some(node) = stack.pop() {
        if skip.contains(&node.id()) {
            continue;
        }
        if let Node::Text(text) = node.value() {
            parts.extend(text.split_whitespace());
        }
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    parts.join(" ")
}

/// Marks paragraphs whose remaining text is blank.
fn skip_empty_paragraphs(container: ElementRef<'_>, skip: &mut HashSet<NodeId>) {
    let Some(selector) = get_or_compile("p") else {
        return;
    };
    let empty: Vec<_> = {
        let seen: &HashSet<NodeId> = skip;
        container
            .select(&selector)
            .filter(|p| !seen.contains(&p.id()) && visible_text(*p, seen).is_empty())
            .collect()
    };
    for p in empty {
        collect_node_ids(*p, skip);
    }
}

/// Collects a node and all its descendants.
fn collect_node_ids(node: ego_tree::NodeRef<'_, Node>, ids: &mut HashSet<NodeId>) {
    for descendant in node.descendants() {
        ids.insert(descendant.id());
    }
}
