// ABOUTME: Source profiles: the closed set of per-site extraction rules selected by a SourceTag.
// ABOUTME: Container locators, cleanup selectors, text modes and image predicates are plain data.

//! Site-family extraction rules.
//!
//! Each [`SourceTag`] maps to exactly one [`SourceProfile`]. A profile is data:
//! a primary and optional secondary [`ContainerRule`] and an [`ImageFilter`]
//! deciding which `img` sources carry article content. Each rule names the
//! selectors discarded before text is read and how text is collected from
//! the container it locates.
//! Adding a site family means adding a tag and a profile here; the extractor
//! itself does not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies the site family a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Kriptoworld,
    #[default]
    Default,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Kriptoworld, SourceTag::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Kriptoworld => "kriptoworld",
            SourceTag::Default => "default",
        }
    }

    /// Exact (case-insensitive) lookup; `None` for unknown tags.
    pub fn parse_strict(s: &str) -> Option<SourceTag> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
    }

    /// The profile applied to documents carrying this tag.
    pub fn profile(&self) -> &'static SourceProfile {
        match self {
            SourceTag::Kriptoworld => &KRIPTOWORLD,
            SourceTag::Default => &DEFAULT,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: unknown tags select the default profile.
impl From<&str> for SourceTag {
    fn from(s: &str) -> Self {
        Self::parse_strict(s).unwrap_or_default()
    }
}

impl FromStr for SourceTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SourceTag::from(s))
    }
}

/// Locates a content container and says how to read it.
///
/// `outer` selects the container; when `inner` is set, the content block is
/// the first `inner` match inside the first `outer` match. A layout carries
/// its own cleanup and text mode, so the same markup reads the same way in
/// every profile that falls back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRule {
    pub outer: &'static str,
    pub inner: Option<&'static str>,
    /// Selectors for elements discarded from the container before reading text.
    pub cleanup: &'static [&'static str],
    pub text_mode: TextMode,
}

/// How text is collected from a located container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMode {
    /// Every non-blank text node, trimmed, one per line.
    TextNodes,
    /// The whitespace-normalized text of each matching block element, one
    /// per line, skipping empty blocks and dropping the last `drop_trailing`.
    Blocks {
        tags: &'static [&'static str],
        drop_trailing: usize,
    },
}

/// Relevance predicate over candidate image URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    /// Accept URLs containing `needle` (case-insensitive) that do not start
    /// with any of `reject_prefixes`.
    Keyword {
        needle: &'static str,
        reject_prefixes: &'static [&'static str],
    },
    /// Accept URLs served from one of the given hosting domains.
    Host { domains: &'static [&'static str] },
}

impl ImageFilter {
    pub fn accept(&self, url: &str) -> bool {
        match self {
            ImageFilter::Keyword {
                needle,
                reject_prefixes,
            } => {
                url.to_lowercase().contains(needle)
                    && !reject_prefixes.iter().any(|p| url.starts_with(p))
            }
            ImageFilter::Host { domains } => domains.iter().any(|d| url.contains(d)),
        }
    }
}

/// The extraction rules for one site family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    pub tag: SourceTag,
    pub primary: ContainerRule,
    pub secondary: Option<ContainerRule>,
    pub image_filter: ImageFilter,
}

impl SourceProfile {
    /// Container rules in the order they are tried.
    pub fn locators(&self) -> impl Iterator<Item = &ContainerRule> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    /// Every CSS selector the profile uses.
    pub fn selectors(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for rule in self.locators() {
            out.push(rule.outer.to_string());
            out.extend(rule.inner.map(str::to_string));
            out.extend(rule.cleanup.iter().map(|s| s.to_string()));
            if let TextMode::Blocks { tags, .. } = &rule.text_mode {
                out.push(tags.join(", "));
            }
        }
        out
    }
}

/// Paragraphs and subheadings, without the trailing footer block.
const ARTICLE_BLOCKS: TextMode = TextMode::Blocks {
    tags: &["p", "h2"],
    drop_trailing: 1,
};

const WORDPRESS_ENTRY: ContainerRule = ContainerRule {
    outer: "div.entry-content.clearfix.single-post-content",
    inner: None,
    cleanup: &["script", "style", "div.code-block"],
    text_mode: TextMode::TextNodes,
};

const TAGDIV_SINGLE_CONTENT: ContainerRule = ContainerRule {
    outer: "div.tdb_single_content",
    inner: Some("div.tdb-block-inner.td-fix-index"),
    cleanup: &["script", "style", "a"],
    text_mode: ARTICLE_BLOCKS,
};

const GENERIC_ENTRY: ContainerRule = ContainerRule {
    outer: "div.entry-content",
    inner: None,
    cleanup: &["script", "style", "a"],
    text_mode: ARTICLE_BLOCKS,
};

pub static KRIPTOWORLD: SourceProfile = SourceProfile {
    tag: SourceTag::Kriptoworld,
    primary: WORDPRESS_ENTRY,
    secondary: Some(TAGDIV_SINGLE_CONTENT),
    image_filter: ImageFilter::Keyword {
        needle: "image",
        reject_prefixes: &["data:image/svg+xml"],
    },
};

pub static DEFAULT: SourceProfile = SourceProfile {
    tag: SourceTag::Default,
    primary: TAGDIV_SINGLE_CONTENT,
    secondary: Some(GENERIC_ENTRY),
    image_filter: ImageFilter::Host {
        domains: &["googleusercontent.com"],
    },
};
