//! Pulling code artifacts out of free-form model output.
//!
//! Local models only loosely follow the fenced-block format they are asked
//! for, so everything here degrades instead of failing: a reply with no
//! fences at all still becomes the primary artifact, and the caller learns
//! about it through [`ParsedArtifacts::degraded`].

use std::sync::OnceLock;

use regex::Regex;

use crate::wire::Artifacts;

/// How many prose lines before a fence are searched for a filename.
const HINT_WINDOW: usize = 3;

/// An artifact the caller expects, and the fence tags that may carry it.
/// An empty tag list accepts any block, tagged or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub name: &'static str,
    pub tags: &'static [&'static str],
}

impl ArtifactSpec {
    pub const HTML: ArtifactSpec = ArtifactSpec { name: "html", tags: &["html", "htm"] };
    pub const CSS: ArtifactSpec = ArtifactSpec { name: "css", tags: &["css", "scss"] };
    pub const REACT: ArtifactSpec = ArtifactSpec {
        name: "react",
        tags: &["tsx", "jsx", "typescript", "ts", "javascript", "js", "react"],
    };

    pub const fn code(name: &'static str) -> ArtifactSpec {
        ArtifactSpec { name, tags: &[] }
    }

    fn accepts(&self, tag: Option<&str>) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        tag.is_some_and(|t| self.tags.contains(&t))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArtifacts {
    pub artifacts: Artifacts,
    /// Set when the primary artifact could not be matched by its fence tag.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    tag: Option<String>,
    filename: Option<String>,
    body: String,
    preamble: Vec<String>,
}

/// Extract `expected` artifacts from `raw`. The first spec is the primary
/// artifact and receives the whole text when no fences are present.
pub fn parse(raw: &str, expected: &[ArtifactSpec]) -> ParsedArtifacts {
    let blocks = scan_blocks(raw);
    let mut out = ParsedArtifacts::default();

    if blocks.is_empty() {
        out.degraded = true;
        for (i, spec) in expected.iter().enumerate() {
            let content = if i == 0 { raw.trim().to_string() } else { String::new() };
            out.artifacts.insert(spec.name.to_string(), content);
        }
        return out;
    }

    for (i, spec) in expected.iter().enumerate() {
        let content = match blocks.iter().find(|b| spec.accepts(b.tag.as_deref())) {
            Some(b) => b.body.trim().to_string(),
            None if i == 0 => {
                out.degraded = true;
                blocks
                    .iter()
                    .find(|b| b.tag.is_none())
                    .map(|b| b.body.trim().to_string())
                    .unwrap_or_default()
            }
            None => String::new(),
        };
        out.artifacts.insert(spec.name.to_string(), content);
    }
    out
}

/// Extract a multi-file site as filename -> content.
pub fn parse_site(raw: &str) -> ParsedArtifacts {
    let blocks = scan_blocks(raw);
    let mut out = ParsedArtifacts::default();

    if blocks.is_empty() {
        out.degraded = true;
        out.artifacts.insert("index.html".to_string(), raw.trim().to_string());
        return out;
    }

    for b in &blocks {
        let name = b
            .filename
            .clone()
            .or_else(|| hinted_filename(&b.preamble, b.tag.as_deref()))
            .unwrap_or_else(|| default_filename(b.tag.as_deref()));
        let name = unique_name(&out.artifacts, &name);
        out.artifacts.insert(name, b.body.trim().to_string());
    }
    out
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z0-9_][a-z0-9_./-]*\.(?:html?|css|scss|m?js|jsx|tsx?|json|svg|md))\b")
            .expect("filename pattern is valid")
    })
}

fn open_fence(line: &str) -> Option<(Option<String>, Option<String>)> {
    let info = line.trim().strip_prefix("```")?.trim_start_matches('`').trim();
    if info.is_empty() {
        return Some((None, None));
    }
    let mut words = info.splitn(2, |c: char| c.is_whitespace() || c == ':');
    let first = words.next().unwrap_or_default().to_ascii_lowercase();
    let rest = words.next().unwrap_or_default();

    // "```index.html" names the file instead of the language.
    if let Some(m) = filename_re().find(&first).filter(|m| m.as_str().len() == first.len()) {
        let name = m.as_str().to_string();
        let tag = name.rsplit('.').next().map(str::to_string);
        return Some((tag, Some(name)));
    }
    let filename = filename_re().find(rest).map(|m| m.as_str().to_string());
    Some((Some(first), filename))
}

fn scan_blocks(raw: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    let mut current: Option<Block> = None;

    for line in raw.lines() {
        match current.as_mut() {
            None => match open_fence(line) {
                Some((tag, filename)) => {
                    current = Some(Block { tag, filename, body: String::new(), preamble: std::mem::take(&mut preamble) });
                }
                None => preamble.push(line.to_string()),
            },
            Some(block) => {
                if line.trim() == "```" {
                    blocks.extend(current.take());
                    continue;
                }
                // A tagged opener inside a block means the model forgot to close the previous one.
                if let Some((Some(tag), filename)) = open_fence(line) {
                    let finished = std::mem::replace(
                        block,
                        Block { tag: Some(tag), filename, body: String::new(), preamble: Vec::new() },
                    );
                    blocks.push(finished);
                    continue;
                }
                block.body.push_str(line);
                block.body.push('\n');
            }
        }
    }
    blocks.extend(current);
    blocks
}

fn hinted_filename(preamble: &[String], tag: Option<&str>) -> Option<String> {
    preamble
        .iter()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(HINT_WINDOW)
        .flat_map(|line| {
            let mut found: Vec<String> = filename_re().find_iter(line).map(|m| m.as_str().to_string()).collect();
            found.reverse();
            found
        })
        .find(|name| extension_fits(name, tag))
}

fn extension_fits(name: &str, tag: Option<&str>) -> bool {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match tag {
        None => true,
        Some("html") | Some("htm") => matches!(ext.as_str(), "html" | "htm"),
        Some("css") | Some("scss") => matches!(ext.as_str(), "css" | "scss"),
        Some("js") | Some("javascript") => matches!(ext.as_str(), "js" | "mjs"),
        Some("ts") | Some("typescript") => ext == "ts",
        Some(t) => ext == t,
    }
}

fn default_filename(tag: Option<&str>) -> String {
    match tag {
        None | Some("html") | Some("htm") => "index.html".to_string(),
        Some("css") => "style.css".to_string(),
        Some("js") | Some("javascript") => "script.js".to_string(),
        Some(t) => {
            let ext: String = t.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            if ext.is_empty() {
                "index.txt".to_string()
            } else {
                format!("index.{ext}")
            }
        }
    }
}

fn unique_name(taken: &Artifacts, name: &str) -> String {
    if !taken.contains_key(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    };
    (2..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}
