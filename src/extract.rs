use ego_tree::NodeRef;
use encoding_rs::WINDOWS_1252;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::entry::{Collator, Entry};
use crate::error::ConvertError;

/// Opening marker of one dictionary entry in the unpacked markup. Matching
/// is an exact, case-sensitive literal: the tag names are fixed by the
/// container format, not configurable.
pub const ENTRY_MARKER: &str = "<idx:entry";

const ENTRY_TAG: &str = "idx:entry";
const ORTH_TAG: &str = "idx:orth";
const INFL_TAG: &str = "idx:infl";
const IFORM_TAG: &str = "idx:iform";
const PAGEBREAK_TAG: &str = "mbp:pagebreak";

/// Upper bound of entry fragments grouped into one chunk. Chunking exists
/// to bound the peak memory of the HTML parse, not to enable parallelism.
pub const CHUNK_ENTRIES: usize = 5000;

lazy_static! {
    static ref HREF_LINKS: Selector = Selector::parse("a[href]").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Rewrite in-dictionary reference targets to bword:// links.
    pub fix_links: bool,
    /// Parse the document in bounded chunks instead of one tree.
    pub chunked: bool,
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub chunks: usize,
    pub fragments: usize,
    pub entries: usize,
    pub missing_headword: usize,
    pub empty_body: usize,
    pub elapsed: Duration,
}

/// Why a fragment was dropped. Never fatal: extraction is best-effort over
/// a best-effort input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    MissingHeadword,
    EmptyBody,
}

/// Read the whole source document, decoding UTF-8 with a Windows-1252
/// fallback. Unpacked files from older dictionaries ship in the legacy
/// single-byte Western encoding.
pub fn load_document(path: &Path) -> Result<String, ConvertError> {
    let bytes = fs::read(path).map_err(|source| ConvertError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_document(bytes))
}

fn decode_document(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(invalid) => {
            let bytes = invalid.into_bytes();
            let (text, _, _) = WINDOWS_1252.decode(&bytes);
            text.into_owned()
        }
    }
}

/// Split the document into chunks aligned on entry boundaries.
///
/// Chunks are contiguous slices of the source, so concatenating them
/// reconstructs the post-first-marker remainder byte-for-byte. Leading text
/// before the first marker cannot contain a complete entry and is dropped
/// in chunked mode.
pub fn segment(book: &str, chunked: bool) -> Result<Vec<&str>, ConvertError> {
    segment_with(book, chunked, CHUNK_ENTRIES)
}

fn segment_with(book: &str, chunked: bool, per_chunk: usize) -> Result<Vec<&str>, ConvertError> {
    debug_assert!(per_chunk > 0);
    let starts: Vec<usize> = book.match_indices(ENTRY_MARKER).map(|(i, _)| i).collect();
    if starts.is_empty() {
        return Err(ConvertError::NotADictionary);
    }
    if !chunked {
        return Ok(vec![book]);
    }
    let mut chunks = Vec::with_capacity(starts.len() / per_chunk + 1);
    let mut i = 0;
    while i < starts.len() {
        let begin = starts[i];
        let end = starts.get(i + per_chunk).copied().unwrap_or(book.len());
        chunks.push(&book[begin..end]);
        i += per_chunk;
    }
    Ok(chunks)
}

/// Yield every logical entry fragment of a parsed chunk exactly once, in
/// document order. Single consumption pass.
///
/// The upstream markup generator sometimes fails to close an entry before
/// opening the next one, so a top-level element can span several logical
/// entries. Naive element discovery would return both the over-broad outer
/// element and the correctly nested inner ones, double-counting content.
/// When a top-level element's serialized text contains another entry marker
/// past its own opener, it is re-split on the marker and each piece is
/// re-parsed as its own entry.
pub fn flatten(chunk: &Html, mut sink: impl FnMut(ElementRef<'_>)) {
    for entry in top_level_entries(chunk) {
        let serialized = entry.html();
        if serialized[ENTRY_MARKER.len()..].contains(ENTRY_MARKER) {
            for piece in resplit_fragments(&serialized) {
                let reparsed = Html::parse_fragment(piece);
                if let Some(inner) = first_entry(&reparsed) {
                    sink(inner);
                }
            }
        } else {
            sink(entry);
        }
    }
}

fn top_level_entries(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == ENTRY_TAG)
        .filter(|e| {
            !e.ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == ENTRY_TAG)
        })
        .collect()
}

fn first_entry(doc: &Html) -> Option<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == ENTRY_TAG)
}

fn resplit_fragments(serialized: &str) -> Vec<&str> {
    let starts: Vec<usize> = serialized
        .match_indices(ENTRY_MARKER)
        .map(|(i, _)| i)
        .collect();
    let mut pieces = Vec::with_capacity(starts.len());
    for (n, &begin) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(serialized.len());
        pieces.push(&serialized[begin..end]);
    }
    pieces
}

/// Extract one normalized entry from an entry element, or report why the
/// fragment was dropped.
pub fn extract(entry: ElementRef<'_>, fix_links: bool) -> Result<Entry, Skip> {
    let orth = find_descendant(entry, ORTH_TAG).ok_or(Skip::MissingHeadword)?;
    let headword = orth
        .value()
        .attr("value")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(Skip::MissingHeadword)?
        .to_string();

    let mut inflections = std::collections::BTreeSet::new();
    if let Some(infl) = find_descendant(entry, INFL_TAG) {
        for iform in infl
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == IFORM_TAG)
        {
            if let Some(form) = iform.value().attr("value") {
                let form = form.trim();
                if !form.is_empty() {
                    inflections.insert(form.to_string());
                }
            }
        }
    }
    // A word is not its own inflection in the output model.
    inflections.remove(&headword);

    let mut body = enclosed_body(entry, orth);
    if body.is_empty() {
        body = sibling_body(entry);
    }
    if body.is_empty() {
        return Err(Skip::EmptyBody);
    }
    if fix_links {
        body = rewrite_links(&body);
    }

    Ok(Entry {
        headword,
        inflections,
        body,
    })
}

fn find_descendant<'a>(scope: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == name)
}

/// Primary body path: everything after the orth element but still inside
/// the entry element, in document order.
fn enclosed_body(entry: ElementRef<'_>, orth: ElementRef<'_>) -> String {
    if !orth.ancestors().any(|a| a.id() == entry.id()) {
        return String::new();
    }
    let mut body = String::new();
    let mut cur: NodeRef<'_, Node> = *orth;
    loop {
        for sibling in cur.next_siblings() {
            push_node_html(&mut body, sibling);
        }
        match cur.parent() {
            Some(parent) if parent.id() != entry.id() => cur = parent,
            _ => break,
        }
    }
    body
}

/// Fallback body path: the markup sometimes leaves an entry element empty
/// and attaches the definition as following siblings instead. Accumulate
/// siblings up to the next entry or page-break marker.
fn sibling_body(entry: ElementRef<'_>) -> String {
    let mut body = String::new();
    for sibling in entry.next_siblings() {
        if let Some(element) = ElementRef::wrap(sibling) {
            let name = element.value().name();
            if name == ENTRY_TAG || name == PAGEBREAK_TAG {
                break;
            }
        }
        push_node_html(&mut body, sibling);
    }
    body
}

fn push_node_html(out: &mut String, node: NodeRef<'_, Node>) {
    if let Some(element) = ElementRef::wrap(node) {
        out.push_str(&element.html());
        return;
    }
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        _ => {}
    }
}

/// Rewrite in-dictionary references. The source format encodes
/// cross-references as positional file offsets that are meaningless outside
/// the original container; dictionary viewers resolve them by headword text
/// through the bword:// scheme instead.
///
/// Replacement is by literal substring: every occurrence of a link's exact
/// target string anywhere in the body becomes `bword://<link text>`. A
/// target that happens to be a substring of unrelated body text is
/// rewritten too; known limitation of the reference scheme.
pub fn rewrite_links(body: &str) -> String {
    let fragment = Html::parse_fragment(body);
    let mut rewritten = body.to_string();
    for link in fragment.select(&HREF_LINKS) {
        let Some(target) = link.value().attr("href") else {
            continue;
        };
        if target.is_empty() {
            continue;
        }
        let label: String = link.text().collect();
        rewritten = rewritten.replace(target, &format!("bword://{label}"));
    }
    rewritten
}

/// Run the whole pipeline: segment, flatten each chunk, extract fields,
/// collate. `progress` receives the running entry count; it is advisory
/// only and never affects the result.
pub fn extract_entries(
    book: &str,
    opts: Options,
    progress: impl FnMut(usize),
) -> Result<(Vec<Entry>, ExtractStats), ConvertError> {
    let start = Instant::now();
    let chunks = segment(book, opts.chunked)?;
    Ok(collect_entries(&chunks, opts, start, progress))
}

#[cfg(test)]
fn extract_entries_with(
    book: &str,
    opts: Options,
    per_chunk: usize,
    progress: impl FnMut(usize),
) -> Result<(Vec<Entry>, ExtractStats), ConvertError> {
    let start = Instant::now();
    let chunks = segment_with(book, opts.chunked, per_chunk)?;
    Ok(collect_entries(&chunks, opts, start, progress))
}

fn collect_entries(
    chunks: &[&str],
    opts: Options,
    start: Instant,
    mut progress: impl FnMut(usize),
) -> (Vec<Entry>, ExtractStats) {
    let mut stats = ExtractStats {
        chunks: chunks.len(),
        ..Default::default()
    };
    let mut collator = Collator::new();

    // One chunk is fully flattened and extracted before the next is parsed.
    for &chunk in chunks {
        let doc = Html::parse_fragment(chunk);
        flatten(&doc, |fragment| {
            stats.fragments += 1;
            match extract(fragment, opts.fix_links) {
                Ok(entry) => {
                    collator.push(entry);
                    progress(collator.len());
                }
                Err(Skip::MissingHeadword) => stats.missing_headword += 1,
                Err(Skip::EmptyBody) => stats.empty_body += 1,
            }
        });
    }

    let entries = collator.finish();
    stats.entries = entries.len();
    stats.elapsed = start.elapsed();
    (entries, stats)
}
