use std::collections::VecDeque;
use std::path::Path;

use super::language::{Lang, TEXT_SEPARATORS, detect_language};
use super::types::{Chunk, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 20,
        }
    }
}

/// Recursive separator-based splitter.
///
/// Text is cut on the first separator of the list that occurs in it, keeping the
/// separator at the start of the following piece. Pieces shorter than `chunk_size`
/// are merged greedily with `chunk_overlap` characters of trailing context; longer
/// pieces are split again with the remaining separators. The empty separator splits
/// into single characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    separators: &'static [&'static str],
}

impl TextSplitter {
    /// Generic prose splitter (`"\n\n"`, `"\n"`, `" "`, `""`).
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config,
            separators: TEXT_SEPARATORS,
        }
    }

    #[must_use]
    pub fn for_language(config: SplitterConfig, lang: Lang) -> Self {
        Self {
            config,
            separators: lang.separators(),
        }
    }

    /// Code-aware splitter when the extension names a known language, prose otherwise.
    #[must_use]
    pub fn for_path(config: SplitterConfig, path: &Path) -> Self {
        match detect_language(path) {
            Some(lang) => Self::for_language(config, lang),
            None => Self::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut chunks = Vec::new();
        self.split_recursive(text, self.separators, &mut chunks);
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keep_start(text, separator);

        let mut good: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_owned());
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }
        if !good.is_empty() {
            out.extend(self.merge(&good));
        }
    }

    /// Greedily pack pieces into chunks of at most `chunk_size` characters, seeding
    /// each new chunk with trailing pieces of the previous one up to `chunk_overlap`.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > size {
                if !window.is_empty() {
                    if let Some(doc) = join_window(&window) {
                        docs.push(doc);
                    }
                    while total > overlap || (total + len > size && total > 0) {
                        let Some((_, front)) = window.pop_front() else {
                            break;
                        };
                        total -= front;
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = join_window(&window) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First separator present in `text`, plus the finer separators after it.
/// The empty separator always matches and ends the list.
fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split on `separator`, attaching each occurrence to the start of the piece that
/// follows it. Empty pieces are dropped.
fn split_keep_start<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
