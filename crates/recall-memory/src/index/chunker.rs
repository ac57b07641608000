// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-aware chunking with overlap.
//!
//! Sizes are in characters. Chunks are built from whole sentences; a
//! sentence longer than a chunk is split at word boundaries, and a single
//! oversized word is cut by characters.

/// Split `text` into chunks of at most `chunk_chars` characters.
///
/// Each chunk after the first starts with trailing sentences of the
/// previous one, up to `overlap_chars`. Text that fits in one chunk is
/// returned whole; blank text yields no chunks.
pub fn chunk_text(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let chunk_chars = chunk_chars.max(1);
    if char_len(text) <= chunk_chars {
        return vec![text.to_string()];
    }

    let pieces: Vec<&str> = split_sentences(text)
        .into_iter()
        .flat_map(|s| split_long(s, chunk_chars))
        .collect();

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for piece in pieces {
        let piece_len = char_len(piece);
        if !current.is_empty() && joined_len(&current) + 1 + piece_len > chunk_chars {
            chunks.push(current.join(" "));
            current = overlap_tail(&current, overlap_chars);
            if !current.is_empty() && joined_len(&current) + 1 + piece_len > chunk_chars {
                current.clear();
            }
        }
        current.push(piece);
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Length of `parts` joined by single spaces.
fn joined_len(parts: &[&str]) -> usize {
    parts.iter().map(|p| char_len(p)).sum::<usize>() + parts.len().saturating_sub(1)
}

/// Trailing pieces of `current` fitting in `overlap_chars`, never all of them.
fn overlap_tail<'a>(current: &[&'a str], overlap_chars: usize) -> Vec<&'a str> {
    let mut tail = Vec::new();
    let mut len = 0;
    for piece in current.iter().rev().take(current.len().saturating_sub(1)) {
        let added = char_len(piece) + usize::from(!tail.is_empty());
        if len + added > overlap_chars {
            break;
        }
        len += added;
        tail.push(*piece);
    }
    tail.reverse();
    tail
}

/// Sentences end at `.`, `!` or `?` followed by whitespace, or at a newline.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn split_long(sentence: &str, max: usize) -> Vec<&str> {
    if char_len(sentence) <= max {
        return vec![sentence];
    }
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut len = 0;
    let mut end = 0;
    for word in sentence.split_whitespace() {
        // byte offset of `word` within `sentence`
        let offset = word.as_ptr() as usize - sentence.as_ptr() as usize;
        let word_len = char_len(word);
        if word_len > max {
            if let Some(s) = start.take() {
                parts.push(&sentence[s..end]);
            }
            parts.extend(split_chars(word, max));
            len = 0;
            continue;
        }
        match start {
            Some(s) if len + 1 + word_len > max => {
                parts.push(&sentence[s..end]);
                start = Some(offset);
                len = word_len;
            }
            Some(_) => len += 1 + word_len,
            None => {
                start = Some(offset);
                len = word_len;
            }
        }
        end = offset + word.len();
    }
    if let Some(s) = start {
        parts.push(&sentence[s..end]);
    }
    parts
}

fn split_chars(word: &str, max: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in word.char_indices() {
        if count == max {
            parts.push(&word[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    parts.push(&word[start..]);
    parts
}
