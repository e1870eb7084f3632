//! Pre-tokenization: split input into pieces before BPE.
//!
//! Each encoding has a fixed grammar of ordered branches; at every position
//! the first branch that matches at least one byte wins, so the scanner
//! always advances and the emitted pieces partition the input exactly.
//! The grammars mirror the reference tokenizer's split regexes, but are
//! implemented directly over bytes so that malformed UTF-8 degrades to
//! single-byte pieces instead of a panic.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Grammar selector. `Cl100k` keeps letters and digits strictly apart and
/// only admits a plain space before a word; `O200k` allows an arbitrary
/// non-newline prefix character before a word and picks digit runs ahead
/// of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Cl100k,
    O200k,
}

/// Split `input` into pieces. Concatenating the returned slices always
/// reproduces `input` byte-for-byte.
pub fn pretokenize(input: &[u8], grammar: Grammar) -> Vec<&[u8]> {
    let mut pieces = Vec::new();
    let mut pos = 0;
    while pos < input.len() {
        let end = next_piece_end(input, pos, grammar);
        debug_assert!(end > pos, "scanner must always advance");
        pieces.push(&input[pos..end]);
        pos = end;
    }
    pieces
}

/// End offset of the piece starting at `pos`. Branches are tried in the
/// grammar's order; the byte fallback at the bottom guarantees progress.
fn next_piece_end(input: &[u8], pos: usize, grammar: Grammar) -> usize {
    if let Some(end) = match_contraction(input, pos) {
        return end;
    }
    match grammar {
        Grammar::Cl100k => {
            if let Some(end) = match_word_cl100k(input, pos) {
                return end;
            }
            if let Some(end) = match_digits(input, pos) {
                return end;
            }
        }
        Grammar::O200k => {
            if let Some(end) = match_digits(input, pos) {
                return end;
            }
            if let Some(end) = match_word_o200k(input, pos) {
                return end;
            }
        }
    }
    if let Some(end) = match_symbol(input, pos) {
        return end;
    }
    if let Some(end) = match_whitespace_newline(input, pos) {
        return end;
    }
    if let Some(end) = match_whitespace_trailing(input, pos) {
        return end;
    }
    if let Some(end) = match_whitespace(input, pos) {
        return end;
    }
    log::warn!("invalid UTF-8 at byte offset {pos}, emitting byte fallback piece");
    pos + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Letter,
    Number,
    Mark,
    Space,
    Other,
}

fn classify(c: char) -> Class {
    if c.is_whitespace() {
        return Class::Space;
    }
    use GeneralCategory::*;
    match get_general_category(c) {
        UppercaseLetter | LowercaseLetter | TitlecaseLetter | ModifierLetter | OtherLetter => {
            Class::Letter
        }
        DecimalNumber | LetterNumber | OtherNumber => Class::Number,
        NonspacingMark | SpacingMark | EnclosingMark => Class::Mark,
        _ => Class::Other,
    }
}

/// Decode the codepoint starting at `pos`, rejecting overlong forms,
/// surrogates, and values above U+10FFFF. `None` means the byte at `pos`
/// does not begin a valid sequence (the maximal valid prefix ends here).
fn decode_at(input: &[u8], pos: usize) -> Option<(char, usize)> {
    let b0 = *input.get(pos)?;
    if b0 < 0x80 {
        return Some((b0 as char, 1));
    }
    let cont = |i: usize| -> Option<u32> {
        let b = *input.get(pos + i)?;
        if b & 0xC0 == 0x80 {
            Some(u32::from(b & 0x3F))
        } else {
            None
        }
    };
    let (cp, len) = match b0 {
        0xC2..=0xDF => ((u32::from(b0 & 0x1F) << 6) | cont(1)?, 2),
        0xE0..=0xEF => {
            let cp = (u32::from(b0 & 0x0F) << 12) | (cont(1)? << 6) | cont(2)?;
            if cp < 0x800 || (0xD800..=0xDFFF).contains(&cp) {
                return None;
            }
            (cp, 3)
        }
        0xF0..=0xF4 => {
            let cp = (u32::from(b0 & 0x07) << 18) | (cont(1)? << 12) | (cont(2)? << 6) | cont(3)?;
            if !(0x10000..=0x10FFFF).contains(&cp) {
                return None;
            }
            (cp, 4)
        }
        // 0x80..=0xC1 are continuations and overlong lead bytes.
        _ => return None,
    };
    Some((char::from_u32(cp)?, len))
}

/// `'s 't 're 've 'm 'll 'd`, case-insensitive. U+017F (long s) folds to
/// `s` under Unicode simple folding, so `'ſ` counts too.
fn match_contraction(input: &[u8], pos: usize) -> Option<usize> {
    if *input.get(pos)? != b'\'' {
        return None;
    }
    let (c1, n1) = decode_at(input, pos + 1)?;
    let one = pos + 1 + n1;
    match c1 {
        's' | 'S' | '\u{17F}' | 't' | 'T' | 'm' | 'M' | 'd' | 'D' => Some(one),
        'r' | 'R' | 'v' | 'V' => match decode_at(input, one)? {
            ('e' | 'E', n2) => Some(one + n2),
            _ => None,
        },
        'l' | 'L' => match decode_at(input, one)? {
            ('l' | 'L', n2) => Some(one + n2),
            _ => None,
        },
        _ => None,
    }
}

/// cl100k word: an optional single space, then letters only.
fn match_word_cl100k(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    if input.get(j) == Some(&b' ') {
        j += 1;
    }
    let end = scan_letters(input, j);
    if end > j {
        Some(end)
    } else {
        None
    }
}

/// o200k word: an optional prefix character that is none of CR, LF,
/// letter, number; then letters; then letters or combining marks.
fn match_word_o200k(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    if let Some((c, n)) = decode_at(input, pos) {
        let is_prefix =
            c != '\r' && c != '\n' && !matches!(classify(c), Class::Letter | Class::Number);
        if is_prefix {
            j += n;
        }
    }
    let first = scan_letters_once(input, j)?;
    let mut end = first;
    while let Some((c, n)) = decode_at(input, end) {
        if matches!(classify(c), Class::Letter | Class::Mark) {
            end += n;
        } else {
            break;
        }
    }
    Some(end)
}

fn scan_letters(input: &[u8], mut j: usize) -> usize {
    while let Some((c, n)) = decode_at(input, j) {
        if classify(c) == Class::Letter {
            j += n;
        } else {
            break;
        }
    }
    j
}

/// Consume exactly one letter, or fail.
fn scan_letters_once(input: &[u8], j: usize) -> Option<usize> {
    let (c, n) = decode_at(input, j)?;
    if classify(c) == Class::Letter {
        Some(j + n)
    } else {
        None
    }
}

/// 1 to 3 numeric codepoints.
fn match_digits(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    for _ in 0..3 {
        match decode_at(input, j) {
            Some((c, n)) if classify(c) == Class::Number => j += n,
            _ => break,
        }
    }
    if j > pos {
        Some(j)
    } else {
        None
    }
}

/// An optional single space, then a run that is neither whitespace, letter,
/// nor number, then any trailing CR/LF bytes.
fn match_symbol(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    if input.get(j) == Some(&b' ') {
        j += 1;
    }
    let run_start = j;
    while let Some((c, n)) = decode_at(input, j) {
        if matches!(classify(c), Class::Mark | Class::Other) {
            j += n;
        } else {
            break;
        }
    }
    if j == run_start {
        return None;
    }
    while matches!(input.get(j), Some(&b'\r') | Some(&b'\n')) {
        j += 1;
    }
    Some(j)
}

/// Whitespace ending in a newline. Greedy over the leading run, but the
/// match must end on a CR or LF, so trailing non-newline whitespace is
/// left for the following piece.
fn match_whitespace_newline(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    let mut last_newline_end = None;
    while let Some((c, n)) = decode_at(input, j) {
        if !c.is_whitespace() {
            break;
        }
        j += n;
        if c == '\r' || c == '\n' {
            last_newline_end = Some(j);
        }
    }
    last_newline_end
}

/// Trailing whitespace. At end of input the whole run matches; before a
/// non-whitespace byte the run backs off by one character so that the
/// final space stays attached to whatever follows. A single whitespace
/// character cannot back off and falls through to the generic branch.
fn match_whitespace_trailing(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    let mut prev_end = pos;
    let mut chars = 0usize;
    while let Some((c, n)) = decode_at(input, j) {
        if !c.is_whitespace() {
            break;
        }
        prev_end = j;
        j += n;
        chars += 1;
    }
    if chars == 0 {
        return None;
    }
    if j == input.len() {
        Some(j)
    } else if chars >= 2 {
        Some(prev_end)
    } else {
        None
    }
}

/// Generic whitespace run.
fn match_whitespace(input: &[u8], pos: usize) -> Option<usize> {
    let mut j = pos;
    while let Some((c, n)) = decode_at(input, j) {
        if !c.is_whitespace() {
            break;
        }
        j += n;
    }
    if j > pos {
        Some(j)
    } else {
        None
    }
}
