//! Rule-based Hebrew affix splitting.
//!
//! Hebrew attaches the definite article, conjunctions and several
//! prepositions to the front of a word, and plural and possessive endings to
//! its back. Without a morphological analyzer, "הדרכים" and "דרך" never match
//! lexically. The splitter replaces every token with the token itself plus
//! the candidate base forms obtained by stripping known prefixes and
//! suffixes, and lets term weighting sort out the noise.

/// One-letter prefixes: article, conjunction and prepositions.
const PREFIXES: [char; 7] = ['ה', 'ו', 'ב', 'ל', 'ש', 'כ', 'מ'];

/// Two-letter suffixes, tried before the one-letter ones.
const SUFFIXES_2: [&str; 2] = ["ים", "ות"];

const SUFFIXES_1: [char; 3] = ['י', 'ה', 'ו'];

/// Map a letter to its word-final form, if it has one.
fn final_form(c: char) -> Option<char> {
    match c {
        'כ' => Some('ך'),
        'מ' => Some('ם'),
        'נ' => Some('ן'),
        'פ' => Some('ף'),
        'צ' => Some('ץ'),
        _ => None,
    }
}

/// Replace the last letter with its word-final form where one exists.
///
/// Idempotent: final forms have no final form of their own.
pub fn normalize_final_letter(token: &str) -> String {
    let mut chars: Vec<char> = token.chars().collect();
    if let Some(last) = chars.last_mut() {
        if let Some(sofit) = final_form(*last) {
            *last = sofit;
        }
    }
    chars.into_iter().collect()
}

/// Expands Hebrew tokens into their candidate base forms.
#[derive(Debug, Clone, Default)]
pub struct AffixSplitter;

impl AffixSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Expand every whitespace-separated token of `text`.
    pub fn split_text(&self, text: &str) -> String {
        let mut out = Vec::new();
        for token in text.split_whitespace() {
            self.expand_token(token, &mut out);
        }
        out.join(" ")
    }

    /// Append the expansions of one token to `out`.
    ///
    /// Order: the token itself, then each prefix-stripped remainder followed
    /// by its own suffix chain, then the suffix chain of the token.
    pub fn expand_token(&self, token: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = token.chars().collect();
        emit(&chars, out);

        let mut start = 0;
        while chars.len() - start > 1 && PREFIXES.contains(&chars[start]) {
            start += 1;
            let remainder = &chars[start..];
            emit(remainder, out);
            strip_suffixes(remainder, out);
        }

        strip_suffixes(&chars, out);
    }
}

/// Repeatedly strip a known suffix, emitting what is left after each strip.
fn strip_suffixes(word: &[char], out: &mut Vec<String>) {
    let mut end = word.len();
    while end > 1 {
        let rest = &word[..end];
        if ends_with_two_letter_suffix(rest) {
            end -= 2;
        } else if SUFFIXES_1.contains(&rest[end - 1]) {
            end -= 1;
        } else {
            break;
        }
        emit(&word[..end], out);
    }
}

fn ends_with_two_letter_suffix(word: &[char]) -> bool {
    let tail: String = word[word.len() - 2..].iter().collect();
    SUFFIXES_2.contains(&tail.as_str())
}

/// Emit a candidate unless it is a single letter or empty.
fn emit(candidate: &[char], out: &mut Vec<String>) {
    if candidate.len() > 1 {
        let text: String = candidate.iter().collect();
        out.push(normalize_final_letter(&text));
    }
}
