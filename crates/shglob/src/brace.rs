//! Brace expansion: `{a,b,c}`, `{1..10..2}`, `{a..z}`.
//!
//! Purely textual, independent of the filesystem. One word expands into N
//! sibling words; expansion recurses until no expandable group remains and
//! is idempotent on brace-free text.
//!
//! Comma-splitting takes priority: range syntax is only considered when a
//! group contains no top-level comma. Malformed ranges fall through to
//! ordinary (non-expanding) text.

/// Expand brace groups in a word.
///
/// # Examples
/// ```
/// use shglob::brace::expand_braces;
///
/// assert_eq!(expand_braces("simple"), vec!["simple"]);
/// assert_eq!(expand_braces("{a,b}.txt"), vec!["a.txt", "b.txt"]);
/// assert_eq!(expand_braces("file{1..3}"), vec!["file1", "file2", "file3"]);
/// ```
pub fn expand_braces(word: &str) -> Vec<String> {
    expand_braces_with(word, false)
}

/// Expand brace groups, optionally treating comma-free, range-free groups as
/// character classes that must stay literal.
pub fn expand_braces_with(word: &str, class_mode: bool) -> Vec<String> {
    match expand_one(word, class_mode) {
        Some(words) => words
            .iter()
            .flat_map(|w| expand_braces_with(w, class_mode))
            .collect(),
        None => vec![word.to_string()],
    }
}

/// Splice expanded words into a word list in place of the word at `position`.
///
/// The same shape as glob expansion: the original word is removed and its
/// expansions inserted at its position.
pub fn expand_braces_into(words: &mut Vec<String>, position: usize) {
    if position >= words.len() {
        return;
    }
    let expanded = expand_braces(&words[position]);
    words.splice(position..=position, expanded);
}

/// Find and expand the leftmost expandable construct, if any.
fn expand_one(word: &str, class_mode: bool) -> Option<Vec<String>> {
    let chars: Vec<char> = word.chars().collect();
    let mut search_from = 0;

    while let Some((start, end)) = find_group(&chars, search_from) {
        let prefix: String = chars[..start].iter().collect();
        let suffix: String = chars[end + 1..].iter().collect();
        let content: String = chars[start + 1..end].iter().collect();

        if has_toplevel_comma(&content) {
            // Comma list beats range syntax at the same nesting level.
            let words = split_alternatives(&content)
                .into_iter()
                .map(|alt| format!("{}{}{}", prefix, alt, suffix))
                .collect();
            return Some(words);
        }

        if let Some(items) = expand_range(&content) {
            let words = items
                .into_iter()
                .map(|item| format!("{}{}{}", prefix, item, suffix))
                .collect();
            return Some(words);
        }

        if !class_mode {
            // No comma or range here, but a nested group inside the content
            // may still expand: `{a{b,c}d}` becomes `{abd}` and `{acd}`.
            let inner = expand_braces_with(&content, class_mode);
            if inner.len() != 1 || inner[0] != content {
                let words = inner
                    .into_iter()
                    .map(|item| format!("{}{{{}}}{}", prefix, item, suffix))
                    .collect();
                return Some(words);
            }
        }

        // Unexpandable group (a character class, or plain text in braces):
        // leave it and look for the next group.
        search_from = end + 1;
    }

    None
}

/// Locate the first top-level `{...}` pair at or after `from`.
fn find_group(chars: &[char], from: usize) -> Option<(usize, usize)> {
    let mut depth = 0;
    let mut start = None;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate().skip(from) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            return Some((s, i));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    None
}

fn has_toplevel_comma(content: &str) -> bool {
    let mut depth = 0;
    for c in content.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Split brace content by commas, respecting nested braces.
fn split_alternatives(content: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0;

    for c in content.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                alternatives.push(current);
                current = String::new();
            }
            _ => current.push(c),
        }
    }

    alternatives.push(current);
    alternatives
}

/// Expand `{A..B}` / `{A..B..C}` numeric ranges and `{x..y}` character
/// ranges. Returns `None` for anything malformed.
fn expand_range(content: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = content.split("..").collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    if let (Some(a), Some(b)) = (parse_int(parts[0]), parse_int(parts[1])) {
        let step = match parts.get(2) {
            Some(s) => parse_int(s)?,
            None => 1,
        };
        return Some(numeric_range(a, b, step, &parts));
    }

    if parts.len() == 2 {
        return char_range(parts[0], parts[1]);
    }

    None
}

fn parse_int(s: &str) -> Option<i64> {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Zero-pad width: the widest literal, if any endpoint or step was written
/// with a leading zero. Which operand carried the zero is irrelevant.
fn pad_width(parts: &[&str]) -> usize {
    fn digits(s: &str) -> &str {
        s.strip_prefix('-').unwrap_or(s)
    }
    let padded = parts
        .iter()
        .any(|p| digits(p).len() > 1 && digits(p).starts_with('0'));
    if padded {
        parts.iter().map(|p| digits(p).len()).max().unwrap_or(0)
    } else {
        0
    }
}

fn numeric_range(a: i64, b: i64, step: i64, parts: &[&str]) -> Vec<String> {
    let width = pad_width(parts);
    let stride = step.unsigned_abs().max(1);

    let mut values = Vec::new();
    let mut v = a;
    if b >= a {
        while v <= b {
            values.push(v);
            v += stride as i64;
        }
    } else {
        while v >= b {
            values.push(v);
            v -= stride as i64;
        }
    }

    // A negative step reverses the enumeration, so B<A with C<0 comes back
    // out ascending.
    if step < 0 {
        values.reverse();
    }

    values
        .into_iter()
        .map(|v| {
            if width > 0 {
                let sign = if v < 0 { "-" } else { "" };
                format!("{}{:0>width$}", sign, v.abs(), width = width)
            } else {
                v.to_string()
            }
        })
        .collect()
}

/// `{x..y}` over single characters (not digit sequences).
fn char_range(x: &str, y: &str) -> Option<Vec<String>> {
    let mut xs = x.chars();
    let mut ys = y.chars();
    let (cx, cy) = (xs.next()?, ys.next()?);
    if xs.next().is_some() || ys.next().is_some() {
        return None;
    }

    let (lo, hi) = (cx.min(cy) as u32, cx.max(cy) as u32);
    let mut out: Vec<String> = (lo..=hi)
        .filter_map(char::from_u32)
        .map(String::from)
        .collect();
    if cx > cy {
        out.reverse();
    }
    Some(out)
}
