use serde_json::Value;

/// Which repair rules fired while fixing a malformed JSON fragment,
/// surfaced so the pipeline can track how often each class of model
/// mistake occurs across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// A trailing comma before `}` or `]` was removed.
    pub trailing_commas_removed: u32,
    /// Single-quoted strings were rewritten to double-quoted.
    pub single_quotes_rewritten: u32,
    /// Unescaped literal newlines inside string values were escaped.
    pub embedded_newlines_escaped: u32,
    /// A bareword `True`/`False`/`None` was rewritten to JSON's
    /// `true`/`false`/`null`.
    pub python_literals_rewritten: u32,
    /// An unterminated string at end-of-input was closed.
    pub unterminated_strings_closed: u32,
    /// A missing closing brace/bracket was appended.
    pub unbalanced_braces_closed: u32,
}

/// Applies a fixed sequence of textual repair rules to `fragment` and
/// tries to parse the result, recording which rules actually changed
/// something.
///
/// Each rule is a narrow, mechanical fix for one specific way models
/// drift from strict JSON; rules are applied unconditionally and are
/// no-ops when their pattern doesn't occur, so rule order only matters
/// where one rule's output could feed another (python literals before
/// quote rewriting, since `None` must be be caught before its quotes,
/// if any, are touched).
#[must_use]
pub fn repair_json(fragment: &str) -> Option<(Value, RepairStats)> {
    let mut stats = RepairStats::default();
    let mut text = fragment.to_owned();

    text = rewrite_python_literals(&text, &mut stats);
    text = rewrite_single_quotes(&text, &mut stats);
    text = remove_trailing_commas(&text, &mut stats);
    text = escape_embedded_newlines(&text, &mut stats);
    text = close_unterminated_string(&text, &mut stats);
    text = balance_braces(&text, &mut stats);

    serde_json::from_str(&text).ok().map(|value| (value, stats))
}

fn rewrite_python_literals(text: &str, stats: &mut RepairStats) -> String {
    let mut out = text.to_owned();
    for (from, to) in [("True", "true"), ("False", "false"), ("None", "null")] {
        let replaced = replace_bareword(&out, from, to);
        if replaced != out {
            stats.python_literals_rewritten += 1;
        }
        out = replaced;
    }
    out
}

/// Replaces `from` with `to` only where `from` appears as a standalone
/// token (not inside a quoted string), since string content may
/// legitimately contain these words.
fn replace_bareword(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch == '"' && !text[..i].ends_with('\\') {
            in_string = !in_string;
        }
        if !in_string && text[i..].starts_with(from) {
            let boundary_ok = text[i + from.len()..]
                .chars()
                .next()
                .map_or(true, |next| !next.is_alphanumeric());
            if boundary_ok {
                out.push_str(to);
                for _ in 1..from.len() {
                    chars.next();
                }
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn rewrite_single_quotes(text: &str, stats: &mut RepairStats) -> String {
    if !text.contains('\'') || text.contains('"') {
        // If the fragment already has double quotes we assume it's
        // mixed-content rather than single-quoted JSON and leave it
        // alone; a single-quote-only fragment is the common case this
        // rule targets.
        return text.to_owned();
    }
    stats.single_quotes_rewritten += 1;
    text.replace('\'', "\"")
}

fn remove_trailing_commas(text: &str, stats: &mut RepairStats) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                stats.trailing_commas_removed += 1;
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn escape_embedded_newlines(text: &str, stats: &mut RepairStats) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut prev_escape = false;
    for ch in text.chars() {
        if ch == '"' && !prev_escape {
            in_string = !in_string;
        }
        if in_string && ch == '\n' {
            out.push_str("\\n");
            stats.embedded_newlines_escaped += 1;
        } else {
            out.push(ch);
        }
        prev_escape = ch == '\\' && !prev_escape;
    }
    out
}

fn close_unterminated_string(text: &str, stats: &mut RepairStats) -> String {
    let mut in_string = false;
    let mut prev_escape = false;
    for ch in text.chars() {
        if ch == '"' && !prev_escape {
            in_string = !in_string;
        }
        prev_escape = ch == '\\' && !prev_escape;
    }
    if in_string {
        stats.unterminated_strings_closed += 1;
        format!("{text}\"")
    } else {
        text.to_owned()
    }
}

fn balance_braces(text: &str, stats: &mut RepairStats) -> String {
    let opens = text.chars().filter(|&c| c == '{').count();
    let closes = text.chars().filter(|&c| c == '}').count();
    let bracket_opens = text.chars().filter(|&c| c == '[').count();
    let bracket_closes = text.chars().filter(|&c| c == ']').count();

    let mut out = text.to_owned();
    if bracket_opens > bracket_closes {
        stats.unbalanced_braces_closed += 1;
        out.push_str(&"]".repeat(bracket_opens - bracket_closes));
    }
    if opens > closes {
        stats.unbalanced_braces_closed += 1;
        out.push_str(&"}".repeat(opens - closes));
    }
    out
}
