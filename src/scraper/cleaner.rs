use once_cell::sync::Lazy;
use regex::Regex;

// ── Numeric token cleaning ────────────────────────────────────────────────────

/// Grouped-numeric pattern: "21.050", "76.500.000", "21,05" or bare digits.
/// The grouped branch needs at least one separator; otherwise it would bite
/// the first 1–3 digits off an ungrouped integer like "148300".
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,3}(?:[.,]\d{3})+(?:[.,]\d+)?|\d+(?:[.,]\d+)?").expect("numeric token regex")
});

/// Display-preserving clean: return the first numeric-looking token with its
/// original separator style intact.
/// "  21.050 đ" → "21.050" | "21,050" → "21,050" | "n/a" → "n/a"
pub fn clean_display(s: &str) -> String {
    let trimmed = s.replace('\u{a0}', " ");
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match NUMERIC_TOKEN.find(trimmed) {
        Some(m) => m.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

/// Decimal-normalizing clean (gold buy/sell values): comma-decimal becomes
/// dot-decimal, trailing zeros and a trailing point are stripped.
/// "100,500" → "100.5" | "100,000" → "100" | "148,300" → "148.3"
pub fn clean_decimal(s: &str) -> String {
    let trimmed = s.replace('\u{a0}', " ");
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let dotted = trimmed.replace(',', ".");
    match dotted.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => format!("{}", v as i64),
        // `{}` renders the shortest representation, which already drops
        // trailing zeros after the point.
        Ok(v) => format!("{}", v),
        Err(_) => trimmed.to_string(),
    }
}

// ── Markup cleanup ────────────────────────────────────────────────────────────

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));

/// Drop any markup remaining inside a captured text fragment.
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").trim().to_string()
}

/// Unescape the five basic HTML entities.
///
/// The ampersand must be unescaped after the other four: doing it earlier
/// turns "&amp;lt;" into "&lt;" and then into "<", mangling titles that
/// legitimately contain escaped entities.
pub fn unescape_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

// ── Ordered dedup capper ──────────────────────────────────────────────────────

/// Collect unique non-empty strings up to `cap`, preserving first-seen order.
pub fn dedup_cap<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if item.is_empty() || out.contains(&item) {
            continue;
        }
        out.push(item);
        if out.len() >= cap {
            break;
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
