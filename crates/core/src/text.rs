//! Small text helpers: pluralization and filename slugs.

/// Words whose plural does not follow the suffix rules.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[("octopus", "octopi"), ("child", "children")];

/// Pick `word` or its plural depending on `count`.
pub fn plural(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        pluralize(word)
    }
}

/// Pluralize an English word, keeping the capitalization style of the input.
pub fn pluralize(word: &str) -> String {
    let Some(last) = word.chars().last() else {
        return String::new();
    };
    let lower = word.to_lowercase();

    let plural = if let Some((_, irregular)) = IRREGULAR_PLURALS.iter().find(|(w, _)| *w == lower)
    {
        (*irregular).to_string()
    } else {
        match last.to_ascii_lowercase() {
            's' => format!("{lower}es"),
            'y' => format!("{}ies", &lower[..lower.len() - last.len_utf8()]),
            _ => format!("{lower}s"),
        }
    };

    match_capitalization(&plural, word)
}

/// Re-case `target` to look like `model`: all-lower, all-upper,
/// alternating, or a character-by-character copy up to the point the two
/// spellings diverge.
fn match_capitalization(target: &str, model: &str) -> String {
    if model == model.to_lowercase() {
        return target.to_lowercase();
    }
    if model == model.to_uppercase() {
        return target.to_uppercase();
    }

    let model_chars: Vec<char> = model.chars().collect();
    let alternating = model_chars
        .windows(2)
        .all(|w| w[0].is_ascii_lowercase() != w[1].is_ascii_lowercase());
    if alternating {
        let mut lower = model_chars[0].is_ascii_lowercase();
        return target
            .chars()
            .map(|c| {
                let out = if lower { c.to_ascii_lowercase() } else { c.to_ascii_uppercase() };
                lower = !lower;
                out
            })
            .collect();
    }

    let mut out = String::with_capacity(target.len());
    let mut rest = target.chars();
    for m in model_chars {
        match rest.clone().next() {
            Some(t) if t.eq_ignore_ascii_case(&m) => {
                out.push(m);
                rest.next();
            }
            _ => break,
        }
    }
    out.extend(rest);
    out
}

/// Turn a conversation title into a filename-safe slug.
///
/// Keeps ASCII alphanumerics with their case, collapses everything else into
/// single underscores.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }
    slug
}
