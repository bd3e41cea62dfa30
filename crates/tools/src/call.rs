//! Parsing of `name(args)` style invocations inside a reply.

use wigli_core::command::CommandArgs;

/// Argument text of the first `keyword` invocation in `reply`.
///
/// The keyword is matched case-insensitively, line by line, and must include
/// its opening parenthesis (e.g. `search_web(`). The argument runs to the
/// first `)` on that line, or to the end of the line. Blank arguments yield
/// `None`.
pub fn parse_call(reply: &str, keyword: &str) -> Option<CommandArgs> {
    let keyword = keyword.to_ascii_lowercase();
    let line = reply
        .lines()
        .find(|line| line.to_ascii_lowercase().contains(&keyword))?;
    let start = line.to_ascii_lowercase().find(&keyword)? + keyword.len();

    let mut argument = line[start..].trim();
    if let Some(end) = argument.find(')') {
        argument = &argument[..end];
    }
    let argument = argument.trim();
    (!argument.is_empty()).then(|| CommandArgs::new(argument))
}

/// Strip one layer of surrounding quote characters, double then single.
pub fn unquote(text: &str) -> &str {
    text.trim_matches('"').trim_matches('\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_text_up_to_paren() {
        let args = parse_call("Let me look.\nsearch_web('cats') then more", "search_web(").unwrap();
        assert_eq!(args.input, "'cats'");
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let args = parse_call("SEARCH_WEB(\"dogs\")", "search_web(").unwrap();
        assert_eq!(args.input, "\"dogs\"");
    }

    #[test]
    fn unterminated_call_runs_to_end_of_line() {
        let args = parse_call("summarize_url(example.com what is it\nbye", "summarize_url(").unwrap();
        assert_eq!(args.input, "example.com what is it");
    }

    #[test]
    fn first_matching_line_wins() {
        let reply = "search_web(first)\nsearch_web(second)";
        assert_eq!(parse_call(reply, "search_web(").unwrap().input, "first");
    }

    #[test]
    fn missing_or_blank_call_is_none() {
        assert!(parse_call("nothing here", "search_web(").is_none());
        assert!(parse_call("search_web( )", "search_web(").is_none());
    }

    #[test]
    fn unquote_strips_both_kinds() {
        assert_eq!(unquote("'cats'"), "cats");
        assert_eq!(unquote("\"cats\""), "cats");
        assert_eq!(unquote("\"'cats'\""), "cats");
        assert_eq!(unquote("cats"), "cats");
    }
}
