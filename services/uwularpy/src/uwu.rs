//! Markdown Uwuification
//!
//! Rewrites the text runs of a CommonMark document and copies every other
//! byte of the source unchanged, so code, HTML, link destinations and
//! reference definitions survive.

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};

/// Text rewrite applied to every markdown file
pub trait TextTransform: Send + Sync {
    fn transform(&self, input: &str) -> String;
}

/// Deterministic uwu letter rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Uwuifier;

impl TextTransform for Uwuifier {
    fn transform(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len() + input.len() / 8);
        let mut copied = 0;
        let mut verbatim: Vec<bool> = Vec::new();

        for (event, range) in Parser::new_ext(input, parser_options()).into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if let Some(keep) = verbatim_tag(&tag) {
                        verbatim.push(keep);
                    }
                }
                Event::End(
                    TagEnd::CodeBlock | TagEnd::MetadataBlock(_) | TagEnd::Link | TagEnd::Image,
                ) => {
                    verbatim.pop();
                }
                // Escapes and entities have a source span that differs from
                // their text; those are left alone.
                Event::Text(text)
                    if !verbatim.contains(&true)
                        && range.start >= copied
                        && input[range.clone()] == *text =>
                {
                    out.push_str(&input[copied..range.start]);
                    uwuify_text(&input[range.clone()], &mut out);
                    copied = range.end;
                }
                _ => {}
            }
        }

        out.push_str(&input[copied..]);
        out
    }
}

/// Whether text inside `tag` must be copied as-is.
///
/// Code blocks and front matter are never prose. Autolinks show their
/// destination as text, and shortcut or collapsed references use their text
/// as the label that resolves the link.
fn verbatim_tag(tag: &Tag<'_>) -> Option<bool> {
    match tag {
        Tag::CodeBlock(_) | Tag::MetadataBlock(_) => Some(true),
        Tag::Link { link_type, .. } | Tag::Image { link_type, .. } => Some(matches!(
            link_type,
            LinkType::Autolink
                | LinkType::Email
                | LinkType::Shortcut
                | LinkType::ShortcutUnknown
                | LinkType::Collapsed
                | LinkType::CollapsedUnknown
        )),
        _ => None,
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Rewrite prose text, keeping bare URLs intact
fn uwuify_text(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(start) = find_url(rest) {
        uwuify_prose(&rest[..start], out);
        let url = &rest[start..];
        let end = url
            .find(|c: char| c.is_whitespace() || matches!(c, ')' | '>' | ']'))
            .unwrap_or(url.len());
        out.push_str(&url[..end]);
        rest = &url[end..];
    }
    uwuify_prose(rest, out);
}

fn find_url(text: &str) -> Option<usize> {
    match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn uwuify_prose(text: &str, out: &mut String) {
    let text = text.replace("ove", "uv").replace("OVE", "UV");
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            'r' | 'l' => out.push('w'),
            'R' | 'L' => out.push('W'),
            'n' | 'N' => {
                out.push(c);
                if let Some(next) = chars.peek().copied().filter(|n| is_vowel(*n)) {
                    out.push(if next.is_uppercase() && c.is_uppercase() {
                        'Y'
                    } else {
                        'y'
                    });
                }
            }
            _ => out.push(c),
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uwu(input: &str) -> String {
        Uwuifier.transform(input)
    }

    #[test]
    fn test_letter_rules() {
        assert_eq!(uwu("hello world"), "hewwo wowwd");
        assert_eq!(uwu("I love Rust"), "I wuv Wust");
        assert_eq!(uwu("nice"), "nyice");
        assert_eq!(uwu("NO LOVE"), "NYO WUV");
        assert_eq!(uwu("Now"), "Nyow");
    }

    #[test]
    fn test_untouched_markdown_is_byte_identical() {
        let input = "```rust\nlet r = 1;\n```\n\n<br>\n\n`code`\n";
        assert_eq!(uwu(input), input);
    }

    #[test]
    fn test_fenced_code_untouched() {
        let input = "Read this:\n```rust\nlet really = true;\n```\nall done\n";
        assert_eq!(
            uwu(input),
            "Wead this:\n```rust\nlet really = true;\n```\naww donye\n"
        );
    }

    #[test]
    fn test_tilde_fence_and_longer_closer() {
        let input = "~~~~\nrule\n~~~\nstill code\n~~~~~\nplain\n";
        assert_eq!(uwu(input), "~~~~\nrule\n~~~\nstill code\n~~~~~\npwain\n");
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let input = "hello\n```\nraw lines\n";
        assert_eq!(uwu(input), "hewwo\n```\nraw lines\n");
    }

    #[test]
    fn test_inline_code_untouched() {
        assert_eq!(uwu("run `cargo build` locally"), "wun `cargo build` wocawwy");
        assert_eq!(uwu("a ``tick ` inside`` here"), "a ``tick ` inside`` hewe");
    }

    #[test]
    fn test_unmatched_backtick_is_literal() {
        assert_eq!(uwu("stray ` tick"), "stway ` tick");
    }

    #[test]
    fn test_links_and_urls_untouched() {
        assert_eq!(
            uwu("see [the rules](https://example.org/rules) please"),
            "see [the wuwes](https://example.org/rules) pwease"
        );
        assert_eq!(
            uwu("visit https://crates.io/crates/rand now"),
            "visit https://crates.io/crates/rand nyow"
        );
        assert_eq!(uwu("<https://lorem.io> role"), "<https://lorem.io> wowe");
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(uwu("café lore ✨"), "café wowe ✨");
    }

    #[test]
    fn test_indented_code_untouched() {
        assert_eq!(
            uwu("Example:\n\n    let really = true;\n"),
            "Exampwe:\n\n    let really = true;\n"
        );
    }

    #[test]
    fn test_reference_definitions_untouched() {
        assert_eq!(
            uwu("[g]: ./docs/release-notes.md\n"),
            "[g]: ./docs/release-notes.md\n"
        );
        assert_eq!(
            uwu("See the [release notes][g].\n\n[g]: ./docs/release-notes.md\n"),
            "See the [wewease nyotes][g].\n\n[g]: ./docs/release-notes.md\n"
        );
    }

    #[test]
    fn test_shortcut_reference_label_untouched() {
        let input = "Read the [release notes].\n\n[release notes]: ./NOTES.md\n";
        assert_eq!(
            uwu(input),
            "Wead the [release notes].\n\n[release notes]: ./NOTES.md\n"
        );
    }

    #[test]
    fn test_html_block_untouched() {
        let input = "<div align=\"center\">\n  <img src=\"logo.png\">\n</div>\n\nhello\n";
        assert_eq!(
            uwu(input),
            "<div align=\"center\">\n  <img src=\"logo.png\">\n</div>\n\nhewwo\n"
        );
    }
}
