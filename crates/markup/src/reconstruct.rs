//! Annotation reconstruction
//!
//! Spans are applied right to left over the UTF-16 encoding of the text. Each
//! step consumes the tail of a shrinking buffer, so offsets that lie further
//! left stay valid without being re-derived. The emitted segments are collected
//! right to left and reversed once at the end.

use contracts::Annotation;

use crate::error::{MarkupError, Result};
use crate::escape::{escape_attr, escape_text};

/// Rendering options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkupOptions {
    /// Escape `& < >` in literal and link text.
    ///
    /// Off by default: text is passed through as the upstream wrote it and
    /// `reconstruct(t, [])` is the identity. Link targets are always escaped.
    pub escape_text: bool,
}

/// Reconstruct markup with default options
///
/// # Errors
/// `OffsetOutOfBounds` / `SplitSurrogate` on malformed link spans
pub fn reconstruct(text: &str, annotations: &[Annotation]) -> Result<String> {
    reconstruct_with(text, annotations, MarkupOptions::default())
}

/// Reconstruct markup from text and its annotations
///
/// Only link annotations are rendered. Overlapping links are not merged: the
/// right-to-left walk clips a span at the start of the link to its right.
///
/// # Errors
/// `OffsetOutOfBounds` / `SplitSurrogate` on malformed link spans
pub fn reconstruct_with(
    text: &str,
    annotations: &[Annotation],
    options: MarkupOptions,
) -> Result<String> {
    let mut links: Vec<LinkSpan<'_>> = annotations
        .iter()
        .filter_map(LinkSpan::from_annotation)
        .collect();

    if links.is_empty() {
        return Ok(render_text(text, options).into_owned());
    }

    let units: Vec<u16> = text.encode_utf16().collect();
    for link in &links {
        link.validate(&units)?;
    }

    // Stable: links sharing an offset keep their input order.
    links.sort_by(|a, b| b.offset.cmp(&a.offset));

    let (mut segments, end) = links.iter().try_fold(
        (Vec::with_capacity(links.len() * 2 + 1), units.len()),
        |(mut segments, end), link| {
            let span_end = (link.offset + link.length).min(end);
            segments.push(render_text(&decode(&units, span_end, end)?, options).into_owned());
            segments.push(link.render(&decode(&units, link.offset, span_end)?, options));
            Ok::<_, MarkupError>((segments, link.offset))
        },
    )?;
    segments.push(render_text(&decode(&units, 0, end)?, options).into_owned());

    segments.reverse();
    Ok(segments.concat())
}

struct LinkSpan<'a> {
    offset: usize,
    length: usize,
    target: &'a str,
}

impl<'a> LinkSpan<'a> {
    fn from_annotation(annotation: &'a Annotation) -> Option<Self> {
        annotation.link_target().map(|target| Self {
            offset: annotation.offset,
            length: annotation.length,
            target,
        })
    }

    fn validate(&self, units: &[u16]) -> Result<()> {
        let end = self
            .offset
            .checked_add(self.length)
            .filter(|&end| end <= units.len())
            .ok_or(MarkupError::OffsetOutOfBounds {
                offset: self.offset,
                length: self.length,
                text_len: units.len(),
            })?;

        for position in [self.offset, end] {
            if splits_surrogate(units, position) {
                return Err(MarkupError::SplitSurrogate { position });
            }
        }
        Ok(())
    }

    fn render(&self, inner: &str, options: MarkupOptions) -> String {
        format!(
            "<a href=\"{}\">{}</a>",
            escape_attr(self.target),
            render_text(inner, options)
        )
    }
}

fn render_text(text: &str, options: MarkupOptions) -> std::borrow::Cow<'_, str> {
    if options.escape_text {
        escape_text(text)
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}

fn splits_surrogate(units: &[u16], position: usize) -> bool {
    if position == 0 || position >= units.len() {
        return false;
    }
    let high = (0xD800..=0xDBFF).contains(&units[position - 1]);
    let low = (0xDC00..=0xDFFF).contains(&units[position]);
    high && low
}

fn decode(units: &[u16], from: usize, to: usize) -> Result<String> {
    String::from_utf16(&units[from..to]).map_err(|_| MarkupError::SplitSurrogate { position: from })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::AnnotationKind;

    /// Same walk, indexed by `char` instead of UTF-16 units.
    fn naive_scalar_reconstruct(text: &str, annotations: &[Annotation]) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut links: Vec<(usize, usize, &str)> = annotations
            .iter()
            .filter_map(|a| a.link_target().map(|t| (a.offset, a.length, t)))
            .collect();
        links.sort_by(|a, b| b.0.cmp(&a.0));

        let mut end = chars.len();
        let mut segments = Vec::new();
        for (offset, length, target) in links {
            let span_end = (offset + length).min(end);
            segments.push(chars[span_end..end].iter().collect::<String>());
            let inner: String = chars[offset..span_end].iter().collect();
            segments.push(format!("<a href=\"{target}\">{inner}</a>"));
            end = offset;
        }
        segments.push(chars[..end].iter().collect());
        segments.reverse();
        segments.concat()
    }

    #[test]
    fn test_identity_without_annotations() {
        for text in ["", "plain", "a < b & c", "😀 emoji 🎉", "многоязычный текст"] {
            assert_eq!(reconstruct(text, &[]).unwrap(), text);
        }
    }

    #[test]
    fn test_non_link_annotations_pass_through() {
        let annotations = vec![
            Annotation::new(0, 4, AnnotationKind::Bold),
            Annotation::new(5, 2, AnnotationKind::Other),
        ];
        assert_eq!(reconstruct("bold it", &annotations).unwrap(), "bold it");
    }

    #[test]
    fn test_single_link() {
        let out = reconstruct("See docs here", &[Annotation::link(4, 4, "https://x")]).unwrap();
        assert_eq!(out, "See <a href=\"https://x\">docs</a> here");
    }

    #[test]
    fn test_two_disjoint_links_keep_order() {
        let annotations = vec![
            Annotation::link(0, 4, "https://a"),
            Annotation::link(9, 5, "https://b"),
        ];
        let out = reconstruct("Read and click", &annotations).unwrap();
        assert_eq!(
            out,
            "<a href=\"https://a\">Read</a> and <a href=\"https://b\">click</a>"
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = vec![
            Annotation::link(0, 1, "https://a"),
            Annotation::link(2, 1, "https://b"),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();
        assert_eq!(
            reconstruct("x y", &forward).unwrap(),
            reconstruct("x y", &backward).unwrap()
        );
    }

    #[test]
    fn test_ascii_matches_naive_scalar_offsets() {
        let fixtures: Vec<(&str, Vec<Annotation>)> = vec![
            ("See docs here", vec![Annotation::link(4, 4, "https://x")]),
            (
                "one two three four",
                vec![
                    Annotation::link(0, 3, "https://1"),
                    Annotation::link(8, 5, "https://3"),
                    Annotation::new(4, 3, AnnotationKind::Italic),
                ],
            ),
            ("edge", vec![Annotation::link(0, 4, "https://all")]),
            ("tail link", vec![Annotation::link(5, 4, "https://t")]),
            ("empty span", vec![Annotation::link(5, 0, "https://e")]),
        ];

        for (text, annotations) in fixtures {
            assert_eq!(
                reconstruct(text, &annotations).unwrap(),
                naive_scalar_reconstruct(text, &annotations),
                "fixture: {text:?}"
            );
        }
    }

    #[test]
    fn test_surrogate_pair_counts_two_units() {
        // "😀" is one char but two UTF-16 units; "docs" starts at unit 3.
        let text = "😀 docs";
        let annotations = vec![Annotation::link(3, 4, "https://x")];

        let out = reconstruct(text, &annotations).unwrap();
        assert_eq!(out, "😀 <a href=\"https://x\">docs</a>");

        // Char indexing lands one position too far right.
        assert_eq!(
            naive_scalar_reconstruct(text, &annotations),
            "😀 d<a href=\"https://x\">ocs</a>"
        );
    }

    #[test]
    fn test_bmp_non_ascii_is_one_unit_per_char() {
        let out = reconstruct("Привет мир", &[Annotation::link(7, 3, "https://ru")]).unwrap();
        assert_eq!(out, "Привет <a href=\"https://ru\">мир</a>");
    }

    #[test]
    fn test_link_after_several_emoji() {
        let text = "🎉🎉 go";
        let out = reconstruct(text, &[Annotation::link(5, 2, "https://go")]).unwrap();
        assert_eq!(out, "🎉🎉 <a href=\"https://go\">go</a>");
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let err = reconstruct("abc", &[Annotation::link(2, 2, "https://x")]).unwrap_err();
        assert_eq!(
            err,
            MarkupError::OffsetOutOfBounds {
                offset: 2,
                length: 2,
                text_len: 3
            }
        );

        // Two units of emoji: length 3 overflows.
        assert!(matches!(
            reconstruct("😀", &[Annotation::link(0, 3, "https://x")]),
            Err(MarkupError::OffsetOutOfBounds { text_len: 2, .. })
        ));
        assert!(reconstruct("😀", &[Annotation::link(0, 2, "https://x")]).is_ok());
    }

    #[test]
    fn test_offset_overflow_is_out_of_bounds() {
        let annotations = vec![Annotation::link(usize::MAX, 2, "https://x")];
        assert!(matches!(
            reconstruct("abc", &annotations),
            Err(MarkupError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_split_surrogate_is_an_error() {
        let err = reconstruct("😀", &[Annotation::link(1, 1, "https://x")]).unwrap_err();
        assert_eq!(err, MarkupError::SplitSurrogate { position: 1 });
    }

    #[test]
    fn test_deterministic() {
        let annotations = vec![
            Annotation::link(0, 2, "https://a"),
            Annotation::link(3, 2, "https://b"),
        ];
        let first = reconstruct("ab 🙂 cd", &annotations).unwrap();
        let second = reconstruct("ab 🙂 cd", &annotations).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_target_is_attribute_escaped() {
        let out = reconstruct("x", &[Annotation::link(0, 1, "https://x/?a=\"1\"&b=<2>")]).unwrap();
        assert_eq!(
            out,
            "<a href=\"https://x/?a=&quot;1&quot;&amp;b=&lt;2&gt;\">x</a>"
        );
    }

    #[test]
    fn test_escape_text_option() {
        let options = MarkupOptions { escape_text: true };
        let out =
            reconstruct_with("1 < 2 & see", &[Annotation::link(8, 3, "https://x")], options)
                .unwrap();
        assert_eq!(out, "1 &lt; 2 &amp; <a href=\"https://x\">see</a>");

        assert_eq!(reconstruct_with("<b>", &[], options).unwrap(), "&lt;b&gt;");
        // Default leaves text untouched.
        assert_eq!(reconstruct("<b>", &[]).unwrap(), "<b>");
    }

    #[test]
    fn test_overlapping_links_clip_left_span() {
        let annotations = vec![
            Annotation::link(0, 4, "https://x"),
            Annotation::link(2, 4, "https://y"),
        ];
        let out = reconstruct("abcdef", &annotations).unwrap();
        assert_eq!(
            out,
            "<a href=\"https://x\">ab</a><a href=\"https://y\">cdef</a>"
        );
    }
}
