//! Splits reply text into prose and fenced code so the terminal view can
//! frame code blocks. Prose is returned exactly as written; whitespace-only
//! gaps between blocks are dropped.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSegment {
    Text(String),
    Code {
        language: Option<String>,
        code: String,
    },
}

fn language_hint(info: &str) -> Option<String> {
    info.split_ascii_whitespace().next().map(str::to_string)
}

pub fn segment_content(content: &str) -> Vec<ContentSegment> {
    let mut segments = Vec::new();
    let mut last_end = 0;
    let mut open: Option<(Option<String>, String)> = None;

    for (event, range) in Parser::new_ext(content, Options::all()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                push_text(&mut segments, &content[last_end..range.start]);
                open = Some((language_hint(&info), String::new()));
                last_end = range.end;
            }
            Event::Text(text) => {
                if let Some((_, code)) = open.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, code)) = open.take() {
                    segments.push(ContentSegment::Code { language, code });
                    last_end = range.end;
                }
            }
            _ => {}
        }
    }

    push_text(&mut segments, &content[last_end..]);
    segments
}

fn push_text(segments: &mut Vec<ContentSegment>, text: &str) {
    if !text.trim().is_empty() {
        segments.push(ContentSegment::Text(text.to_string()));
    }
}
