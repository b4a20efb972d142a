//! Renders Markdown [`Event`]s into HTML. Compared with
//! [`pulldown_cmark::html::push_html`] this adds heading anchors, optional
//! `<br />` soft breaks, and `language-*` classes that a client-side
//! highlighter can pick up.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, LinkType, Tag};
use std::collections::HashMap;
use std::io;

/// Options controlling [`HtmlRenderer`] output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render soft line breaks as `<br />` rather than newlines.
    pub line_breaks: bool,

    /// Tag fenced code blocks with `class="language-{lang}"`.
    pub highlight: bool,
}

enum TableState {
    Head,
    Body,
}

/// A heading whose content is buffered until its end so its `id` can be
/// derived from its text.
struct Heading {
    level: u32,
    html: String,
    text: String,
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private [`HtmlWriter`
/// struct](https://github.com/raphlinus/pulldown-cmark/blob/bf0a1a4938dbd2ec41c3add069b3d361d11731f4/src/html.rs#L36-L50).
pub(crate) struct HtmlRenderer {
    options: RenderOptions,
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Set while inside an image; text events go to its `alt` attribute.
    image_title: Option<String>,

    /// Tags opened and not yet closed inside the current image.
    image_nesting: usize,

    heading: Option<Heading>,

    /// How many times each heading id has been handed out.
    heading_ids: HashMap<String, usize>,
}

impl HtmlRenderer {
    pub(crate) fn new(options: RenderOptions) -> Self {
        HtmlRenderer {
            options,
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            image_title: None,
            image_nesting: 0,
            heading: None,
            heading_ids: HashMap::new(),
        }
    }

    pub(crate) fn on_event<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match event {
            Event::Start(Tag::Heading(level)) if self.heading.is_none() => {
                self.heading = Some(Heading {
                    level,
                    html: String::new(),
                    text: String::new(),
                });
                Ok(())
            }
            Event::End(Tag::Heading(_)) if self.heading.is_some() => {
                match self.heading.take() {
                    Some(heading) => self.write_heading(w, heading),
                    None => Ok(()),
                }
            }
            event => match self.heading.take() {
                Some(mut heading) => {
                    if let Event::Text(text) | Event::Code(text) = &event {
                        heading.text.push_str(text);
                    }
                    let result = self.dispatch(&mut heading.html, event);
                    self.heading = Some(heading);
                    result
                }
                None => self.dispatch(w, event),
            },
        }
    }

    fn dispatch<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        if self.image_title.is_some() {
            return self.on_image_event(w, event);
        }

        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => {
                w.write_str("<code>")?;
                escape_html(&mut *w, &code)?;
                w.write_str("</code>")
            }
            Event::FootnoteReference(name) => {
                w.write_str(r##"<sup class="footnote-reference"><a href="#"##)?;
                escape_html(&mut *w, &name)?;
                w.write_str(r#"">"#)?;
                escape_html(&mut *w, &name)?;
                w.write_str("</a></sup>")
            }
            Event::HardBreak => w.write_str("<br />\n"),
            Event::Html(html) => w.write_str(&html),
            Event::Rule => w.write_str("<hr />\n"),
            Event::SoftBreak => match self.options.line_breaks {
                true => w.write_str("<br />\n"),
                false => w.write_str("\n"),
            },
            Event::TaskListMarker(checked) => write!(
                w,
                r#"<input disabled="" type="checkbox" {}/>"#,
                match checked {
                    true => r#"checked="" "#,
                    false => "",
                }
            ),
            Event::Text(text) => escape_html(w, &text),
        }
    }

    /// Handles events between the start and end of an image: their text makes
    /// up the `alt` attribute.
    fn on_image_event<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match event {
            Event::Start(_) => {
                self.image_nesting += 1;
                Ok(())
            }
            Event::End(_) if self.image_nesting > 0 => {
                self.image_nesting -= 1;
                Ok(())
            }
            Event::End(_) => {
                let title = self.image_title.take().unwrap_or_default();
                if !title.is_empty() {
                    w.write_str(r#"" title=""#)?;
                    escape_html(&mut *w, &title)?;
                }
                w.write_str(r#"" />"#)
            }
            Event::Text(text) | Event::Code(text) => escape_html(w, &text),
            _ => Ok(()),
        }
    }

    fn write_heading<W: StrWrite>(
        &mut self,
        w: &mut W,
        heading: Heading,
    ) -> io::Result<()> {
        let mut id = slug::slugify(&heading.text);
        let seen = self.heading_ids.entry(id.clone()).or_insert(0);
        if *seen > 0 {
            id = format!("{}-{}", id, seen);
        }
        *seen += 1;

        write!(w, "<h{}", heading.level)?;
        if !id.is_empty() {
            w.write_str(r#" id=""#)?;
            escape_html(&mut *w, &id)?;
            w.write_str(r#"""#)?;
        }
        write!(w, ">{}</h{}>\n", heading.html, heading.level)
    }

    fn on_start<'a, W: StrWrite>(
        &mut self,
        w: &mut W,
        tag: Tag<'a>,
    ) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => {
                let lang = match &kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split(' ').next().unwrap_or("")
                    }
                    CodeBlockKind::Indented => "",
                };
                match self.options.highlight && !lang.is_empty() {
                    true => {
                        w.write_str(r#"<pre><code class="language-"#)?;
                        escape_html(&mut *w, lang)?;
                        w.write_str(r#"">"#)
                    }
                    false => w.write_str("<pre><code>"),
                }
            }
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                w.write_str(r#"<div class="footnote-definition" id=""#)?;
                escape_html(&mut *w, &name)?;
                w.write_str(r#""><sup class="footnote-definition-label">"#)?;
                escape_html(&mut *w, &name)?;
                w.write_str("</sup>")
            }
            // Nested headings can't happen in CommonMark; render them plainly.
            Tag::Heading(level) => write!(w, "<h{}>", level),
            Tag::Image(_link_type, dest, title) => {
                w.write_str(r#"<img src=""#)?;
                escape_href(&mut *w, &dest)?;
                w.write_str(r#"" alt=""#)?;
                self.image_title = Some(title.to_string());
                Ok(())
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(link_type, dest, title) => {
                w.write_str(r#"<a href=""#)?;
                if let LinkType::Email = link_type {
                    w.write_str("mailto:")?;
                }
                escape_href(&mut *w, &dest)?;
                if !title.is_empty() {
                    w.write_str(r#"" title=""#)?;
                    escape_html(&mut *w, &title)?;
                }
                w.write_str(r#"">"#)
            }
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" style="text-align: left""#,
                    Some(Alignment::Right) => r#" style="text-align: right""#,
                    Some(Alignment::Center) => {
                        r#" style="text-align: center""#
                    }
                    _ => "",
                }
            ),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>\n"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            Tag::Image(..) => Ok(()), // handled by `on_image_event`
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(..) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>\n")
            }
            Tag::TableRow => w.write_str("</tr>\n"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }
}
