use std::io::{self, Write};

use crate::entry::{Entry, Metadata};

/// Babylon glossary source. The `h` type sequence marks the definitions as
/// HTML; alternate headwords ride on the headword line, pipe-separated.
pub fn write_gls<W: Write>(writer: &mut W, entries: &[Entry], meta: &Metadata) -> io::Result<()> {
    write!(
        writer,
        "\n#stripmethod=keep\n#sametypesequence=h\n#bookname={}\n#author={}\n\n",
        meta.title.as_deref().unwrap_or(""),
        meta.creator.as_deref().unwrap_or("")
    )?;
    for entry in entries {
        if entry.inflections.is_empty() {
            write!(writer, "{}\n{}\n\n", entry.headword, entry.body)?;
        } else {
            let forms: Vec<&str> = entry.inflections.iter().map(String::as_str).collect();
            write!(
                writer,
                "{}|{}\n{}\n\n",
                entry.headword,
                forms.join("|"),
                entry.body
            )?;
        }
    }
    writer.flush()
}

/// StarDict Textual Dictionary Format. Inflections become `<synonym>`
/// elements so viewers resolve them to the same article; definitions stay
/// raw HTML inside CDATA.
pub fn write_textual<W: Write>(
    writer: &mut W,
    entries: &[Entry],
    meta: &Metadata,
) -> io::Result<()> {
    writeln!(writer, "<?xml version='1.0' encoding='UTF-8'?>")?;
    writeln!(writer, "<stardict>")?;
    writeln!(writer, "  <info>")?;
    writeln!(writer, "    <version>3.0.0</version>")?;
    writeln!(
        writer,
        "    <bookname>{}</bookname>",
        escape_xml(meta.title.as_deref().unwrap_or(""))
    )?;
    writeln!(
        writer,
        "    <author>{}</author>",
        escape_xml(meta.creator.as_deref().unwrap_or(""))
    )?;
    writeln!(
        writer,
        "    <description>{}</description>",
        escape_xml(meta.description.as_deref().unwrap_or(""))
    )?;
    writeln!(writer, "    <email></email>")?;
    writeln!(writer, "    <website></website>")?;
    writeln!(
        writer,
        "    <date>{}</date>",
        escape_xml(meta.date.as_deref().unwrap_or(""))
    )?;
    writeln!(writer, "    <dicttype></dicttype>")?;
    writeln!(writer, "  </info>")?;
    for entry in entries {
        writeln!(writer, "  <article>")?;
        writeln!(writer, "    <key>{}</key>", escape_xml(&entry.headword))?;
        for form in &entry.inflections {
            writeln!(writer, "    <synonym>{}</synonym>", escape_xml(form))?;
        }
        writeln!(
            writer,
            "    <definition type=\"h\"><![CDATA[{}]]></definition>",
            cdata_escape(&entry.body)
        )?;
        writeln!(writer, "  </article>")?;
    }
    write!(writer, "</stardict>")?;
    writer.flush()
}

/// One JSON object per line, in collated order.
pub fn write_jsonl<W: Write>(writer: &mut W, entries: &[Entry]) -> io::Result<()> {
    for entry in entries {
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// A body containing a literal "]]>" would terminate the CDATA section early;
// split it across two sections.
fn cdata_escape(body: &str) -> String {
    body.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(headword: &str, inflections: &[&str], body: &str) -> Entry {
        Entry {
            headword: headword.to_string(),
            inflections: inflections.iter().map(|s| s.to_string()).collect(),
            body: body.to_string(),
        }
    }

    fn meta() -> Metadata {
        Metadata {
            title: Some("Test Dict".to_string()),
            creator: Some("someone".to_string()),
            date: Some("29/08/2026".to_string()),
            ..Default::default()
        }
    }

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        write(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn gls_header_and_entry_layout() {
        let entries = vec![entry("cat", &[], "<b>1.</b> a small feline")];
        let out = render(|w| write_gls(w, &entries, &meta()));
        assert_eq!(
            out,
            "\n#stripmethod=keep\n#sametypesequence=h\n#bookname=Test Dict\n#author=someone\n\n\
             cat\n<b>1.</b> a small feline\n\n"
        );
    }

    #[test]
    fn gls_joins_inflections_with_pipes() {
        let entries = vec![entry("run", &["ran", "running"], "to move fast")];
        let out = render(|w| write_gls(w, &entries, &meta()));
        assert!(out.contains("run|ran|running\nto move fast\n\n"));
    }

    #[test]
    fn textual_contains_info_block_and_articles() {
        let entries = vec![entry("run", &["ran"], "to move fast")];
        let out = render(|w| write_textual(w, &entries, &meta()));
        assert!(out.starts_with("<?xml version='1.0' encoding='UTF-8'?>\n<stardict>"));
        assert!(out.contains("<bookname>Test Dict</bookname>"));
        assert!(out.contains("<date>29/08/2026</date>"));
        assert!(out.contains("<key>run</key>"));
        assert!(out.contains("<synonym>ran</synonym>"));
        assert!(out.contains("<definition type=\"h\"><![CDATA[to move fast]]></definition>"));
        assert!(out.ends_with("</stardict>"));
    }

    #[test]
    fn textual_escapes_keys_and_splits_cdata() {
        let entries = vec![entry("AT&T", &[], "ends with ]]> inside")];
        let out = render(|w| write_textual(w, &entries, &meta()));
        assert!(out.contains("<key>AT&amp;T</key>"));
        assert!(out.contains("<![CDATA[ends with ]]]]><![CDATA[> inside]]>"));
    }

    #[test]
    fn jsonl_writes_one_entry_per_line() {
        let entries = vec![
            entry("cat", &[], "feline"),
            entry("dog", &["dogs"], "canine"),
        ];
        let out = render(|w| write_jsonl(w, &entries));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"headword":"cat","body":"feline"}"#
        );
        assert_eq!(
            lines[1],
            r#"{"headword":"dog","inflections":["dogs"],"body":"canine"}"#
        );
    }
}
