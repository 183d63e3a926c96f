//! Part XML Module
//!
//! WordprocessingMLパート（本文・ヘッダー・フッター）のXMLを解析して
//! 段落モデルを構築し、保存時にはランのテキストのみを差し替えて
//! 再出力するモジュール。
//!
//! 解析と再出力は同じイベント走査を共有します。再出力はすべてのXML
//! イベントを元のまま書き戻し、`<w:t>`の中身だけをモデルのテキストに
//! 置き換えるため、ランの書式属性（`<w:rPr>`）には一切触れません。
//!
//! ランのテキストは`<w:r>`内の`<w:t>`の連結です。再出力では各ランの
//! 最初の`<w:t>`にラン全体のテキストを書き込み、2つ目以降の`<w:t>`は
//! 空にします（ラン数・要素数は変化しません）。
//!
//! 描画オブジェクト内のテキストボックス（`w:txbxContent`）のように
//! 段落が入れ子になるケースがあるため、段落コンテキストはスタックで
//! 管理します。

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use crate::error::MergeError;

use super::model::{Paragraph, Run};

/// パートXMLを解析して段落モデルを構築
///
/// 段落はパート内の`<w:p>`の開始順（文書順）で並びます。表のセル内・
/// 入れ子の表・テキストボックス内の段落もすべて含まれます。
pub(super) fn parse_part(xml: &[u8]) -> Result<Vec<Paragraph>, MergeError> {
    // ラン内の空白は意味を持つため、trim_textは使用しない
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    // 開いている段落のインデックスと、その段落でランが開いているか
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    stack.push((paragraphs.len(), false));
                    paragraphs.push(Paragraph::default());
                }
                b"w:r" => {
                    if let Some((para, in_run)) = stack.last_mut() {
                        paragraphs[*para].runs.push(Run::default());
                        *in_run = true;
                    }
                }
                b"w:t" => {
                    if matches!(stack.last(), Some((_, true))) {
                        in_text = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => {
                    paragraphs.push(Paragraph::default());
                }
                b"w:r" => {
                    if let Some((para, _)) = stack.last() {
                        paragraphs[*para].runs.push(Run::default());
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|e| MergeError::Config(format!("XML text error: {}", e)))?;
                    append_run_text(&mut paragraphs, &stack, &text);
                }
            }
            Event::CData(e) => {
                if in_text {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_run_text(&mut paragraphs, &stack, &text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    stack.pop();
                }
                b"w:r" => {
                    if let Some((_, in_run)) = stack.last_mut() {
                        *in_run = false;
                    }
                }
                b"w:t" => {
                    in_text = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// 開いているランにテキストを追記
fn append_run_text(paragraphs: &mut [Paragraph], stack: &[(usize, bool)], text: &str) {
    if let Some((para, true)) = stack.last() {
        if let Some(run) = paragraphs[*para].runs.last_mut() {
            run.text.push_str(text);
        }
    }
}

/// 再出力時のラン走査コンテキスト
struct Frame {
    /// 段落インデックス
    para: usize,
    /// この段落で次に現れるランのインデックス
    next_run: usize,
    /// 現在開いているランのインデックス
    current_run: Option<usize>,
    /// 現在のランで最初の`<w:t>`を処理済みか
    text_written: bool,
}

/// パートXMLを再出力し、ランのテキストをモデルの内容に差し替える
///
/// 解析時と同一のイベント走査で段落・ランを数え上げるため、モデルと
/// XMLの対応は構造的に一致します。万一対応が取れない場合は
/// `MergeError::Config`を返します（文書の部分的な破壊を避けるため）。
pub(super) fn rewrite_part(xml: &[u8], paragraphs: &[Paragraph]) -> Result<Vec<u8>, MergeError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(xml.len())));

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut next_para = 0usize;
    // 差し替え済み`<w:t>`の中の元テキストを捨てるためのフラグ
    let mut suppress_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    stack.push(Frame {
                        para: next_para,
                        next_run: 0,
                        current_run: None,
                        text_written: false,
                    });
                    next_para += 1;
                    writer.write_event(Event::Start(e))?;
                }
                b"w:r" => {
                    if let Some(frame) = stack.last_mut() {
                        frame.current_run = Some(frame.next_run);
                        frame.next_run += 1;
                        frame.text_written = false;
                    }
                    writer.write_event(Event::Start(e))?;
                }
                b"w:t" => {
                    let located = stack
                        .last()
                        .and_then(|f| f.current_run.map(|r| (f.para, r)));
                    match located {
                        Some((para, run)) if !text_written(&stack) => {
                            let text = run_text(paragraphs, para, run)?;
                            let start = rebuild_text_start(&e, text)?;
                            writer.write_event(Event::Start(start))?;
                            if !text.is_empty() {
                                writer.write_event(Event::Text(BytesText::new(text)))?;
                            }
                            mark_text_written(&mut stack);
                            suppress_text = true;
                        }
                        Some(_) => {
                            // 同一ラン内の2つ目以降の<w:t>は空にする
                            writer.write_event(Event::Start(e))?;
                            suppress_text = true;
                        }
                        None => {
                            writer.write_event(Event::Start(e))?;
                        }
                    }
                }
                _ => writer.write_event(Event::Start(e))?,
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => {
                    next_para += 1;
                    writer.write_event(Event::Empty(e))?;
                }
                b"w:r" => {
                    if let Some(frame) = stack.last_mut() {
                        frame.next_run += 1;
                    }
                    writer.write_event(Event::Empty(e))?;
                }
                b"w:t" => {
                    let located = stack
                        .last()
                        .and_then(|f| f.current_run.map(|r| (f.para, r)));
                    match located {
                        Some((para, run)) if !text_written(&stack) => {
                            let text = run_text(paragraphs, para, run)?;
                            mark_text_written(&mut stack);
                            if text.is_empty() {
                                writer.write_event(Event::Empty(e))?;
                            } else {
                                // 自己終了タグを開始+テキスト+終了に展開する
                                let start = rebuild_text_start(&e, text)?;
                                writer.write_event(Event::Start(start))?;
                                writer.write_event(Event::Text(BytesText::new(text)))?;
                                writer.write_event(Event::End(BytesEnd::new("w:t")))?;
                            }
                        }
                        _ => writer.write_event(Event::Empty(e))?,
                    }
                }
                _ => writer.write_event(Event::Empty(e))?,
            },
            Event::Text(e) => {
                if !suppress_text {
                    writer.write_event(Event::Text(e))?;
                }
            }
            Event::CData(e) => {
                if !suppress_text {
                    writer.write_event(Event::CData(e))?;
                }
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"w:p" => {
                        stack.pop();
                    }
                    b"w:r" => {
                        if let Some(frame) = stack.last_mut() {
                            frame.current_run = None;
                        }
                    }
                    b"w:t" => {
                        suppress_text = false;
                    }
                    _ => {}
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

/// 現在のランのテキスト処理済みフラグを取得
fn text_written(stack: &[Frame]) -> bool {
    stack.last().map(|f| f.text_written).unwrap_or(false)
}

/// 現在のランのテキスト処理済みフラグを立てる
fn mark_text_written(stack: &mut [Frame]) {
    if let Some(frame) = stack.last_mut() {
        frame.text_written = true;
    }
}

/// モデルからランのテキストを取得
///
/// XMLとモデルの構造は同一の走査で数え上げられるため、対応が取れない
/// 場合は内部不整合としてエラーを返します。
fn run_text(paragraphs: &[Paragraph], para: usize, run: usize) -> Result<&str, MergeError> {
    paragraphs
        .get(para)
        .and_then(|p| p.runs.get(run))
        .map(|r| r.text.as_str())
        .ok_or_else(|| {
            MergeError::Config(format!(
                "Document model out of sync with part XML (paragraph {}, run {})",
                para, run
            ))
        })
}

/// `<w:t>`の開始タグを再構築
///
/// 元の属性を維持しつつ、テキストの先頭・末尾に空白がある場合は
/// `xml:space="preserve"`を付与します（Wordは指定のない境界空白を
/// 取り除くため）。
fn rebuild_text_start(e: &BytesStart, text: &str) -> Result<BytesStart<'static>, MergeError> {
    let mut start = BytesStart::new("w:t");
    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| MergeError::Config(format!("XML attribute error: {}", e)))?;
        if attr.key.as_ref() != b"xml:space" {
            start.push_attribute(attr);
        }
    }
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        start.push_attribute(("xml:space", "preserve"));
    }
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_PART: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello </w:t></w:r><w:r><w:t>«name»</w:t></w:r></w:p><w:p><w:r><w:t>Plain</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_parse_simple_part() {
        let paragraphs = parse_part(SIMPLE_PART.as_bytes()).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].runs.len(), 2);
        assert_eq!(paragraphs[0].runs[0].text, "Hello ");
        assert_eq!(paragraphs[0].runs[1].text, "«name»");
        assert_eq!(paragraphs[0].text(), "Hello «name»");
        assert_eq!(paragraphs[1].text(), "Plain");
    }

    #[test]
    fn test_parse_table_paragraphs_in_document_order() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Before</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell «a»</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Cell «b»</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>After</w:t></w:r></w:p></w:body></w:document>"#;
        let paragraphs = parse_part(xml.as_bytes()).unwrap();
        let texts: Vec<String> = paragraphs.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["Before", "Cell «a»", "Cell «b»", "After"]);
    }

    #[test]
    fn test_parse_run_with_multiple_text_elements() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>a</w:t><w:br/><w:t>b</w:t></w:r></w:p>"#;
        let paragraphs = parse_part(xml.as_bytes()).unwrap();
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].runs.len(), 1);
        assert_eq!(paragraphs[0].runs[0].text, "ab");
    }

    #[test]
    fn test_parse_empty_paragraph() {
        let xml = r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p/><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body>"#;
        let paragraphs = parse_part(xml.as_bytes()).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].runs.is_empty());
        assert_eq!(paragraphs[1].text(), "x");
    }

    #[test]
    fn test_rewrite_unchanged_round_trip() {
        let paragraphs = parse_part(SIMPLE_PART.as_bytes()).unwrap();
        let rewritten = rewrite_part(SIMPLE_PART.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        assert_eq!(reparsed, paragraphs);
        // 書式要素は手つかずで残る
        let output = String::from_utf8(rewritten).unwrap();
        assert!(output.contains("<w:rPr><w:b/></w:rPr>"));
    }

    #[test]
    fn test_rewrite_replaces_run_text() {
        let mut paragraphs = parse_part(SIMPLE_PART.as_bytes()).unwrap();
        paragraphs[0].runs[1].text = "Alice".to_string();

        let rewritten = rewrite_part(SIMPLE_PART.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        assert_eq!(reparsed[0].text(), "Hello Alice");
        assert_eq!(reparsed[0].runs.len(), 2);

        let output = String::from_utf8(rewritten).unwrap();
        assert!(output.contains("<w:rPr><w:b/></w:rPr>"));
        assert!(!output.contains("«name»"));
    }

    #[test]
    fn test_rewrite_emptied_run_keeps_element() {
        let mut paragraphs = parse_part(SIMPLE_PART.as_bytes()).unwrap();
        paragraphs[0].runs[1].text = String::new();

        let rewritten = rewrite_part(SIMPLE_PART.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        // ランは空になっても削除されない
        assert_eq!(reparsed[0].runs.len(), 2);
        assert_eq!(reparsed[0].runs[1].text, "");
    }

    #[test]
    fn test_rewrite_multi_text_run_collapses_to_first() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>a</w:t><w:t>b</w:t></w:r></w:p>"#;
        let mut paragraphs = parse_part(xml.as_bytes()).unwrap();
        assert_eq!(paragraphs[0].runs[0].text, "ab");
        paragraphs[0].runs[0].text = "xyz".to_string();

        let rewritten = rewrite_part(xml.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        assert_eq!(reparsed[0].runs[0].text, "xyz");
    }

    #[test]
    fn test_rewrite_adds_space_preserve_for_boundary_whitespace() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>x</w:t></w:r></w:p>"#;
        let mut paragraphs = parse_part(xml.as_bytes()).unwrap();
        paragraphs[0].runs[0].text = "value ".to_string();

        let rewritten = rewrite_part(xml.as_bytes(), &paragraphs).unwrap();
        let output = String::from_utf8(rewritten).unwrap();
        assert!(output.contains(r#"xml:space="preserve""#));
    }

    #[test]
    fn test_rewrite_self_closing_text_element() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t/></w:r></w:p>"#;
        let paragraphs = parse_part(xml.as_bytes()).unwrap();
        assert_eq!(paragraphs[0].runs[0].text, "");

        // 変更なしならそのまま
        let rewritten = rewrite_part(xml.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        assert_eq!(reparsed[0].runs[0].text, "");
    }

    #[test]
    fn test_rewrite_escapes_special_characters() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>x</w:t></w:r></w:p>"#;
        let mut paragraphs = parse_part(xml.as_bytes()).unwrap();
        paragraphs[0].runs[0].text = "a<b&c".to_string();

        let rewritten = rewrite_part(xml.as_bytes(), &paragraphs).unwrap();
        let reparsed = parse_part(&rewritten).unwrap();
        assert_eq!(reparsed[0].runs[0].text, "a<b&c");
    }

    #[test]
    fn test_parse_ignores_text_outside_runs() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>only</w:t></w:r></w:p>"#;
        let paragraphs = parse_part(xml.as_bytes()).unwrap();
        assert_eq!(paragraphs[0].text(), "only");
    }
}
