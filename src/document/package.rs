//! Package Module
//!
//! docxコンテナ（ZIPアーカイブ）の読み書きを提供するモジュール。
//!
//! テキストを持つパートは本文（word/document.xml）と各セクションの
//! ヘッダー・フッター（word/header*.xml / word/footer*.xml）です。
//! 保存時、テキストパート以外のエントリはすべて元のバイト列のまま
//! コピーされます。

use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::MergeError;
use crate::security::{self, SecurityConfig};

use super::model::{Document, TextPart};
use super::part;

/// パートがテキストを持つ（プレースホルダー置換の対象となる）かを判定
fn is_text_part(name: &str) -> bool {
    name == "word/document.xml"
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// docxアーカイブからテキストパートを読み出して解析
pub(super) fn read_text_parts(bytes: &[u8]) -> Result<Vec<TextPart>, MergeError> {
    let config = SecurityConfig::default();
    config.check_input_size(bytes.len())?;

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| MergeError::Zip(format!("{}", e)))?;
    security::validate_archive(&mut archive, &config)?;

    // エントリ名を先に収集（アーカイブ順を保つ）
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| MergeError::Zip(format!("{}", e)))?;
        names.push(file.name().to_string());
    }

    let mut parts = Vec::new();
    for name in names {
        if !is_text_part(&name) {
            continue;
        }
        let mut file = archive
            .by_name(&name)
            .map_err(|e| MergeError::Zip(format!("{}", e)))?;
        let mut source = Vec::new();
        file.read_to_end(&mut source)?;
        drop(file);

        let paragraphs = part::parse_part(&source)?;
        parts.push(TextPart {
            name,
            source,
            paragraphs,
        });
    }

    if !parts.iter().any(|p| p.name == "word/document.xml") {
        return Err(MergeError::Config(
            "Not a Word document: word/document.xml is missing".to_string(),
        ));
    }

    Ok(parts)
}

/// 文書をライターに書き出す
///
/// テキストパートはモデルのラン内容で再出力し、その他のエントリは
/// 再圧縮せずそのままコピーします。
pub(super) fn write_document<W: Write + Seek>(
    document: &Document,
    writer: W,
) -> Result<(), MergeError> {
    let mut archive = ZipArchive::new(Cursor::new(document.archive.as_slice()))
        .map_err(|e| MergeError::Zip(format!("{}", e)))?;
    let mut zip_writer = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| MergeError::Zip(format!("{}", e)))?;
        let name = file.name().to_string();

        match document.parts.iter().find(|p| p.name == name) {
            Some(text_part) => {
                drop(file);
                let rewritten = part::rewrite_part(&text_part.source, &text_part.paragraphs)?;
                zip_writer
                    .start_file(name, options)
                    .map_err(|e| MergeError::Zip(format!("{}", e)))?;
                zip_writer.write_all(&rewritten)?;
            }
            None => {
                zip_writer
                    .raw_copy_file(file)
                    .map_err(|e| MergeError::Zip(format!("{}", e)))?;
            }
        }
    }

    zip_writer
        .finish()
        .map_err(|e| MergeError::Zip(format!("{}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text_part() {
        assert!(is_text_part("word/document.xml"));
        assert!(is_text_part("word/header1.xml"));
        assert!(is_text_part("word/header3.xml"));
        assert!(is_text_part("word/footer1.xml"));

        assert!(!is_text_part("word/styles.xml"));
        assert!(!is_text_part("word/document.xml.rels"));
        assert!(!is_text_part("word/header1.xml.rels"));
        assert!(!is_text_part("[Content_Types].xml"));
        assert!(!is_text_part("word/media/image1.png"));
    }

    #[test]
    fn test_read_rejects_non_docx_archive() {
        // document.xmlを含まないZIPはテンプレートとして無効
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buffer);
            let options = FileOptions::default();
            writer.start_file("mimetype", options).unwrap();
            writer.write_all(b"text/plain").unwrap();
            writer.finish().unwrap();
        }

        let result = read_text_parts(buffer.get_ref());
        assert!(matches!(result, Err(MergeError::Config(_))));
    }

    #[test]
    fn test_read_rejects_invalid_bytes() {
        let result = read_text_parts(b"not a zip archive");
        assert!(matches!(result, Err(MergeError::Zip(_))));
    }
}
