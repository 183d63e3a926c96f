//! Document Model Module
//!
//! 置換エンジンが操作する文書の構造（パート → 段落 → ラン）を
//! 定義するモジュール。
//!
//! ランは書式の最小単位です。書式属性そのものはパートの元XMLにのみ
//! 存在し、このモデルはテキストだけを保持します。エンジンがテキストを
//! 書き換えても、保存時にランの書式が変化することはありません。

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::MergeError;

use super::package;

/// ラン
///
/// 同一の書式属性を共有する連続した文字列（`<w:r>`）。
/// 書式の境界であって意味の境界ではないため、1つのプレースホルダーが
/// 複数のランにまたがることがあります。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub(crate) text: String,
}

impl Run {
    /// ランのテキストを取得
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 段落
///
/// ランの順序付き列（`<w:p>`）。ランのテキストを順に連結したものが
/// 段落の可視テキストです。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub(crate) runs: Vec<Run>,
}

impl Paragraph {
    /// 段落内のランを取得
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// ランのテキストを連結した段落全体のテキストを取得
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// テキストを持つパート
///
/// 本文・ヘッダー・フッターのいずれか。パート内の段落は、表のセル内
/// （入れ子の表を含む）の段落も文書順で含みます。
#[derive(Debug, Clone)]
pub struct TextPart {
    /// アーカイブ内のパート名（例: "word/document.xml"）
    pub(crate) name: String,

    /// パートの元XML（保存時の再出力に使用）
    pub(crate) source: Vec<u8>,

    /// パート内の段落（文書順）
    pub(crate) paragraphs: Vec<Paragraph>,
}

impl TextPart {
    /// パート名を取得
    pub fn name(&self) -> &str {
        &self.name
    }

    /// パート内の段落を取得
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }
}

/// Wordテンプレート文書
///
/// 置換エンジンが処理中に唯一の可変参照を保持します。並列バッチ処理では
/// レコードごとに[`Document::from_bytes`]で独立したインスタンスを
/// 生成してください（同一インスタンスの共有は想定されていません）。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::collections::HashMap;
/// use std::fs::File;
/// use mergezero::Document;
///
/// # fn main() -> Result<(), mergezero::MergeError> {
/// let mut document = Document::read(File::open("template.docx")?)?;
///
/// let mut replacements = HashMap::new();
/// replacements.insert("name".to_string(), "Alice".to_string());
/// let report = mergezero::substitute(&mut document, &replacements);
/// println!("{} placeholders replaced", report.replaced);
///
/// document.write(File::create("output.docx")?)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// テキストを持つパート（本文、ヘッダー、フッター）
    pub(crate) parts: Vec<TextPart>,

    /// テンプレート全体の元バイト列（非テキストパートの書き戻しに使用）
    pub(crate) archive: Vec<u8>,
}

impl Document {
    /// リーダーからdocxテンプレートを読み込む
    ///
    /// # 引数
    ///
    /// * `reader` - docxファイルを読み込むためのリーダー（Read + Seek）
    ///
    /// # 戻り値
    ///
    /// * `Ok(Document)` - 読み込みに成功した場合
    /// * `Err(MergeError)` - アーカイブまたはXMLの解析に失敗した場合
    pub fn read<R: Read + Seek>(mut reader: R) -> Result<Self, MergeError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Self::from_bytes(buffer)
    }

    /// メモリ上のバイト列からdocxテンプレートを読み込む
    ///
    /// バッチ処理でレコードごとに独立した文書インスタンスを生成する
    /// 場合は、テンプレートのバイト列を共有してこのメソッドを呼び出します。
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MergeError> {
        let parts = package::read_text_parts(&bytes)?;
        Ok(Self {
            parts,
            archive: bytes,
        })
    }

    /// パスからdocxテンプレートを読み込む
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MergeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// 文書をライターに書き出す
    ///
    /// テキストパートはランのテキストのみを差し替えて再出力され、
    /// その他のパートは元のバイト列のままコピーされます。
    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<(), MergeError> {
        package::write_document(self, writer)
    }

    /// パスへ文書を書き出す
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MergeError> {
        let file = std::fs::File::create(path)?;
        self.write(file)
    }

    /// テキストを持つパートを取得
    pub fn parts(&self) -> &[TextPart] {
        &self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_text_concatenates_runs() {
        let paragraph = Paragraph {
            runs: vec![
                Run {
                    text: "Hello ".to_string(),
                },
                Run {
                    text: "«na".to_string(),
                },
                Run {
                    text: "me»".to_string(),
                },
            ],
        };
        assert_eq!(paragraph.text(), "Hello «name»");
        assert_eq!(paragraph.runs().len(), 3);
    }

    #[test]
    fn test_empty_paragraph_text() {
        let paragraph = Paragraph::default();
        assert_eq!(paragraph.text(), "");
        assert!(paragraph.runs().is_empty());
    }
}
