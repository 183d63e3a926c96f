//! Document Module
//!
//! Wordテンプレート（docx）の読み書きと、置換エンジンが操作する
//! 文書モデルを提供するモジュール。
//!
//! docxはZIPアーカイブであり、本文（word/document.xml）と各セクションの
//! ヘッダー・フッター（word/header*.xml / word/footer*.xml）がテキストを
//! 持つパートです。このモジュールは各パートを段落（ラン列）として
//! 公開し、保存時にはランのテキストのみを差し替えて、その他のXML
//! イベントと非テキストパートをすべて元のまま書き戻します。

mod model;
mod package;
mod part;

pub use model::{Document, Paragraph, Run, TextPart};
