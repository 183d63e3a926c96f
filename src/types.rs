//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! セルの生値、レコード集合、各種処理レポートを含みます。

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

/// セルの生値を表す列挙型
///
/// ワークシートのセルから抽出された、書式適用前の値です。
/// 表示文字列への変換は[`CellFormatter`](crate::CellFormatter)が行います。
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 文字列
    Text(String),

    /// 整数
    Int(i64),

    /// 浮動小数点数
    Float(f64),

    /// 論理値
    Bool(bool),

    /// 日付・日時（Excelシリアル値から変換済み）
    ///
    /// 時刻成分が00:00:00の場合は日付のみとして描画されます。
    DateTime(NaiveDateTime),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 値を文字列として取得（書式適用前）
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(dt) => dt.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// 1レコード分の置換マップ（列名 → 描画済み文字列）
///
/// レコードごとに新規作成され、そのレコードの文書を書き出した後は
/// 破棄されます。
pub type Record = HashMap<String, String>;

/// ワークシートから読み取ったレコード集合
///
/// 先頭行を列名、以降の各行を1レコードとして解釈した結果です。
/// 各セルの値は、セルの表示書式を適用した文字列として格納されます。
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// 列名（ヘッダー行、出現順）
    pub columns: Vec<String>,

    /// レコードのリスト（列名 → 描画済み文字列）
    pub records: Vec<Record>,
}

impl RecordSet {
    /// レコード数を取得
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// レコードが存在しないかどうかを判定
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 置換をスキップしたマッチの診断情報
///
/// 論理テキスト上のオフセットをランに解決できなかった場合に記録されます。
/// 段落の不変条件が保たれている限り発生しませんが、発生しても該当マッチを
/// スキップするだけで、段落・文書の処理は継続されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMatch {
    /// パート名（例: "word/document.xml"）
    pub part: String,

    /// パート内の段落インデックス（0始まり）
    pub paragraph: usize,

    /// プレースホルダーのキー
    pub key: String,

    /// スキップ理由
    pub reason: String,
}

/// 1文書分の置換結果レポート
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubstitutionReport {
    /// 置換に成功したプレースホルダーの出現数
    pub replaced: usize,

    /// スキップされたマッチのリスト
    pub failures: Vec<SkippedMatch>,
}

/// テンプレートとレコード表の対応関係チェック結果
///
/// 元ツールの「フィールドマッピング確認」に相当します。
#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingReport {
    /// テンプレートに現れるが、対応する列が存在しないキー
    ///
    /// これらのプレースホルダーは出力文書にそのまま残ります。
    pub missing: Vec<String>,

    /// テンプレートで使用されていない列名
    pub unused: Vec<String>,
}

impl MappingReport {
    /// すべてのプレースホルダーに対応する列が存在するかを判定
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 1レコードの処理で発生した問題
#[derive(Debug, Clone, Serialize)]
pub struct RecordIssue {
    /// レコードのインデックス（0始まり、ヘッダー行を除く）
    pub record: usize,

    /// 問題の内容
    pub message: String,
}

/// バッチ差し込み処理の結果サマリー
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeSummary {
    /// 正常に生成された文書数
    pub generated: usize,

    /// 全文書を通じて置換されたプレースホルダーの総数
    pub substituted: usize,

    /// レコード単位の問題のリスト
    ///
    /// 問題が発生したレコードはスキップされますが、他のレコードの
    /// 処理は継続されます。
    pub issues: Vec<RecordIssue>,
}
