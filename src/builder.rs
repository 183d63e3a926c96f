//! Builder Module
//!
//! Fluent Builder APIを提供し、`Merger`インスタンスを段階的に構築する。
//! `Merger`は差し込み処理のファサードとして、レコードの読み取りから
//! 文書の一括生成までを駆動します。

use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::api::SheetSelector;
use crate::document::Document;
use crate::engine;
use crate::error::MergeError;
use crate::parser::RecordParser;
use crate::types::{MappingReport, MergeSummary, Record, RecordIssue, RecordSet};

/// 差し込み処理の設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct MergeConfig {
    /// レコード表のシート選択方式
    pub sheet_selector: SheetSelector,

    /// 出力ファイル名に使用する列名（Noneの場合は先頭列）
    pub naming_column: Option<String>,
}

/// Fluent Builder APIを提供する構造体
///
/// `Merger`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみを
/// オーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use mergezero::{MergerBuilder, SheetSelector};
///
/// # fn main() -> Result<(), mergezero::MergeError> {
/// let merger = MergerBuilder::new()
///     .with_sheet_selector(SheetSelector::Name("Records".to_string()))
///     .with_naming_column("会社名")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MergerBuilder {
    /// 内部設定（構築中）
    config: MergeConfig,
}

impl MergerBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート選択: 先頭のシート
    /// - 命名列: 先頭の列
    pub fn new() -> Self {
        Self {
            config: MergeConfig::default(),
        }
    }

    /// レコード表のシートを選択する
    ///
    /// # 引数
    ///
    /// * `selector: SheetSelector`: シート選択方式
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// 出力ファイル名に使用する列を指定する
    ///
    /// 各レコードの出力ファイル名は、この列の描画済みの値（セルの表示
    /// 書式を適用した文字列）から生成されます。指定しない場合は先頭の
    /// 列が使用されます。
    ///
    /// # 引数
    ///
    /// * `column`: 列名（ヘッダー行の値）
    pub fn with_naming_column(mut self, column: impl Into<String>) -> Self {
        self.config.naming_column = Some(column.into());
        self
    }

    /// 設定を検証し、`Merger`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Merger)`: 設定が有効な場合
    /// * `Err(MergeError::Config)`: 設定が無効な場合（例: 空の命名列）
    pub fn build(self) -> Result<Merger, MergeError> {
        if let Some(column) = &self.config.naming_column {
            if column.trim().is_empty() {
                return Err(MergeError::Config(
                    "Naming column must not be empty".to_string(),
                ));
            }
        }

        Ok(Merger::new(self.config))
    }
}

/// 差し込み処理のファサード
///
/// Excelワークブックの各レコードをWordテンプレートに差し込み、
/// レコードごとに1つの文書を生成するメインエントリーポイントです。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::path::Path;
/// use mergezero::MergerBuilder;
///
/// # fn main() -> Result<(), mergezero::MergeError> {
/// let merger = MergerBuilder::new().build()?;
/// let summary = merger.merge(
///     Path::new("records.xlsx"),
///     Path::new("template.docx"),
///     Path::new("output_docs"),
/// )?;
/// println!("{} documents generated", summary.generated);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Merger {
    /// 差し込み設定
    config: MergeConfig,
}

impl Merger {
    pub(crate) fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// ワークブックからレコード集合を読み取る
    ///
    /// 設定されたシート選択方式に従ってシートを選び、先頭行を列名、
    /// 以降の各行を1レコードとして読み取ります。各セルの値は表示書式を
    /// 適用した文字列です。
    ///
    /// # 引数
    ///
    /// * `reader` - XLSXファイルを読み込むためのリーダー（Read + Seek）
    pub fn load_records<R: Read + Seek>(&self, reader: R) -> Result<RecordSet, MergeError> {
        let mut parser = RecordParser::open(reader)?;
        let sheet_name = parser.select_sheet(&self.config.sheet_selector)?;
        parser.read_records(&sheet_name)
    }

    /// テンプレートとレコード表の対応関係をチェックする
    ///
    /// テンプレート中のプレースホルダーのうち対応する列がないもの
    /// （出力にそのまま残る）と、テンプレートで使用されていない列を
    /// 報告します。
    pub fn check_mapping(&self, records: &RecordSet, document: &Document) -> MappingReport {
        let keys = engine::collect_keys(document);
        let columns: BTreeSet<&str> = records.columns.iter().map(String::as_str).collect();

        let missing: Vec<String> = keys
            .iter()
            .filter(|key| !columns.contains(key.as_str()))
            .cloned()
            .collect();
        let unused: Vec<String> = records
            .columns
            .iter()
            .filter(|column| !keys.contains(*column))
            .cloned()
            .collect();

        MappingReport { missing, unused }
    }

    /// ワークブックとテンプレートから文書を一括生成する
    ///
    /// # 引数
    ///
    /// * `workbook_path` - レコード表のXLSXファイル
    /// * `template_path` - Wordテンプレート（docx）
    /// * `output_dir` - 出力ディレクトリ（存在しない場合は作成される）
    ///
    /// # 戻り値
    ///
    /// 生成数・置換総数・レコード単位の問題を含むサマリー。個々の
    /// レコードの失敗はサマリーに記録されるのみで、バッチ全体は中断
    /// されません。
    pub fn merge(
        &self,
        workbook_path: &Path,
        template_path: &Path,
        output_dir: &Path,
    ) -> Result<MergeSummary, MergeError> {
        let records = self.load_records(File::open(workbook_path)?)?;
        let template = std::fs::read(template_path)?;
        self.merge_records(&records, &template, output_dir)
    }

    /// 読み取り済みのレコード集合から文書を一括生成する
    ///
    /// レコードはワーカースレッドで並列に処理されます。各ワーカーは
    /// テンプレートのバイト列から独立した文書インスタンスを解析するため、
    /// 文書の可変状態がレコード間で共有されることはありません。
    pub fn merge_records(
        &self,
        records: &RecordSet,
        template: &[u8],
        output_dir: &Path,
    ) -> Result<MergeSummary, MergeError> {
        // テンプレートを一度解析して、不正なテンプレートの検出と
        // フィールドマッピングの診断を先に行う
        let document = Document::from_bytes(template.to_vec())?;
        let mapping = self.check_mapping(records, &document);
        if !mapping.is_complete() {
            log::warn!(
                "{} placeholder(s) have no matching column and will be left as-is: {:?}",
                mapping.missing.len(),
                mapping.missing
            );
        }
        drop(document);

        let naming_column = match &self.config.naming_column {
            Some(column) => {
                if !records.columns.contains(column) {
                    return Err(MergeError::Config(format!(
                        "Naming column '{}' not found in record table",
                        column
                    )));
                }
                column.clone()
            }
            None => records.columns.first().cloned().ok_or_else(|| {
                MergeError::Config("Record table has no columns".to_string())
            })?,
        };

        std::fs::create_dir_all(output_dir)?;

        let results: Vec<Result<usize, RecordIssue>> = records
            .records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                self.merge_one(record, template, output_dir, &naming_column, index)
                    .map_err(|e| {
                        log::warn!("record {} failed: {}", index + 1, e);
                        RecordIssue {
                            record: index,
                            message: e.to_string(),
                        }
                    })
            })
            .collect();

        let mut summary = MergeSummary::default();
        for result in results {
            match result {
                Ok(replaced) => {
                    summary.generated += 1;
                    summary.substituted += replaced;
                }
                Err(issue) => summary.issues.push(issue),
            }
        }

        log::debug!(
            "generated {} of {} documents ({} placeholders substituted)",
            summary.generated,
            records.len(),
            summary.substituted
        );

        Ok(summary)
    }

    /// 1レコード分の文書を生成する
    fn merge_one(
        &self,
        record: &Record,
        template: &[u8],
        output_dir: &Path,
        naming_column: &str,
        index: usize,
    ) -> Result<usize, MergeError> {
        // レコードごとに独立した文書インスタンスを解析する
        let mut document = Document::from_bytes(template.to_vec())?;
        let report = engine::substitute(&mut document, record);

        let name = record
            .get(naming_column)
            .map(String::as_str)
            .unwrap_or("");
        let output_path = output_dir.join(output_file_name(name, index));
        document.save(&output_path)?;

        Ok(report.replaced)
    }
}

/// 出力ファイル名を導出する
///
/// 命名列の描画済みの値からファイルシステムで使用できない文字を
/// `_`に置換します。空になった場合は`document_<連番>`を使用します。
fn output_file_name(rendered: &str, index: usize) -> String {
    const INVALID: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let sanitized: String = rendered
        .trim()
        .chars()
        .map(|c| if INVALID.contains(&c) { '_' } else { c })
        .collect();

    if sanitized.trim().is_empty() {
        format!("document_{}.docx", index + 1)
    } else {
        format!("{}.docx", sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merger_builder_new() {
        let builder = MergerBuilder::new();
        assert_eq!(builder.config.sheet_selector, SheetSelector::First);
        assert!(builder.config.naming_column.is_none());
    }

    #[test]
    fn test_with_sheet_selector() {
        let builder = MergerBuilder::new().with_sheet_selector(SheetSelector::Index(2));
        assert!(matches!(
            builder.config.sheet_selector,
            SheetSelector::Index(2)
        ));

        let builder =
            MergerBuilder::new().with_sheet_selector(SheetSelector::Name("Records".to_string()));
        assert!(matches!(
            builder.config.sheet_selector,
            SheetSelector::Name(ref name) if name == "Records"
        ));
    }

    #[test]
    fn test_with_naming_column() {
        let builder = MergerBuilder::new().with_naming_column("会社名");
        assert_eq!(builder.config.naming_column.as_deref(), Some("会社名"));
    }

    #[test]
    fn test_build_success() {
        assert!(MergerBuilder::new().build().is_ok());
        assert!(MergerBuilder::new()
            .with_naming_column("name")
            .build()
            .is_ok());
    }

    #[test]
    fn test_build_with_empty_naming_column() {
        let result = MergerBuilder::new().with_naming_column("  ").build();
        match result {
            Err(MergeError::Config(msg)) => {
                assert!(msg.contains("Naming column"));
            }
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("Acme Corp", 0), "Acme Corp.docx");
        assert_eq!(output_file_name("  spaced  ", 0), "spaced.docx");
        assert_eq!(output_file_name("株式会社テスト", 0), "株式会社テスト.docx");
    }

    #[test]
    fn test_output_file_name_sanitizes_invalid_characters() {
        assert_eq!(output_file_name("a/b\\c:d", 0), "a_b_c_d.docx");
        assert_eq!(output_file_name("x*y?z", 0), "x_y_z.docx");
        assert_eq!(output_file_name("<\"|>", 0), "____.docx");
    }

    #[test]
    fn test_output_file_name_fallback_when_empty() {
        assert_eq!(output_file_name("", 0), "document_1.docx");
        assert_eq!(output_file_name("   ", 4), "document_5.docx");
    }

    #[test]
    fn test_check_mapping() {
        use crate::document::{Paragraph, Run, TextPart};

        let document = Document {
            parts: vec![TextPart {
                name: "word/document.xml".to_string(),
                source: Vec::new(),
                paragraphs: vec![Paragraph {
                    runs: vec![Run {
                        text: "«name» owes «amount»".to_string(),
                    }],
                }],
            }],
            archive: Vec::new(),
        };

        let records = RecordSet {
            columns: vec!["name".to_string(), "address".to_string()],
            records: Vec::new(),
        };

        let merger = MergerBuilder::new().build().unwrap();
        let mapping = merger.check_mapping(&records, &document);

        assert_eq!(mapping.missing, vec!["amount".to_string()]);
        assert_eq!(mapping.unused, vec!["address".to_string()]);
        assert!(!mapping.is_complete());
    }
}
