//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// mergezeroクレート全体で使用するエラー型
///
/// このエラー型は、Excelワークブックの読み込み、Wordテンプレートの解析、
/// 差し込み処理中に発生するすべてのエラーを統一的に扱うために使用されます。
///
/// なお、個々のプレースホルダー置換の失敗はエラーではなく
/// [`SubstitutionReport`](crate::SubstitutionReport)に記録されます。
/// 1件のレコード処理の失敗も[`MergeSummary`](crate::MergeSummary)に
/// 記録されるのみで、バッチ全体を中断しません。
///
/// # 使用例
///
/// ```rust,no_run
/// use mergezero::MergeError;
/// use std::fs::File;
///
/// fn open_template(path: &str) -> Result<(), MergeError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     // ... 処理 ...
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum MergeError {
    /// I/O操作中に発生したエラー
    ///
    /// ファイルの読み込み失敗、出力ファイルの書き込み失敗など、標準ライブラリの
    /// `std::io::Error`が発生した場合に使用されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelワークブックの解析中に発生したエラー
    ///
    /// calamineクレートがワークブックを解析する際に発生したエラーです。
    /// ファイル形式が不正、破損したファイルなどが原因となります。
    #[error("Failed to parse Excel workbook: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// OOXMLパートの解析・再出力中に発生したXMLエラー
    ///
    /// quick-xmlがdocx/xlsx内部のXMLを読み書きする際に発生したエラーです。
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// UTF-8文字列の変換エラー
    ///
    /// XML属性値のUTF-8文字列への変換に失敗した場合に発生します。
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    ///
    /// docx/xlsxファイル（ZIPアーカイブ）の解析中に発生したエラーです。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// 数値の解析エラー
    ///
    /// XML属性の文字列から数値への変換に失敗した場合に発生します。
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// 設定の検証に失敗したエラー
    ///
    /// `MergerBuilder::build()`時の検証、存在しないシートや列の指定などで
    /// 発生します。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use mergezero::{MergerBuilder, MergeError};
    ///
    /// let result = MergerBuilder::new()
    ///     .with_naming_column("")  // 空の列名は無効
    ///     .build();
    ///
    /// if let Err(MergeError::Config(msg)) = result {
    ///     println!("設定エラー: {}", msg);
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: MergeError = io_err.into();

        match error {
            MergeError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let error: MergeError = io_err.into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("IO error"));
        assert!(error_msg.contains("Permission denied"));
    }

    #[test]
    fn test_spreadsheet_error() {
        let parse_err = calamine::Error::Msg("Invalid file format");
        let error: MergeError = parse_err.into();

        match error {
            MergeError::Spreadsheet(calamine::Error::Msg(msg)) => {
                assert_eq!(msg, "Invalid file format");
            }
            _ => panic!("Expected Spreadsheet error"),
        }
    }

    #[test]
    fn test_spreadsheet_error_display() {
        let parse_err = calamine::Error::Msg("Corrupted file");
        let error: MergeError = parse_err.into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to parse Excel workbook"));
        assert!(error_msg.contains("Corrupted file"));
    }

    #[test]
    fn test_config_error_display() {
        let error = MergeError::Config("Sheet 'Records' not found".to_string());
        let error_msg = error.to_string();

        assert!(error_msg.contains("Configuration error"));
        assert!(error_msg.contains("Sheet 'Records' not found"));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), MergeError> {
            let _file = std::fs::File::open("nonexistent_template.docx")?;
            Ok(())
        }

        let result = io_operation();
        assert!(result.is_err());

        match result {
            Err(MergeError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }

    #[test]
    fn test_all_error_formats() {
        let io_err: MergeError = io::Error::other("test io").into();
        assert!(io_err.to_string().starts_with("IO error"));

        let parse_err: MergeError = calamine::Error::Msg("test parse").into();
        assert!(parse_err
            .to_string()
            .starts_with("Failed to parse Excel workbook"));

        let config_err = MergeError::Config("test config".to_string());
        assert!(config_err.to_string().starts_with("Configuration error"));

        let zip_err = MergeError::Zip("bad archive".to_string());
        assert!(zip_err.to_string().starts_with("ZIP archive error"));

        let security_err = MergeError::SecurityViolation("too many files".to_string());
        assert!(security_err.to_string().starts_with("Security violation"));
    }
}
