//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! docx/xlsxはどちらもZIPアーカイブであるため、ZIP bomb攻撃や
//! パストラバーサル攻撃への対策を両コンテナで共有します。

use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::MergeError;

/// セキュリティ設定
///
/// コンテナ（ZIPアーカイブ）処理時のセキュリティ制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一ファイルの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// 入力ファイルサイズが上限以内であることを確認
    pub fn check_input_size(&self, bytes_read: usize) -> Result<(), MergeError> {
        if bytes_read as u64 > self.max_input_file_size {
            return Err(MergeError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, self.max_input_file_size
            )));
        }
        Ok(())
    }
}

/// アーカイブ全体の検証
///
/// ファイル数、各エントリのパスとサイズ、展開後サイズの累計を検証します。
/// docxテンプレート・xlsxワークブックの両方で、アーカイブを開いた直後に
/// 一度だけ呼び出します。
pub(crate) fn validate_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    config: &SecurityConfig,
) -> Result<(), MergeError> {
    if archive.len() > config.max_file_count {
        return Err(MergeError::SecurityViolation(format!(
            "ZIP archive contains too many files: {} (max: {})",
            archive.len(),
            config.max_file_count
        )));
    }

    let mut total_decompressed_size = 0u64;
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| MergeError::Zip(format!("{}", e)))?;

        // パストラバーサル対策
        let file_name = file.name();
        validate_zip_path(file_name)
            .map_err(|e| MergeError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

        let file_size = file.size();
        if file_size > config.max_file_size {
            return Err(MergeError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                file_name, file_size, config.max_file_size
            )));
        }

        total_decompressed_size = total_decompressed_size
            .checked_add(file_size)
            .ok_or_else(|| {
                MergeError::SecurityViolation(
                    "Total decompressed size calculation overflow".to_string(),
                )
            })?;

        if total_decompressed_size > config.max_decompressed_size {
            return Err(MergeError::SecurityViolation(format!(
                "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                total_decompressed_size, config.max_decompressed_size
            )));
        }
    }

    Ok(())
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、アーカイブ内のファイルパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するファイルパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    // 空のパスは拒否
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`を含むパスを拒否（ディレクトリトラバーサル攻撃）
    if path.contains("..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    // `\`を含むパスを拒否（Windows形式のパスセパレータ）
    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
