//! Workbook Parser Module
//!
//! calamineを使用したレコード表の読み取りを提供するモジュール。
//! 先頭行を列名、以降の各行を1レコードとして解釈し、各セルの値を
//! 表示書式を適用した文字列として抽出します。

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets, Xlsx};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use crate::api::SheetSelector;
use crate::error::MergeError;
use crate::format::FormatCode;
use crate::formatter::{serial_to_datetime, CellFormatter};
use crate::parser::StylesParser;
use crate::security::SecurityConfig;
use crate::types::{CellValue, Record, RecordSet};

/// レコードパーサー
///
/// calamineのラッパーとして、セル値の抽出を提供します。表示書式は
/// calamineでは取得できないため、[`StylesParser`]によるXML直接解析と
/// 組み合わせます。
pub(crate) struct RecordParser {
    /// calamineのワークブック（XLSX形式のみサポート）
    workbook: Xlsx<Cursor<Vec<u8>>>,

    /// 書式メタデータ
    styles: StylesParser,
}

impl RecordParser {
    /// ワークブックを開き、書式メタデータも解析する
    ///
    /// # 引数
    ///
    /// * `reader` - XLSXファイルを読み込むためのリーダー（Read + Seek）
    ///
    /// # 戻り値
    ///
    /// * `Ok(RecordParser)` - 読み込みに成功した場合
    /// * `Err(MergeError)` - 解析に失敗した場合、またはXLSX形式でない場合
    pub fn open<R: Read + Seek>(mut reader: R) -> Result<Self, MergeError> {
        let security_config = SecurityConfig::default();

        // ファイル全体をメモリに読み込む（calamineとXML解析で2回走査するため）
        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        security_config.check_input_size(bytes_read)?;

        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer.clone()))
            .map_err(MergeError::Spreadsheet)?;
        let workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(MergeError::Config(
                    "Only XLSX format is supported".to_string(),
                ))
            }
        };

        let styles = StylesParser::new(Cursor::new(buffer))?;

        Ok(Self { workbook, styles })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// シート選択方式に基づいてレコード表のシートを選択
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - 選択されたシート名
    /// * `Err(MergeError::Config)` - シートが見つからない場合
    pub fn select_sheet(&self, selector: &SheetSelector) -> Result<String, MergeError> {
        let all_sheet_names = self.sheet_names();

        match selector {
            SheetSelector::First => all_sheet_names
                .first()
                .cloned()
                .ok_or_else(|| MergeError::Config("Workbook contains no sheets".to_string())),

            SheetSelector::Index(index) => {
                if *index >= all_sheet_names.len() {
                    return Err(MergeError::Config(format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        all_sheet_names.len()
                    )));
                }
                Ok(all_sheet_names[*index].clone())
            }

            SheetSelector::Name(name) => {
                if !all_sheet_names.contains(name) {
                    return Err(MergeError::Config(format!("Sheet '{}' not found", name)));
                }
                Ok(name.clone())
            }
        }
    }

    /// シートからレコード集合を読み取る
    ///
    /// 使用範囲の先頭行を列名として解釈します。列名が空のセルの列は
    /// スキップされます。すべてのセルが空の行はレコードになりません。
    ///
    /// # 引数
    ///
    /// * `sheet_name` - 読み取るシート名
    ///
    /// # 戻り値
    ///
    /// * `Ok(RecordSet)` - 列名とレコードのリスト
    /// * `Err(MergeError)` - 解析エラーが発生した場合
    pub fn read_records(&mut self, sheet_name: &str) -> Result<RecordSet, MergeError> {
        let range = self
            .workbook
            .worksheet_range(sheet_name)
            .map_err(|e| MergeError::Spreadsheet(e.into()))?;

        // 使用範囲はA1から始まるとは限らないため、書式解決には絶対座標を使う
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let is_1904 = self.styles.is_1904();
        let formatter = CellFormatter::new();

        // 同じ書式文字列の分類結果を使い回す
        let mut code_cache: HashMap<String, FormatCode> = HashMap::new();

        let mut rows = range.rows();
        let header_row = match rows.next() {
            Some(row) => row,
            None => return Ok(RecordSet::default()),
        };

        // ヘッダー行: 列名も表示書式を適用した文字列として読む
        let mut header: Vec<Option<String>> = Vec::with_capacity(header_row.len());
        for (col_idx, cell) in header_row.iter().enumerate() {
            let code = self.classified_code(
                &mut code_cache,
                sheet_name,
                start_row,
                start_col + col_idx as u32,
            );
            let name = formatter.render(&cell_value(cell, is_1904), &code);
            if name.trim().is_empty() {
                header.push(None);
            } else {
                header.push(Some(name));
            }
        }

        let columns: Vec<String> = header.iter().flatten().cloned().collect();

        let mut records = Vec::new();
        for (row_idx, row) in rows.enumerate() {
            // すべて空の行はスキップ
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }

            let abs_row = start_row + 1 + row_idx as u32;
            let mut record = Record::new();

            for (col_idx, cell) in row.iter().enumerate() {
                let Some(Some(name)) = header.get(col_idx) else {
                    continue;
                };

                let code = self.classified_code(
                    &mut code_cache,
                    sheet_name,
                    abs_row,
                    start_col + col_idx as u32,
                );
                let rendered = formatter.render(&cell_value(cell, is_1904), &code);
                record.insert(name.clone(), rendered);
            }

            records.push(record);
        }

        Ok(RecordSet { columns, records })
    }

    /// セルの書式を分類（キャッシュ付き）
    fn classified_code(
        &self,
        cache: &mut HashMap<String, FormatCode>,
        sheet: &str,
        row: u32,
        col: u32,
    ) -> FormatCode {
        match self.styles.format_code(sheet, row, col) {
            Some(code) => cache
                .entry(code.to_string())
                .or_insert_with(|| FormatCode::classify(code))
                .clone(),
            None => FormatCode::General,
        }
    }
}

/// calamineのセルデータを生値に変換
fn cell_value(data: &Data, is_1904: bool) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match serial_to_datetime(dt.as_f64(), is_1904) {
            Some(datetime) => CellValue::DateTime(datetime),
            // 変換範囲外のシリアル値は数値のまま扱う
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        _ => CellValue::Empty,
    }
}
