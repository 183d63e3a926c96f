//! Styles Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得不可能な書式情報を抽出する
//! モジュール。セルごとの表示書式（Number Format String）と1904年
//! エポック判定を提供します。
//!
//! calamineはセルのスタイルインデックスを公開しないため、
//! `xl/styles.xml`（numFmts / cellXfs）と各ワークシートXMLの
//! `<c r=… s=…>`属性を直接解析します。シート名からワークシートパスへの
//! 解決は`xl/workbook.xml`と`xl/_rels/workbook.xml.rels`を経由します。

use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MergeError;
use crate::security::{self, SecurityConfig};

/// XLSX書式メタデータパーサー
///
/// ワークブック全体の書式情報を1回の走査で読み込み、セル座標から
/// 書式文字列への解決を提供します。
#[derive(Debug, Clone)]
pub(crate) struct StylesParser {
    /// カスタム書式: numFmtId -> formatCode
    num_formats: HashMap<u32, String>,

    /// cellXfs: スタイルインデックス -> numFmtId
    cell_xfs: Vec<u32>,

    /// シート名 -> セル座標（0始まり） -> スタイルインデックス
    sheet_styles: HashMap<String, HashMap<(u32, u32), u32>>,

    /// 1904年エポックを使用するかどうか
    is_1904: bool,
}

impl StylesParser {
    /// XLSXファイル（ZIPアーカイブ）から書式メタデータを解析
    ///
    /// # 引数
    ///
    /// * `reader` - XLSXファイルを読み込むためのリーダー（Read + Seek）
    pub fn new<R: Read + Seek>(reader: R) -> Result<Self, MergeError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| MergeError::Zip(format!("{}", e)))?;
        security::validate_archive(&mut archive, &SecurityConfig::default())?;

        let (is_1904, sheet_rids) = Self::parse_workbook(&mut archive)?;
        let rels = Self::parse_rels(&mut archive)?;
        let (num_formats, cell_xfs) = Self::parse_styles(&mut archive)?;

        let mut sheet_styles = HashMap::new();
        for (sheet_name, rid) in sheet_rids {
            let Some(path) = rels.get(&rid) else {
                continue;
            };
            let mut file = match archive.by_name(path) {
                Ok(file) => file,
                Err(_) => continue,
            };
            let mut xml_content = Vec::new();
            file.read_to_end(&mut xml_content)?;
            drop(file);

            let styles = Self::parse_worksheet_styles(&xml_content)?;
            if !styles.is_empty() {
                sheet_styles.insert(sheet_name, styles);
            }
        }

        Ok(Self {
            num_formats,
            cell_xfs,
            sheet_styles,
            is_1904,
        })
    }

    /// 1904年エポックを使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// セルの書式文字列を解決
    ///
    /// # 引数
    ///
    /// * `sheet` - シート名
    /// * `row` / `col` - セル座標（0始まり）
    ///
    /// # 戻り値
    ///
    /// カスタム書式またはビルトイン書式の文字列。スタイル指定のない
    /// セル、未知のビルトインIDは`None`（General扱い）。
    pub fn format_code(&self, sheet: &str, row: u32, col: u32) -> Option<&str> {
        let style = *self.sheet_styles.get(sheet)?.get(&(row, col))?;
        let num_fmt_id = *self.cell_xfs.get(style as usize)?;
        match self.num_formats.get(&num_fmt_id) {
            Some(code) => Some(code.as_str()),
            None => builtin_format_code(num_fmt_id),
        }
    }

    /// xl/workbook.xml の解析（プライベート）
    ///
    /// `<workbookPr date1904="true"/>`と、`<sheet name=… r:id=…/>`の
    /// 一覧を取得します。
    fn parse_workbook<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<(bool, Vec<(String, String)>), MergeError> {
        let xml_content = match read_archive_entry(archive, "xl/workbook.xml")? {
            Some(content) => content,
            None => return Ok((false, Vec::new())),
        };

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut is_1904 = false;
        let mut sheets = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"workbookPr" => {
                        // <workbookPr date1904="true"/>
                        if let Some(value) = attribute_value(&e, b"date1904")? {
                            is_1904 = value == "1" || value == "true";
                        }
                    }
                    b"sheet" => {
                        // <sheet name="Records" sheetId="1" r:id="rId1"/>
                        let name = attribute_value(&e, b"name")?;
                        let rid = attribute_value(&e, b"r:id")?;
                        if let (Some(name), Some(rid)) = (name, rid) {
                            sheets.push((name, rid));
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok((is_1904, sheets))
    }

    /// xl/_rels/workbook.xml.rels の解析（プライベート）
    ///
    /// リレーションシップID -> アーカイブ内パスのマッピングを取得します。
    fn parse_rels<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<HashMap<String, String>, MergeError> {
        let xml_content = match read_archive_entry(archive, "xl/_rels/workbook.xml.rels")? {
            Some(content) => content,
            None => return Ok(HashMap::new()),
        };

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    if e.name().as_ref() == b"Relationship" {
                        // <Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
                        let id = attribute_value(&e, b"Id")?;
                        let target = attribute_value(&e, b"Target")?;
                        if let (Some(id), Some(target)) = (id, target) {
                            rels.insert(id, normalize_target(&target));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// xl/styles.xml の解析（プライベート）
    ///
    /// カスタム書式（numFmts）とセルスタイル表（cellXfs）を取得します。
    fn parse_styles<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<(HashMap<u32, String>, Vec<u32>), MergeError> {
        let xml_content = match read_archive_entry(archive, "xl/styles.xml")? {
            Some(content) => content,
            None => return Ok((HashMap::new(), Vec::new())),
        };

        let mut reader = Reader::from_reader(xml_content.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut num_formats = HashMap::new();
        let mut cell_xfs = Vec::new();
        let mut in_cell_xfs = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"numFmt" => {
                        // <numFmt numFmtId="165" formatCode="0.000"/>
                        let id = attribute_value(&e, b"numFmtId")?;
                        let code = attribute_value(&e, b"formatCode")?;
                        if let (Some(id), Some(code)) = (id, code) {
                            let id: u32 = id.parse()?;
                            // カスタム書式ID（>= 164）のみ保存
                            if id >= 164 {
                                num_formats.insert(id, code);
                            }
                        }
                    }
                    b"cellXfs" => {
                        in_cell_xfs = true;
                    }
                    b"xf" if in_cell_xfs => {
                        // <xf numFmtId="165" fontId="0" applyNumberFormat="1"/>
                        let num_fmt_id = match attribute_value(&e, b"numFmtId")? {
                            Some(id) => id.parse()?,
                            None => 0,
                        };
                        cell_xfs.push(num_fmt_id);
                    }
                    _ => {}
                },
                Event::End(e) => {
                    if e.name().as_ref() == b"cellXfs" {
                        in_cell_xfs = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok((num_formats, cell_xfs))
    }

    /// ワークシートXMLからセルごとのスタイルインデックスを解析
    fn parse_worksheet_styles(xml_content: &[u8]) -> Result<HashMap<(u32, u32), u32>, MergeError> {
        let mut reader = Reader::from_reader(xml_content);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut styles = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    if e.name().as_ref() == b"c" {
                        // <c r="B2" s="3" t="s">
                        let coord = attribute_value(&e, b"r")?.and_then(|r| parse_cell_ref(&r));
                        let style = attribute_value(&e, b"s")?;
                        if let (Some(coord), Some(style)) = (coord, style) {
                            styles.insert(coord, style.parse()?);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(styles)
    }
}

/// アーカイブエントリを読み出す（存在しない場合は`None`）
fn read_archive_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, MergeError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(_) => return Ok(None),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// 開始タグから属性値を取得（エンティティ参照は展開する）
fn attribute_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>, MergeError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| MergeError::Config(format!("XML attribute error: {}", e)))?;
        if attr.key.as_ref() == key {
            let decoded = std::str::from_utf8(attr.value.as_ref())
                .map_err(|e| MergeError::Config(format!("XML attribute error: {}", e)))?;
            let value = quick_xml::escape::unescape(decoded)
                .map_err(|e| MergeError::Config(format!("XML attribute error: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// リレーションシップのTargetをアーカイブ内パスに正規化
///
/// 相対パス（例: "worksheets/sheet1.xml"）は"xl/"起点、絶対パス
/// （例: "/xl/worksheets/sheet1.xml"）は先頭の"/"を除いたパスです。
fn normalize_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// A1形式のセル参照を0始まりの（行, 列）に変換
///
/// 例: "A1" -> (0, 0)、"BC12" -> (11, 54)
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (col_str, row_str) = cell_ref.split_at(split);
    if col_str.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for ch in col_str.chars() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col * 26 + (ch as u32 - 'A' as u32 + 1);
    }

    let row: u32 = row_str.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}

/// ビルトイン書式ID（0-163）のマッピング
///
/// Excelの標準書式IDとフォーマット文字列の対応表です。
fn builtin_format_code(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B2"), Some((1, 1)));
        assert_eq!(parse_cell_ref("Z1"), Some((0, 25)));
        assert_eq!(parse_cell_ref("AA1"), Some((0, 26)));
        assert_eq!(parse_cell_ref("ZZ100"), Some((99, 701)));
        assert_eq!(parse_cell_ref("BC12"), Some((11, 54)));
    }

    #[test]
    fn test_parse_cell_ref_invalid() {
        assert_eq!(parse_cell_ref(""), None);
        assert_eq!(parse_cell_ref("123"), None);
        assert_eq!(parse_cell_ref("ABC"), None);
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("a1"), None);
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(
            normalize_target("worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            normalize_target("/xl/worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
    }

    #[test]
    fn test_builtin_format_code() {
        assert_eq!(builtin_format_code(0), Some("General"));
        assert_eq!(builtin_format_code(1), Some("0"));
        assert_eq!(builtin_format_code(3), Some("#,##0"));
        assert_eq!(builtin_format_code(9), Some("0%"));
        assert_eq!(builtin_format_code(14), Some("mm-dd-yy"));
        assert_eq!(builtin_format_code(49), Some("@"));
        assert_eq!(builtin_format_code(50), None);
        assert_eq!(builtin_format_code(163), None);
        assert_eq!(builtin_format_code(164), None);
    }

    #[test]
    fn test_parse_worksheet_styles() {
        let xml = br#"<worksheet><sheetData><row r="1"><c r="A1" s="0"><v>1</v></c><c r="B1" s="3" t="s"><v>0</v></c><c r="C1"/></row><row r="2"><c r="A2" s="5"/></row></sheetData></worksheet>"#;
        let styles = StylesParser::parse_worksheet_styles(xml).unwrap();
        assert_eq!(styles.get(&(0, 0)), Some(&0));
        assert_eq!(styles.get(&(0, 1)), Some(&3));
        // s属性のないセルは登録されない
        assert_eq!(styles.get(&(0, 2)), None);
        assert_eq!(styles.get(&(1, 0)), Some(&5));
    }

    #[test]
    fn test_format_code_resolution() {
        let mut num_formats = HashMap::new();
        num_formats.insert(164, "¥#,##0".to_string());

        let mut cells = HashMap::new();
        cells.insert((1, 0), 1u32); // スタイル1 -> numFmtId 164（カスタム）
        cells.insert((1, 1), 2u32); // スタイル2 -> numFmtId 9（ビルトイン）
        cells.insert((1, 2), 0u32); // スタイル0 -> numFmtId 0（General）

        let mut sheet_styles = HashMap::new();
        sheet_styles.insert("Sheet1".to_string(), cells);

        let parser = StylesParser {
            num_formats,
            cell_xfs: vec![0, 164, 9],
            sheet_styles,
            is_1904: false,
        };

        assert_eq!(parser.format_code("Sheet1", 1, 0), Some("¥#,##0"));
        assert_eq!(parser.format_code("Sheet1", 1, 1), Some("0%"));
        assert_eq!(parser.format_code("Sheet1", 1, 2), Some("General"));
        // 登録のないセル・シート
        assert_eq!(parser.format_code("Sheet1", 5, 5), None);
        assert_eq!(parser.format_code("Other", 1, 0), None);
    }
}
