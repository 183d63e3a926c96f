//! Parser Module
//!
//! calamineを使用したExcelワークブック解析と、calamineでは取得できない
//! セル書式情報のXML直接解析を提供するモジュール。

mod styles;
mod workbook;

pub(crate) use styles::StylesParser;
pub(crate) use workbook::RecordParser;
