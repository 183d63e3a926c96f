//! Formatter Module
//!
//! セル値のフォーマット処理を提供するモジュール。
//! 差し込み結果には、スプレッドシートアプリケーションが表示する文字列と
//! 同じものを埋め込む必要があるため、生値ではなく表示文字列を生成します。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::format::FormatCode;
use crate::types::CellValue;

/// セルフォーマッター
///
/// 生のセル値と分類済み書式から表示文字列を生成します。
/// この変換は純粋関数であり、失敗することはありません。認識できない
/// 組み合わせはデフォルトの文字列化にフォールバックします。
///
/// # 使用例
///
/// ```rust
/// use mergezero::{CellFormatter, CellValue, FormatCode};
///
/// let formatter = CellFormatter::new();
/// let code = FormatCode::classify("#,##0.00");
/// assert_eq!(
///     formatter.render(&CellValue::Float(1234.5), &code),
///     "1,234.50"
/// );
/// ```
#[derive(Debug, Default)]
pub struct CellFormatter;

impl CellFormatter {
    /// 新しいCellFormatterインスタンスを生成
    pub fn new() -> Self {
        Self
    }

    /// セル値を表示文字列に変換
    ///
    /// # 引数
    ///
    /// * `value` - 生のセル値
    /// * `code` - 分類済みの書式（[`FormatCode::classify`]の結果）
    ///
    /// # 変換規則
    ///
    /// * 空セル → 空文字列
    /// * 文字列 → そのまま（書式は無視）
    /// * 論理値 → `TRUE` / `FALSE`
    /// * エラー値 → エラー文字列そのまま
    /// * 日付・日時 → 時刻成分が非ゼロなら`YYYY-MM-DD HH:MM:SS`、
    ///   それ以外は`YYYY-MM-DD`（カスタム日付書式はこの区別以上には
    ///   反映しない）
    /// * 数値 → 書式の分類に応じて描画（下記参照）
    pub fn render(&self, value: &CellValue, code: &FormatCode) -> String {
        match value {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::DateTime(dt) => Self::render_datetime(dt),
            CellValue::Int(i) => self.render_number(*i as f64, code),
            CellValue::Float(f) => self.render_number(*f, code),
        }
    }

    /// 書式文字列を分類してからセル値を変換する簡易版
    ///
    /// 同じ書式で多数のセルを描画する場合は、[`FormatCode::classify`]の
    /// 結果を使い回す[`CellFormatter::render`]を使用してください。
    pub fn render_with_code(&self, value: &CellValue, code: &str) -> String {
        self.render(value, &FormatCode::classify(code))
    }

    /// 日付・日時を描画
    ///
    /// 時刻成分が00:00:00の場合は日付のみを出力します。
    fn render_datetime(dt: &NaiveDateTime) -> String {
        if dt.time().num_seconds_from_midnight() == 0 {
            dt.format("%Y-%m-%d").to_string()
        } else {
            dt.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }

    /// 数値を書式分類に応じて描画
    fn render_number(&self, value: f64, code: &FormatCode) -> String {
        match *code {
            FormatCode::ZeroPad { width } => {
                // ゼロパディングは整数値のみが対象。非整数値はデフォルト描画へ
                if value.fract() == 0.0 {
                    format!("{:0width$}", value as i64, width = width)
                } else {
                    default_number(value)
                }
            }

            FormatCode::Currency { symbol, decimals } => {
                // 小数部が明示されていない書式では、整数値は小数点なしで
                // 描画する（例: ¥#,##0 の 1500 → ¥1,500）
                let places = decimals.unwrap_or(if value.fract() == 0.0 { 0 } else { 2 });
                format!("{}{}", symbol, grouped(value, places))
            }

            FormatCode::Thousands { decimals } => grouped(value, decimals),

            FormatCode::Percent { decimals } => {
                format!("{:.*}%", decimals, value * 100.0)
            }

            FormatCode::General => default_number(value),
        }
    }
}

/// デフォルトの数値描画
///
/// 整数値は末尾の`.0`を付けない整数表記、非整数値は最短の10進表現。
fn default_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// 固定小数桁 + 千区切りで数値を描画
fn grouped(value: f64, places: usize) -> String {
    let formatted = format!("{:.*}", places, value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let grouped_digits = group_digits(digits);
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped_digits, f),
        None => format!("{}{}", sign, grouped_digits),
    }
}

/// 整数部の桁列に千の位区切りを挿入
fn group_digits(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(len + len / 3);

    for (i, ch) in chars.iter().enumerate() {
        result.push(*ch);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            result.push(',');
        }
    }
    result
}

/// Excelシリアル日付値をNaiveDateTimeに変換
///
/// # エポックシステム
///
/// - 1900年システム（デフォルト）: 1899年12月30日起算
///   - 1900年3月1日以降のシリアル値はExcelの表示と一致します
///   - それ以前（1900年1月〜2月）はExcelの1900年うるう年バグの影響を受けます
/// - 1904年システム: 1904年1月1日起算（Mac版Excel）
///   - シリアル値0 = 1904年1月1日
///
/// 範囲外のシリアル値は`None`を返します。
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    // Excelのシリアル値の有効範囲は0〜2958465（9999-12-31）
    if !(0.0..=2_958_465.0).contains(&serial) {
        return None;
    }

    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let mut days = serial.floor() as i64;
    let mut secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    if secs >= 86_400 {
        days += 1;
        secs -= 86_400;
    }

    let date = epoch.checked_add_signed(Duration::days(days))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(NaiveDateTime::new(date, time))
}
