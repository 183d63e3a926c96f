//! FormatCode Module
//!
//! Excel Number Format Stringを、差し込み描画に必要な閉じたタグ付き
//! バリアント集合へ分類するモジュール。
//!
//! 書式文字列の一般的な構文解析（トークン列化）ではなく、セルごとに
//! 一度だけ判定した分類結果を描画のたびに再利用します。判定は
//! 固定された優先順位（ゼロパディング → 通貨 → 千区切り → パーセント →
//! デフォルト）で行われ、最初に一致した規則が採用されます。

/// 通貨記号の候補
///
/// 書式文字列にいずれかが含まれる場合、通貨書式として扱います。
/// 配列の順序が判定順であり、最初に見つかった記号が採用されます。
const CURRENCY_SYMBOLS: [char; 4] = ['¥', '$', '€', '￥'];

/// 分類済みの数値書式
///
/// [`FormatCode::classify`]が書式文字列を一度だけ解釈した結果です。
/// 数値以外の値（文字列・日付・論理値など）の描画には関与しません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCode {
    /// ゼロパディング書式（例: `"000"`）
    ///
    /// 書式文字列が`0`のみで構成される場合。幅は書式文字列の長さです。
    /// 単独の`"0"`も幅1のゼロパディングとして扱います（整数には無害）。
    ZeroPad {
        /// パディング後の最小桁数
        width: usize,
    },

    /// 通貨書式（例: `"¥#,##0"`, `"$#,##0.00"`)
    ///
    /// 書式文字列に通貨記号が含まれる場合。
    Currency {
        /// 通貨記号
        symbol: char,
        /// 小数点以下の桁数
        ///
        /// `None`は書式に明示的な小数部がないことを意味し、整数値は
        /// 小数点なし、非整数値はデフォルトの2桁で描画されます。
        decimals: Option<usize>,
    },

    /// 千区切り書式（例: `"#,##0"`, `"#,##0.00"`)
    Thousands {
        /// 小数点以下の桁数（小数部がない場合は0）
        decimals: usize,
    },

    /// パーセント書式（例: `"0%"`, `"0.0%"`)
    ///
    /// 値を100倍し、`%`を付けて描画します。
    Percent {
        /// 小数点以下の桁数（小数部がない場合は0）
        decimals: usize,
    },

    /// 上記のいずれにも該当しない書式（`"General"`を含む）
    ///
    /// 整数値は整数として、非整数値は最短の10進表現で描画されます。
    General,
}

impl FormatCode {
    /// 書式文字列を分類
    ///
    /// # 引数
    ///
    /// * `code` - Excel Number Format String
    ///
    /// # 判定順序
    ///
    /// 1. ゼロパディング: `0`のみで構成される
    /// 2. 通貨: 通貨記号（¥ $ € ￥）を含む
    /// 3. 千区切り: `#,##0`または`#,###`を含む
    /// 4. パーセント: `%`を含む
    /// 5. それ以外はすべて[`FormatCode::General`]
    ///
    /// 認識できない書式がエラーになることはありません。
    pub fn classify(code: &str) -> Self {
        if !code.is_empty() && code.chars().all(|c| c == '0') {
            return FormatCode::ZeroPad { width: code.len() };
        }

        if let Some(symbol) = CURRENCY_SYMBOLS.iter().find(|s| code.contains(**s)) {
            return FormatCode::Currency {
                symbol: *symbol,
                decimals: explicit_decimals(code),
            };
        }

        if code.contains("#,##0") || code.contains("#,###") {
            return FormatCode::Thousands {
                decimals: explicit_decimals(code).unwrap_or(0),
            };
        }

        if code.contains('%') {
            return FormatCode::Percent {
                decimals: explicit_decimals(code).unwrap_or(0),
            };
        }

        FormatCode::General
    }
}

/// 書式文字列から明示的な小数桁数を抽出
///
/// 最後の`.`より後ろの`0`の個数を数えます。`.`がない場合、または
/// 小数部に`0`が1つもない場合は`None`を返します。
///
/// 複数の小数グループや、`,`を小数点として使うロケール固有の書式は
/// 対象外です（既知の制限）。
fn explicit_decimals(code: &str) -> Option<usize> {
    let decimal_part = code.rsplit('.').next()?;
    if decimal_part.len() == code.len() {
        // `.`が含まれていない
        return None;
    }
    let zeros = decimal_part.chars().filter(|c| *c == '0').count();
    if zeros > 0 {
        Some(zeros)
    } else {
        None
    }
}
