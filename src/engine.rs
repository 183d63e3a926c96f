//! Engine Module
//!
//! プレースホルダーの抽出と置換を提供するモジュール。
//!
//! プレースホルダーは`«key»`形式のトークンで、段落の可視テキスト
//! （ラン列の連結）上で検出されます。ランの境界は書式の境界にすぎない
//! ため、1つのプレースホルダーが複数のランにまたがることがあります。
//! 置換はランのテキストのみを書き換え、ランの数と書式を保存します。

use std::collections::{BTreeSet, HashMap};

use crate::document::{Document, Paragraph};
use crate::types::{SkippedMatch, SubstitutionReport};

/// プレースホルダーの開始デリミタ（固定）
const OPEN: char = '«';

/// プレースホルダーの終了デリミタ（固定）
const CLOSE: char = '»';

/// 論理テキスト上のプレースホルダーマッチ
///
/// オフセットはすべて連結テキスト上のバイト位置です。マッチ境界は
/// 常に文字境界であるため、ランテキストのスライスにそのまま使えます。
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlaceholderMatch {
    /// `«`の開始バイト位置
    start: usize,
    /// `»`の直後のバイト位置
    end: usize,
    /// デリミタ間のキー（空文字列も有効）
    key: String,
}

/// 論理テキストからすべてのプレースホルダーマッチを検出
///
/// `«`から次の`»`までを非貪欲にマッチします。対応する`»`のない`«`は
/// マッチを生成しません。マッチ同士は重なりません。
fn find_placeholders(text: &str) -> Vec<PlaceholderMatch> {
    let mut matches = Vec::new();
    let mut from = 0;

    while let Some(open_rel) = text[from..].find(OPEN) {
        let start = from + open_rel;
        let key_start = start + OPEN.len_utf8();
        match text[key_start..].find(CLOSE) {
            Some(close_rel) => {
                let key_end = key_start + close_rel;
                let end = key_end + CLOSE.len_utf8();
                matches.push(PlaceholderMatch {
                    start,
                    end,
                    key: text[key_start..key_end].to_string(),
                });
                from = end;
            }
            None => break,
        }
    }

    matches
}

/// 段落のラン区間表
///
/// ランごとの連結テキスト上の半開区間`[start, end)`を保持します。
/// 段落ごとに一度だけ構築し、その段落のすべてのマッチ解決に再利用します。
/// マッチは開始位置の降順で処理されるため、ラン末尾側の書き換えが
/// 未処理マッチの区間を無効化することはありません。
#[derive(Debug)]
struct RunTable {
    spans: Vec<(usize, usize)>,
}

impl RunTable {
    /// 段落のランからラン区間表を構築
    fn new(paragraph: &Paragraph) -> Self {
        let mut spans = Vec::with_capacity(paragraph.runs.len());
        let mut offset = 0;
        for run in &paragraph.runs {
            let len = run.text.len();
            spans.push((offset, offset + len));
            offset += len;
        }
        Self { spans }
    }

    /// マッチ開始オフセットを含むランを検索
    ///
    /// ランが`offset`を含むのは`start <= offset < end`のとき。
    /// 長さ0のランはどのオフセットも含みません。
    fn run_at_start(&self, offset: usize) -> Option<(usize, usize)> {
        self.spans
            .iter()
            .position(|(start, end)| *start <= offset && offset < *end)
            .map(|idx| (idx, offset - self.spans[idx].0))
    }

    /// マッチ終了オフセットを含むランを検索
    ///
    /// 終了側の判定は`start < offset <= end`です（終了オフセットは
    /// マッチ最終文字の直後を指すため）。
    fn run_at_end(&self, offset: usize) -> Option<(usize, usize)> {
        self.spans
            .iter()
            .position(|(start, end)| *start < offset && offset <= *end)
            .map(|idx| (idx, offset - self.spans[idx].0))
    }
}

/// 文書中のすべてのプレースホルダーキーを収集
///
/// すべてのテキストパート（本文、表のセル、ヘッダー、フッター）を走査し、
/// 段落ごとにランのテキストを連結してから検出します。結果は重複なしの
/// キー集合です。この操作は冪等で、文書を変更しません。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::fs::File;
/// use mergezero::{collect_keys, Document};
///
/// # fn main() -> Result<(), mergezero::MergeError> {
/// let document = Document::read(File::open("template.docx")?)?;
/// for key in collect_keys(&document) {
///     println!("«{}»", key);
/// }
/// # Ok(())
/// # }
/// ```
pub fn collect_keys(document: &Document) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for part in &document.parts {
        for paragraph in &part.paragraphs {
            if paragraph.runs.is_empty() {
                continue;
            }
            let text = paragraph.text();
            for m in find_placeholders(&text) {
                keys.insert(m.key);
            }
        }
    }
    keys
}

/// 文書中のプレースホルダーを置換マップの値で書き換える
///
/// 段落ごとに独立して処理します:
///
/// 1. ランのテキストを順に連結した論理テキストと、ラン区間表を構築する
/// 2. 論理テキスト上のマッチをすべて検出する（なければ段落はそのまま）
/// 3. マッチを開始位置の降順（右から左）に処理する
/// 4. マップにキーが存在するマッチのみ、開始・終了ランを特定して
///    テキストを差し替える。単一ラン内なら部分置換、複数ランに
///    またがる場合は先頭ランに前置部+置換値、末尾ランに後置部を
///    書き込み、中間ランを空にする
///
/// マップにないキーのプレースホルダーはそのまま残ります。ラン数は
/// 常に保存されます（空になったランも削除されません）。オフセットを
/// ランに解決できなかったマッチはスキップして記録し、残りの処理を
/// 継続します。
///
/// # 戻り値
///
/// 置換に成功した出現数と、スキップされたマッチのリスト。
pub fn substitute(
    document: &mut Document,
    replacements: &HashMap<String, String>,
) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();

    for part in &mut document.parts {
        for (para_idx, paragraph) in part.paragraphs.iter_mut().enumerate() {
            if paragraph.runs.is_empty() {
                continue;
            }

            let text = paragraph.text();
            let matches = find_placeholders(&text);
            if matches.is_empty() {
                continue;
            }

            let table = RunTable::new(paragraph);

            // 右から左へ処理し、書き換えによるオフセットのずれを回避する
            for m in matches.iter().rev() {
                let Some(value) = replacements.get(&m.key) else {
                    continue;
                };

                match (table.run_at_start(m.start), table.run_at_end(m.end)) {
                    (Some((start_run, start_pos)), Some((end_run, end_pos))) => {
                        if start_run == end_run {
                            let run = &mut paragraph.runs[start_run];
                            run.text = format!(
                                "{}{}{}",
                                &run.text[..start_pos],
                                value,
                                &run.text[end_pos..]
                            );
                        } else {
                            let first = &mut paragraph.runs[start_run];
                            first.text = format!("{}{}", &first.text[..start_pos], value);

                            let last = &mut paragraph.runs[end_run];
                            last.text = last.text[end_pos..].to_string();

                            for middle in &mut paragraph.runs[start_run + 1..end_run] {
                                middle.text.clear();
                            }
                        }
                        report.replaced += 1;
                    }
                    (start, end) => {
                        // 段落の不変条件が保たれている限り到達しない
                        let reason = format!(
                            "offset resolution failed (start: {}, end: {})",
                            start.is_some(),
                            end.is_some()
                        );
                        log::warn!(
                            "skipping placeholder «{}» in {} paragraph {}: {}",
                            m.key,
                            part.name,
                            para_idx,
                            reason
                        );
                        report.failures.push(SkippedMatch {
                            part: part.name.clone(),
                            paragraph: para_idx,
                            key: m.key.clone(),
                            reason,
                        });
                    }
                }
            }
        }
    }

    report
}
