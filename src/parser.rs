//! トークナイザ + コマンドリスト: 入力行を `;` → `&&` → `||` → `|` → 空白 の順に分割する。
//!
//! 文法による構文解析ではなく、文字列の逐次分割で構造を決める。
//! 引数中の `|` や `;` もクォートに関係なく区切り文字として扱われる。
//! 分割結果は接続子付きのパイプライン列（[`CommandList`]）に平坦化され、
//! executor が左から順に評価する。`a && b || c` は `(a && b) || c` になる。
//!
//! ## 分割規則
//!
//! | 段階 | 区切り | 生成物 |
//! |------|--------|--------|
//! | 1 | `;`（文字） | 文（境界は [`Connector::Seq`]） |
//! | 2 | `&&`（リテラル） | AND 要素（境界は [`Connector::And`]） |
//! | 3 | `\|\|`（リテラル） | [`Pipeline`]（境界は [`Connector::Or`]） |
//! | 4 | `\|`（文字） | [`Segment`] |
//! | 5 | 空白文字 | 引数 |
//!
//! 各段階のトークンは前後の空白を除去し、空トークンは捨てる。
//! 上限（[`TOKEN_CAPACITY`] / [`STAGE_CAPACITY`]）を超えた分は黙って切り捨てる。

use tracing::debug;

/// 1 回の分割で保持するトークン数の上限。超過分は捨てる。
pub const TOKEN_CAPACITY: usize = 127;

/// 1 パイプラインあたりのセグメント数の上限。超過分は捨てる。
pub const STAGE_CAPACITY: usize = 16;

/// バックグラウンド実行マーカー。最終セグメントの末尾にのみ意味を持つ。
pub const BACKGROUND_MARKER: char = '&';

const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

// ── トークナイザ ────────────────────────────────────────────────────

/// 区切り指定。
#[derive(Debug, Clone, Copy)]
pub enum Delimiter<'d> {
    /// いずれかの文字で区切る（`;`, `|`, 空白）。
    AnyOf(&'d [char]),
    /// 完全一致するリテラルで区切る（`&&`, `||`）。
    Literal(&'d str),
}

/// `input` を `delim` で分割し、空白除去済みの非空トークンを順序どおり返す。
///
/// トークンは入力のスライスを借用する（ゼロコピー）。
/// [`TOKEN_CAPACITY`] を超えたトークンは捨てる。
pub fn split<'a>(input: &'a str, delim: Delimiter<'_>) -> Vec<&'a str> {
    match delim {
        Delimiter::AnyOf(set) => collect_tokens(input.split(|c: char| set.contains(&c))),
        // 空リテラルでは分割しない
        Delimiter::Literal("") => collect_tokens(std::iter::once(input)),
        Delimiter::Literal(lit) => collect_tokens(input.split(lit)),
    }
}

fn collect_tokens<'a>(pieces: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut tokens = Vec::new();
    for piece in pieces {
        let token = piece.trim();
        if token.is_empty() {
            continue;
        }
        if tokens.len() == TOKEN_CAPACITY {
            debug!(capacity = TOKEN_CAPACITY, "token capacity reached, dropping the rest");
            break;
        }
        tokens.push(token);
    }
    tokens
}

// ── コマンドリスト ──────────────────────────────────────────────────

/// コマンドリスト: 1 行を分割して得たパイプラインを接続子付きで並べたもの。
/// `a && b || c ; d` → 4 要素。
#[derive(Debug, PartialEq)]
pub struct CommandList<'a> {
    pub items: Vec<ListItem<'a>>,
}

/// リスト内の 1 要素。
#[derive(Debug, PartialEq)]
pub struct ListItem<'a> {
    pub pipeline: Pipeline<'a>,
    /// 次のパイプラインとの接続。最後の要素は `Connector::Seq`。
    pub connector: Connector,
}

/// パイプライン間の接続子。
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Connector {
    /// `;` またはリスト末尾 — 無条件に次を実行
    Seq,
    /// `&&` — 直前が成功 (status == 0) の場合のみ次を実行
    And,
    /// `||` — 直前が失敗 (status != 0) の場合のみ次を実行
    Or,
}

/// `|` で接続されたセグメント列。
///
/// `background` は最終セグメント末尾の `&` を除去した場合に `true`。
#[derive(Debug, PartialEq)]
pub struct Pipeline<'a> {
    pub segments: Vec<Segment<'a>>,
    pub background: bool,
}

/// 1 つの実行単位。`args[0]` がコマンド名。`&` 単独などでは空になりうる。
#[derive(Debug, PartialEq)]
pub struct Segment<'a> {
    pub args: Vec<&'a str>,
}

/// 入力行をコマンドリストに分割する。失敗しない（空トークンは捨てられる）。
///
/// `;` → `&&` → `||` の順に分割し、各 `||` 要素をパイプラインとして並べる。
/// 要素間の接続子は、同じ `&&` 要素内なら `Or`、`&&` 要素の境界なら `And`、
/// 文の境界なら `Seq` になる。
pub fn parse(input: &str) -> CommandList<'_> {
    let mut items: Vec<ListItem<'_>> = Vec::new();

    for statement in split(input, Delimiter::AnyOf(&[';'])) {
        for (j, and_member) in split(statement, Delimiter::Literal("&&")).into_iter().enumerate() {
            for (k, or_member) in split(and_member, Delimiter::Literal("||")).into_iter().enumerate() {
                let link = match (j, k) {
                    (_, 1..) => Connector::Or,
                    (1.., 0) => Connector::And,
                    (0, 0) => Connector::Seq,
                };
                if let Some(prev) = items.last_mut() {
                    prev.connector = link;
                }
                items.push(ListItem {
                    pipeline: parse_pipeline(or_member),
                    connector: Connector::Seq,
                });
            }
        }
    }

    CommandList { items }
}

/// `|` で分割し、最終セグメント末尾の `&` を検出・除去してから各セグメントを空白で分割する。
pub fn parse_pipeline(text: &str) -> Pipeline<'_> {
    let mut stages = split(text, Delimiter::AnyOf(&['|']));
    if stages.len() > STAGE_CAPACITY {
        debug!(capacity = STAGE_CAPACITY, stages = stages.len(), "pipeline truncated");
        stages.truncate(STAGE_CAPACITY);
    }

    let mut background = false;
    if let Some(last) = stages.last_mut() {
        if let Some(stripped) = last.strip_suffix(BACKGROUND_MARKER) {
            *last = stripped.trim_end();
            background = true;
        }
    }

    let segments = stages
        .into_iter()
        .map(|stage| Segment {
            args: split(stage, Delimiter::AnyOf(WHITESPACE)),
        })
        .collect();

    Pipeline {
        segments,
        background,
    }
}
