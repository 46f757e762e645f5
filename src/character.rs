/// The long vowel mark; a word ending in it chains from the character before it instead.
pub const LONG_VOWEL_MARK: char = 'ー';

// voiced, semi-voiced and small kana fold onto their base kana
const KANA_TABLE: &[(char, char)] = &[
    ('が', 'か'), ('ぎ', 'き'), ('ぐ', 'く'), ('げ', 'け'), ('ご', 'こ'),
    ('ざ', 'さ'), ('じ', 'し'), ('ず', 'す'), ('ぜ', 'せ'), ('ぞ', 'そ'),
    ('だ', 'た'), ('ぢ', 'ち'), ('づ', 'つ'), ('で', 'て'), ('ど', 'と'),
    ('ば', 'は'), ('び', 'ひ'), ('ぶ', 'ふ'), ('べ', 'へ'), ('ぼ', 'ほ'),
    ('ぱ', 'は'), ('ぴ', 'ひ'), ('ぷ', 'ふ'), ('ぺ', 'へ'), ('ぽ', 'ほ'),
    ('ぁ', 'あ'), ('ぃ', 'い'), ('ぅ', 'う'), ('ぇ', 'え'), ('ぉ', 'お'),
    ('ゃ', 'や'), ('ゅ', 'ゆ'), ('ょ', 'よ'), ('っ', 'つ'),
    ('ガ', 'カ'), ('ギ', 'キ'), ('グ', 'ク'), ('ゲ', 'ケ'), ('ゴ', 'コ'),
    ('ザ', 'サ'), ('ジ', 'シ'), ('ズ', 'ス'), ('ゼ', 'セ'), ('ゾ', 'ソ'),
    ('ダ', 'タ'), ('ヂ', 'チ'), ('ヅ', 'ツ'), ('デ', 'テ'), ('ド', 'ト'),
    ('バ', 'ハ'), ('ビ', 'ヒ'), ('ブ', 'フ'), ('ベ', 'ヘ'), ('ボ', 'ホ'),
    ('パ', 'ハ'), ('ピ', 'ヒ'), ('プ', 'フ'), ('ペ', 'ヘ'), ('ポ', 'ホ'),
    ('ァ', 'ア'), ('ィ', 'イ'), ('ゥ', 'ウ'), ('ェ', 'エ'), ('ォ', 'オ'),
    ('ャ', 'ヤ'), ('ュ', 'ユ'), ('ョ', 'ヨ'), ('ッ', 'ツ'),
];

/// Fold a character onto the base form used for chaining: lowercase first, then strip voicing marks and
/// enlarge small kana.
pub fn normalize(ch: char) -> char {
    let lower = ch.to_lowercase().next().unwrap_or(ch);

    KANA_TABLE.iter()
        .find(|(from, _)| *from == lower)
        .map_or(lower, |(_, to)| *to)
}

/// The normalized characters a word starts and ends with, or [`None`] for an empty word.
///
/// When the word ends in [`LONG_VOWEL_MARK`], the character right before it is used as the end instead.
/// A word consisting of the mark alone keeps it.
pub fn word_ends(word: &str) -> Option<(char, char)> {
    let mut chars = word.chars();
    let first = chars.next()?;

    let mut rev = word.chars().rev();
    let last = match rev.next() {
        Some(LONG_VOWEL_MARK) => rev.next().unwrap_or(LONG_VOWEL_MARK),
        Some(ch) => ch,
        None => first,
    };

    Some((normalize(first), normalize(last)))
}
