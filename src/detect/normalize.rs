/// Canonical comparison key for a sheet number: uppercase, no whitespace, and
/// no hyphen/underscore between a letter and the digit that follows it.
pub fn normalize_sheet_ref(raw: &str) -> String {
    let compact = fold_token(raw).chars().collect::<Vec<char>>();

    let mut out = String::with_capacity(compact.len());
    for (index, character) in compact.iter().enumerate() {
        if matches!(character, '-' | '_') {
            let after_letter = out
                .chars()
                .last()
                .map(|previous| previous.is_ascii_alphabetic())
                .unwrap_or(false);
            let before_digit = compact[index + 1..]
                .iter()
                .find(|next| !matches!(next, '-' | '_'))
                .map(|next| next.is_ascii_digit())
                .unwrap_or(false);
            if after_letter && before_digit {
                continue;
            }
        }
        out.push(*character);
    }

    out
}

/// Symbol tags never carry a separator between the stacked halves.
pub fn normalize_symbol_tag_ref(alpha: &str, numeric: &str) -> String {
    format!("{}{}", fold_token(alpha), fold_token(numeric))
}

pub fn fold_token(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|character| !character.is_whitespace())
        .collect()
}
