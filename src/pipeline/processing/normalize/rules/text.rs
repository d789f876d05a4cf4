use crate::constants::UNSPECIFIED;

/// Textual nulls left behind by spreadsheet and dataframe exports, plus the
/// sentinel itself so canonical values survive a second pass.
const NULL_SPELLINGS: [&str; 4] = ["nan", "none", "null", "sin especificar"];

/// True when a free-text value carries no information.
pub fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let trimmed = v.trim();
            trimmed.is_empty()
                || NULL_SPELLINGS
                    .iter()
                    .any(|null| trimmed.eq_ignore_ascii_case(null))
        }
    }
}

/// Trim and title-case a district or locality, or return the
/// `SIN ESPECIFICAR` sentinel for blank input.
pub fn canonicalize_text(value: Option<&str>) -> String {
    match value {
        Some(v) if !is_blank(Some(v)) => title_case(v.trim()),
        _ => UNSPECIFIED.to_string(),
    }
}

/// Word-boundary title casing: a letter following a non-letter is
/// uppercased, every other letter lowercased. Unicode aware, so `ñandutí`
/// becomes `Ñandutí`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

/// Uppercase-and-trim used for values matched against uppercase tables.
pub fn upper_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Strip Spanish diacritics so `ITAUGUÁ`, `ITAUGUA` and `ITAUGUÀ` compare equal.
pub fn fold_accents(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ñ' => 'N',
            'á' | 'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}
