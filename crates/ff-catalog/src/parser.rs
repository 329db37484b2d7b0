use serde::Serialize;

/// Base of the regional indicator block; `A` maps here.
const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;

/// One selectable flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagOption {
    pub code: String,
    pub name: String,
    pub emoji: String,
}

/// Turn a two-letter ISO code into its regional-indicator flag. Returns an
/// empty string for anything that is not exactly two ASCII letters.
pub fn iso_code_to_emoji(code: &str) -> String {
    let upper = code.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_uppercase) {
        return String::new();
    }

    bytes
        .iter()
        .filter_map(|b| char::from_u32(REGIONAL_INDICATOR_A + u32::from(b - b'A')))
        .collect()
}

/// Parse a `CODE|Name` table. Blank lines are skipped; lines without a
/// separator or with a code that has no flag are dropped.
pub fn parse_country_table(text: &str) -> Vec<FlagOption> {
    let mut options = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((code, name)) = line.split_once('|') else {
            log::debug!("skipping catalog line without separator: {line}");
            continue;
        };

        let code = code.trim();
        let emoji = iso_code_to_emoji(code);
        if emoji.is_empty() {
            log::debug!("skipping catalog line with invalid code: {line}");
            continue;
        }

        options.push(FlagOption {
            code: code.to_string(),
            name: name.trim().to_string(),
            emoji,
        });
    }

    options
}
