//! Language code to display name mapping.

/// Display name for an ISO 639-1 or 639-2 code. Unknown codes come back
/// upper-cased.
pub fn language_name(code: &str) -> String {
    let name = match code.trim().to_ascii_lowercase().as_str() {
        "en" | "eng" => "English",
        "es" | "spa" => "Spanish",
        "fr" | "fre" | "fra" => "French",
        "de" | "ger" | "deu" => "German",
        "it" | "ita" => "Italian",
        "pt" | "por" => "Portuguese",
        "pt-br" | "pb" | "pob" => "PortugueseBR",
        "ru" | "rus" => "Russian",
        "ja" | "jpn" => "Japanese",
        "ko" | "kor" => "Korean",
        "zh" | "zh-cn" | "zh-tw" | "chi" | "zho" => "Chinese",
        "ar" | "ara" => "Arabic",
        "hi" | "hin" => "Hindi",
        "nl" | "dut" | "nld" => "Dutch",
        "pl" | "pol" => "Polish",
        "tr" | "tur" => "Turkish",
        "sv" | "swe" => "Swedish",
        "no" | "nb" | "nor" => "Norwegian",
        "da" | "dan" => "Danish",
        "fi" | "fin" => "Finnish",
        "el" | "gre" | "ell" => "Greek",
        "he" | "heb" => "Hebrew",
        "hu" | "hun" => "Hungarian",
        "cs" | "cze" | "ces" => "Czech",
        "ro" | "rum" | "ron" => "Romanian",
        "bg" | "bul" => "Bulgarian",
        "hr" | "hrv" => "Croatian",
        "sl" | "slv" => "Slovenian",
        "sr" | "srp" => "Serbian",
        "uk" | "ukr" => "Ukrainian",
        "vi" | "vie" => "Vietnamese",
        "th" | "tha" => "Thai",
        "id" | "ind" => "Indonesian",
        "ms" | "may" | "msa" => "Malay",
        "is" | "ice" | "isl" => "Icelandic",
        _ => return code.trim().to_uppercase(),
    };
    name.to_string()
}
