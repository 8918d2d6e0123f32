//! SRT to WebVTT conversion for browser `<track>` elements.

/// Converts SubRip text to WebVTT.
///
/// Strips a leading BOM, normalizes line endings and rewrites the decimal
/// comma in cue timings. Dialogue lines are left untouched.
pub fn srt_to_webvtt(srt: &str) -> String {
    let srt = srt.strip_prefix('\u{feff}').unwrap_or(srt);
    let mut webvtt = String::with_capacity(srt.len() + 8);
    webvtt.push_str("WEBVTT\n\n");

    for line in srt.lines() {
        let line = line.trim_end_matches('\r');
        if line.contains(" --> ") {
            webvtt.push_str(&line.replace(',', "."));
        } else {
            webvtt.push_str(line);
        }
        webvtt.push('\n');
    }

    webvtt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_conversion() {
        let srt = "1\n00:00:01,000 --> 00:00:04,500\nHello, world!\n\n2\n00:00:05,250 --> 00:00:07,000\nSecond line\n";
        let vtt = srt_to_webvtt(srt);

        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:04.500"));
        assert!(vtt.contains("00:00:05.250 --> 00:00:07.000"));
        // Commas in dialogue survive
        assert!(vtt.contains("Hello, world!"));
    }

    #[test]
    fn test_bom_and_crlf() {
        let srt = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n";
        let vtt = srt_to_webvtt(srt);

        assert_eq!(vtt, "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nHi\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(srt_to_webvtt(""), "WEBVTT\n\n");
    }
}
