//! The C6 deterministic transcript cleaner: a pure pipeline over a `String`.
//!
//! Stage order is fixed (§4.6): word replacements, then filler removal, then formatting
//! commands, then self-correction, then sentence cleanup, then outer dequote. Each stage is
//! skippable via its own `CleanerOptions` flag except sentence cleanup and dequote, which
//! always run last.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::{CleanerOptions, WordReplacements};

/// The filler-word set from §4.6 stage 2.
///
/// `actually` is deliberately excluded here: the spec calls out that its appearance in the
/// self-correction pattern (`<A>. Actually, <B>`) is a separate syntactic rule, not this
/// generic filler. Stripping it here would remove the trigger word before stage 4 ever runs.
const FILLER_WORDS: &[&str] = &[
    "um", "uh", "ah", "er", "like", "you know", "sort of", "kind of", "basically", "literally",
    "so", "well", "right", "okay", "alright", "hmm", "yeah", "yes", "yep", "mhm",
];

fn filler_words_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = FILLER_WORDS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b[,.]?\s*")).expect("valid filler regex")
    })
}

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(new line|newline|bullet point|bullet|dash|new paragraph|paragraph|tab)\b")
            .expect("valid line break regex")
    })
}

fn apply_line_break_commands(text: &str) -> String {
    line_break_re()
        .replace_all(text, |caps: &Captures| match caps[1].to_lowercase().as_str() {
            "new line" | "newline" => "\n".to_string(),
            "bullet point" | "bullet" | "dash" => "\n\u{2022}".to_string(),
            "new paragraph" | "paragraph" => "\n\n".to_string(),
            "tab" => "\t".to_string(),
            other => other.to_string(),
        })
        .to_string()
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(period|comma|question mark|exclamation point|colon|semicolon)\b")
            .expect("valid punctuation regex")
    })
}

fn apply_punctuation_commands(text: &str) -> String {
    punctuation_re()
        .replace_all(text, |caps: &Captures| match caps[1].to_lowercase().as_str() {
            "period" => ".",
            "comma" => ",",
            "question mark" => "?",
            "exclamation point" => "!",
            "colon" => ":",
            "semicolon" => ";",
            _ => "",
        })
        .to_string()
}

fn quote_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\bquote\b\s*(.*?)\s*\bend quote\b").expect("valid quote command regex")
    })
}

fn cap_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bcap\b\s+(\S+)").expect("valid cap word regex"))
}

fn all_caps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\ball caps\b\s*(.*?)\s*\bend caps\b").expect("valid all caps regex")
    })
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn apply_formatting_commands(text: &str) -> String {
    let mut out = quote_command_re().replace_all(text, "$1").to_string();
    out = all_caps_re()
        .replace_all(&out, |caps: &Captures| caps[1].to_uppercase())
        .to_string();
    out = cap_word_re()
        .replace_all(&out, |caps: &Captures| capitalize_first(&caps[1]))
        .to_string();
    out
}

fn self_correction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Non-greedy from the very start: strips the earliest "<A>. Actually, " prefix so
        // repeated application (left-to-right) peels off each self-correction in turn.
        Regex::new(r"(?is)\A.*?\.\s*actually,\s*").expect("valid self-correction regex")
    })
}

/// §4.6 stage 4: "`<A>. Actually, <B>`" collapses to "`<B>`", applied until no match remains.
fn apply_self_correction(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let Some(replaced) = self_correction_re().find(&current) else {
            break;
        };
        if replaced.start() == replaced.end() {
            break;
        }
        current = self_correction_re().replace(&current, "").to_string();
    }
    current
}

fn horizontal_whitespace_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace run regex"))
}

fn whitespace_before_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+([,.!?;:])").expect("valid pre-punct regex"))
}

fn missing_space_after_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([,.!?;:])([^\s,.!?;:])").expect("valid post-punct regex")
    })
}

fn sentence_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(^|[.!?]\s+)([a-z])").expect("valid sentence start regex")
    })
}

/// §4.6 stage 5: collapse whitespace, fix punctuation spacing, strip a trailing comma, and
/// (optionally) capitalize sentence starts. Always runs last among the transformation stages.
fn sentence_cleanup(text: &str, automatic_capitalization: bool) -> String {
    let mut out = horizontal_whitespace_run_re()
        .replace_all(text.trim(), " ")
        .to_string();
    out = whitespace_before_punct_re().replace_all(&out, "$1").to_string();
    out = missing_space_after_punct_re()
        .replace_all(&out, "$1 $2")
        .to_string();
    out = out.trim().to_string();
    if out.ends_with(',') {
        out.pop();
    }

    if automatic_capitalization {
        out = sentence_start_re()
            .replace_all(&out, |caps: &Captures| {
                format!("{}{}", &caps[1], caps[2].to_uppercase())
            })
            .to_string();
    }

    out
}

/// §4.6 stage 6: strip exactly one pair of matching outer quotes, if present.
fn dequote_outer(text: &str) -> String {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// §4.6 stage 1: word-boundary, case-insensitive substitution from a user dictionary.
pub fn apply_word_replacements(text: &str, replacements: &WordReplacements) -> String {
    let mut out = text.to_string();
    for (search, replacement) in &replacements.0 {
        if search.is_empty() {
            continue;
        }
        let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(search))) else {
            continue;
        };
        out = re.replace_all(&out, replacement.as_str()).to_string();
    }
    out
}

fn remove_filler_words(text: &str) -> String {
    filler_words_re().replace_all(text, "").to_string()
}

/// The full C6 deterministic pipeline (§4.6). Idempotent on its second application (§8
/// invariant 4): running `clean` on its own output is a no-op past the first pass.
pub fn clean(text: &str, options: &CleanerOptions, replacements: &WordReplacements) -> String {
    let mut out = text.to_string();

    if options.apply_word_replacements {
        out = apply_word_replacements(&out, replacements);
    }
    if options.remove_fillers {
        out = remove_filler_words(&out);
    }
    if options.process_line_break_commands {
        out = apply_line_break_commands(&out);
    }
    if options.process_punctuation_commands {
        out = apply_punctuation_commands(&out);
    }
    if options.process_formatting_commands {
        out = apply_formatting_commands(&out);
    }
    if options.apply_self_correction {
        out = apply_self_correction(&out);
    }

    out = sentence_cleanup(&out, options.automatic_capitalization);
    out = dequote_outer(&out);
    out
}

/// §4.6 LLM enhancement system prompt: enumerates the same rules as the deterministic pipeline.
pub fn enhancement_system_prompt() -> &'static str {
    "You clean up raw speech-to-text transcripts. Remove filler words and verbal tics, fix \
     grammar and punctuation, and preserve the speaker's meaning. Respect any explicit \
     formatting commands the speaker dictated (line breaks, bullet points, punctuation names, \
     quoting, capitalization). Honor self-corrections: when the speaker says something then \
     corrects themselves with \"actually\", keep only the corrected version. Reply with the \
     cleaned transcript only, no commentary, no surrounding quotes."
}

/// Strip surrounding quotes the model sometimes adds around its answer.
pub fn strip_enhancement_quotes(text: &str) -> String {
    dequote_outer(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn all_on() -> CleanerOptions {
        CleanerOptions::default()
    }

    #[test]
    fn s3_filler_command_and_self_correction() {
        let input = "Um, hello there period Actually, uh, good morning period How are you doing question mark";
        let out = clean(input, &all_on(), &WordReplacements::default());
        assert_eq!(out, "Good morning. How are you doing?");
    }

    #[test]
    fn s7_word_replacement_preserves_surrounding_words() {
        let mut map = HashMap::new();
        map.insert("near chat".to_string(), "Ner chat".to_string());
        let replacements = WordReplacements(map);
        let out = clean(
            "I joined Near Chat today",
            &CleanerOptions {
                remove_fillers: false,
                process_line_break_commands: false,
                process_punctuation_commands: false,
                process_formatting_commands: false,
                apply_self_correction: false,
                automatic_capitalization: false,
                apply_word_replacements: true,
                use_intelligent_word_replacements: false,
            },
            &replacements,
        );
        assert!(out.contains("Ner chat"));
        assert!(out.starts_with("I joined"));
        assert!(out.ends_with("today"));
    }

    #[test]
    fn clean_is_idempotent() {
        let input = "Um, so like, hello   there,  period how are you";
        let opts = all_on();
        let once = clean(input, &opts, &WordReplacements::default());
        let twice = clean(&once, &opts, &WordReplacements::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn line_break_and_bullet_commands() {
        let out = apply_line_break_commands("one new line two bullet point three");
        assert_eq!(out, "one \n two \n\u{2022} three");
    }

    #[test]
    fn dequote_outer_strips_one_pair_only() {
        assert_eq!(dequote_outer("\"\"nested\"\""), "\"nested\"");
        assert_eq!(dequote_outer("'single quoted'"), "single quoted");
        assert_eq!(dequote_outer("no quotes here"), "no quotes here");
    }

    #[test]
    fn quote_command_extracts_inner_text() {
        let out = apply_formatting_commands("she said quote hello world end quote to me");
        assert_eq!(out, "she said hello world to me");
    }

    #[test]
    fn cap_and_all_caps_commands() {
        let out = apply_formatting_commands("cap hello world all caps shout it end caps now");
        assert_eq!(out, "Hello world SHOUT IT now");
    }

    #[test]
    fn word_replacements_preserve_text_outside_boundaries() {
        let mut map = HashMap::new();
        map.insert("cat".to_string(), "dog".to_string());
        let replacements = WordReplacements(map);
        let out = apply_word_replacements("concatenate the cat", &replacements);
        assert_eq!(out, "concatenate the dog");
    }
}
