//! Parser for the model's ReAct-formatted responses.
//!
//! The model is prompted to reply with labeled lines:
//!
//! ```text
//! 思考：需要先把地址转成坐标
//! 行动：address_to_location
//! 行动输入：{"address": "北京市朝阳区望京SOHO"}
//! ```
//!
//! Compliance with the format is unreliable: colons come in ASCII and
//! full-width variants, argument objects arrive fenced in Markdown or with
//! unquoted keys, single quotes and trailing commas, and sometimes the
//! "object" is just a bare string. The parser therefore never fails;
//! whatever the text looks like, it degrades to a tagged result the loop
//! can always act on.

use regex::Regex;
use serde_json::{Map, Value};

/// Outcome of parsing one assistant response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAction {
    /// No action marker was found in the text. Any input block present
    /// is still decoded and carried.
    NoAction { args: Map<String, Value> },
    /// An action name with a decoded argument mapping.
    ToolCall { name: String, args: Map<String, Value> },
    /// An action whose input block could not be decoded as an object.
    /// `raw` keeps the captured text so the single-field fallback can be
    /// applied when the arguments are requested.
    Malformed { name: String, raw: String },
}

impl ParsedAction {
    /// The parsed action name; empty when no action marker was found.
    pub fn action_name(&self) -> &str {
        match self {
            ParsedAction::NoAction { .. } => "",
            ParsedAction::ToolCall { name, .. } => name,
            ParsedAction::Malformed { name, .. } => name,
        }
    }

    /// The argument mapping for dispatch. Always a mapping: the carried
    /// mapping for [`ParsedAction::NoAction`] and
    /// [`ParsedAction::ToolCall`], and the `search_query` fallback for
    /// [`ParsedAction::Malformed`].
    pub fn arguments(&self) -> Map<String, Value> {
        match self {
            ParsedAction::NoAction { args } => args.clone(),
            ParsedAction::ToolCall { args, .. } => args.clone(),
            ParsedAction::Malformed { raw, .. } => search_query_fallback(raw),
        }
    }
}

/// Wrap undecodable action input as the conventional single-parameter
/// mapping. Surrounding quote characters are stripped so `"北京"` and
/// `北京` dispatch identically.
pub fn search_query_fallback(raw: &str) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert(
        "search_query".to_string(),
        Value::String(raw.trim_matches(|c| c == '"' || c == '\'').to_string()),
    );
    args
}

/// Extracts `行动` / `行动输入` blocks from free-form model output.
pub struct ReactParser {
    action_re: Regex,
    input_re: Regex,
}

impl ReactParser {
    pub fn new() -> Self {
        // Both markers accept ASCII and full-width colons and may appear
        // mid-line; the prompt asks for its own format in Chinese and the
        // model's punctuation is not dependable. Known-good literals.
        Self {
            action_re: Regex::new(r"(?i)行动[:：]\s*(\w+)").unwrap(),
            input_re: Regex::new(r"行动输入[:：]").unwrap(),
        }
    }

    /// Parse one response block. Never fails: ambiguity degrades the
    /// result instead of erroring, and `verbose` only adds diagnostics.
    ///
    /// The two markers are extracted independently; an absent action
    /// name does not suppress input capture.
    pub fn parse(&self, text: &str, verbose: bool) -> ParsedAction {
        let name = self
            .action_re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let captured = self
            .capture_action_input(text)
            .map(|block| block.trim().to_string())
            .unwrap_or_default();
        if captured.is_empty() {
            return if name.is_empty() {
                ParsedAction::NoAction { args: Map::new() }
            } else {
                ParsedAction::ToolCall {
                    name,
                    args: Map::new(),
                }
            };
        }

        let cleaned = strip_code_fences(&captured);
        let decoded = if cleaned.starts_with('{') && cleaned.ends_with('}') {
            let normalized = normalize_object_literal(&cleaned);
            match serde_json::from_str::<Map<String, Value>>(&normalized) {
                Ok(args) => Ok(args),
                Err(e) => {
                    if verbose {
                        tracing::debug!("Failed to decode action input: {}", e);
                    }
                    Err(captured)
                }
            }
        } else {
            Err(cleaned)
        };

        match decoded {
            Ok(args) if name.is_empty() => ParsedAction::NoAction { args },
            Ok(args) => ParsedAction::ToolCall { name, args },
            Err(raw) if name.is_empty() => ParsedAction::NoAction {
                args: search_query_fallback(&raw),
            },
            Err(raw) => ParsedAction::Malformed { name, raw },
        }
    }

    /// Capture the block following the `行动输入` marker: a fenced code
    /// block, a brace-balanced object, or the rest of the line.
    fn capture_action_input(&self, text: &str) -> Option<String> {
        let marker = self.input_re.find(text)?;
        let rest = text[marker.end()..].trim_start();

        let block = if rest.starts_with("```") {
            capture_fenced_block(rest)
        } else if rest.starts_with('{') {
            capture_braced_block(rest)
        } else {
            rest.lines().next().unwrap_or("").to_string()
        };
        Some(block)
    }
}

impl Default for ReactParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Take a fenced block including its fences; `strip_code_fences` removes
/// them during decoding. An unterminated fence runs to end of text.
fn capture_fenced_block(rest: &str) -> String {
    match rest[3..].find("```") {
        Some(end) => rest[..end + 6].to_string(),
        None => rest.to_string(),
    }
}

/// Take a `{...}` block, balancing nested braces and ignoring brace
/// characters inside quoted strings. An unbalanced block runs to end of
/// text and fails decoding downstream.
fn capture_braced_block(rest: &str) -> String {
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escape = false;

    for (idx, c) in rest.char_indices() {
        if let Some(quote) = in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return rest[..=idx].to_string();
                }
            }
            _ => {}
        }
    }
    rest.to_string()
}

/// Strip surrounding Markdown code fences, with an optional language tag
/// on the opening fence.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut inner = &trimmed[3..];
    let tag_len = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    inner = &inner[tag_len..];
    let inner = inner.trim_end();
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim().to_string()
}

/// Normalize a relaxed object literal into strict JSON.
///
/// Tolerates the dialects the model actually produces: `//` and `/* */`
/// comments, single-quoted strings, unquoted identifier keys and trailing
/// commas. Anything stranger still fails `serde_json` and takes the
/// fallback path.
fn normalize_object_literal(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                let mut escape = false;
                for n in chars.by_ref() {
                    out.push(n);
                    if escape {
                        escape = false;
                    } else if n == '\\' {
                        escape = true;
                    } else if n == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                let mut escape = false;
                while let Some(n) = chars.next() {
                    if escape {
                        escape = false;
                        if n == '\'' {
                            out.push('\'');
                        } else {
                            out.push('\\');
                            out.push(n);
                        }
                    } else if n == '\\' {
                        escape = true;
                    } else if n == '\'' {
                        break;
                    } else if n == '"' {
                        out.push_str("\\\"");
                    } else {
                        out.push(n);
                    }
                }
                out.push('"');
            }
            '/' => match chars.peek() {
                Some('/') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if n == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for n in chars.by_ref() {
                        if prev == '*' && n == '/' {
                            break;
                        }
                        prev = n;
                    }
                }
                _ => out.push('/'),
            },
            ',' => {
                let mut look = chars.clone();
                while let Some(&n) = look.peek() {
                    if n.is_whitespace() {
                        look.next();
                    } else {
                        break;
                    }
                }
                // drop a trailing comma right before a closing bracket
                let next = look.peek().copied();
                if next != Some('}') && next != Some(']') {
                    out.push(',');
                }
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '$' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let mut look = chars.clone();
                while let Some(&n) = look.peek() {
                    if n.is_whitespace() {
                        look.next();
                    } else {
                        break;
                    }
                }
                // quote bare identifiers in key position; bare values
                // (true/false/null, numbers) pass through untouched
                if look.peek().copied() == Some(':') {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> ParsedAction {
        ReactParser::new().parse(text, false)
    }

    #[test]
    fn extracts_action_and_json_input() {
        let parsed = parse("思考：需要搜索。\n行动：search_nearby_poi\n行动输入：{\"location\": \"116.4,39.9\"}");
        assert_eq!(parsed.action_name(), "search_nearby_poi");
        assert_eq!(
            parsed.arguments().get("location"),
            Some(&json!("116.4,39.9"))
        );
    }

    #[test]
    fn accepts_ascii_colons() {
        let parsed = parse("行动: search_nearby_poi\n行动输入: {\"location\": \"116.4,39.9\"}");
        assert_eq!(parsed.action_name(), "search_nearby_poi");
        assert_eq!(
            parsed.arguments().get("location"),
            Some(&json!("116.4,39.9"))
        );
    }

    #[test]
    fn bare_text_input_becomes_search_query() {
        let parsed = parse("行动：address_to_location\n行动输入：北京天安门");
        assert_eq!(parsed.action_name(), "address_to_location");
        assert_eq!(
            parsed.arguments().get("search_query"),
            Some(&json!("北京天安门"))
        );
    }

    #[test]
    fn surrounding_quotes_are_stripped_from_the_fallback() {
        let parsed = parse("行动：address_to_location\n行动输入：\"北京天安门\"");
        assert_eq!(
            parsed.arguments().get("search_query"),
            Some(&json!("北京天安门"))
        );
    }

    #[test]
    fn missing_action_marker_yields_no_action() {
        let parsed = parse("我觉得东城区很适合一日游。");
        assert_eq!(parsed, ParsedAction::NoAction { args: Map::new() });
        assert_eq!(parsed.action_name(), "");
        assert!(parsed.arguments().is_empty());
    }

    #[test]
    fn input_without_an_action_marker_still_yields_the_fallback_mapping() {
        let parsed = parse("行动输入：北京天安门");
        assert_eq!(parsed.action_name(), "");
        assert_eq!(
            parsed.arguments().get("search_query"),
            Some(&json!("北京天安门"))
        );
    }

    #[test]
    fn object_input_without_an_action_marker_keeps_its_mapping() {
        let parsed = parse("行动输入：{\"keywords\": \"博物馆\"}");
        assert_eq!(parsed.action_name(), "");
        assert_eq!(parsed.arguments().get("keywords"), Some(&json!("博物馆")));
    }

    #[test]
    fn empty_object_input_yields_empty_args() {
        let parsed = parse("行动：get_city\n行动输入：{}");
        assert_eq!(parsed.action_name(), "get_city");
        assert!(parsed.arguments().is_empty());
    }

    #[test]
    fn action_without_input_block_yields_empty_args() {
        let parsed = parse("行动：get_city");
        assert_eq!(parsed.action_name(), "get_city");
        assert!(parsed.arguments().is_empty());
    }

    #[test]
    fn fenced_input_block_is_unwrapped() {
        let text = "行动：search_nearby_poi\n行动输入：```json\n{\"location\": \"116.4,39.9\", \"keywords\": \"火锅\"}\n```";
        let parsed = parse(text);
        assert_eq!(parsed.arguments().get("keywords"), Some(&json!("火锅")));
    }

    #[test]
    fn relaxed_object_literal_is_normalized() {
        let parsed = parse("行动：search_nearby_poi\n行动输入：{location: '116.4,39.9', radius: 1000,}");
        let args = parsed.arguments();
        assert_eq!(args.get("location"), Some(&json!("116.4,39.9")));
        assert_eq!(args.get("radius"), Some(&json!(1000)));
    }

    #[test]
    fn nested_braces_are_captured_balanced() {
        let text = "行动：search_nearby_poi\n行动输入：{\"location\": \"116.4,39.9\", \"filters\": {\"open_now\": true}}\n观察：……";
        let parsed = parse(text);
        assert_eq!(
            parsed.arguments().get("filters"),
            Some(&json!({"open_now": true}))
        );
    }

    #[test]
    fn braces_inside_string_values_do_not_end_the_capture() {
        let text = "行动：address_to_location\n行动输入：{\"address\": \"望京{东}区\"}";
        let parsed = parse(text);
        assert_eq!(parsed.arguments().get("address"), Some(&json!("望京{东}区")));
    }

    #[test]
    fn markers_are_matched_mid_line() {
        let parsed = parse("接下来我会执行 行动：get_city 来定位。");
        assert_eq!(parsed.action_name(), "get_city");
    }

    #[test]
    fn undecodable_braces_fall_back_to_the_raw_capture() {
        let parsed = parse("行动：search_nearby_poi\n行动输入：{\"location\": }");
        match &parsed {
            ParsedAction::Malformed { name, raw } => {
                assert_eq!(name, "search_nearby_poi");
                assert_eq!(raw, "{\"location\": }");
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
        assert_eq!(
            parsed.arguments().get("search_query"),
            Some(&json!("{\"location\": }"))
        );
    }

    #[test]
    fn final_answer_token_parses_as_an_action_name() {
        let parsed = parse("行动：最终答案\n最终答案：天安门广场。");
        assert_eq!(parsed.action_name(), "最终答案");
    }

    #[test]
    fn input_on_the_following_line_is_still_captured() {
        let parsed = parse("行动：get_sub_districts\n行动输入：\n{\"keywords\": \"成都市\"}");
        assert_eq!(parsed.arguments().get("keywords"), Some(&json!("成都市")));
    }

    #[test]
    fn adversarial_input_never_panics() {
        let parser = ReactParser::new();
        for text in [
            "",
            "行动：",
            "行动输入：",
            "行动：a\n行动输入：{",
            "行动：a\n行动输入：```",
            "行动：a\n行动输入：{\"x\": \"unterminated",
            "行动 without colon",
        ] {
            let parsed = parser.parse(text, true);
            // the pair contract: a name and a mapping, always
            let _ = parsed.action_name();
            let _ = parsed.arguments();
        }
    }

    #[test]
    fn fallback_helper_strips_quote_characters() {
        let args = search_query_fallback("'成都春熙路'");
        assert_eq!(args.get("search_query"), Some(&json!("成都春熙路")));
    }

    #[test]
    fn normalization_strips_comments() {
        let normalized =
            normalize_object_literal("{\"radius\": 1000, // 步行范围\n\"types\": \"050000\"}");
        let parsed: Map<String, Value> = serde_json::from_str(&normalized).unwrap();
        assert_eq!(parsed.get("radius"), Some(&json!(1000)));
        assert_eq!(parsed.get("types"), Some(&json!("050000")));
    }

    #[test]
    fn normalization_requotes_single_quoted_strings() {
        let normalized = normalize_object_literal("{'keywords': '川菜'}");
        assert_eq!(normalized, "{\"keywords\": \"川菜\"}");
    }

    #[test]
    fn normalization_drops_trailing_commas_in_arrays() {
        let normalized = normalize_object_literal("{\"locations\": [\"116.4,39.9\",]}");
        let parsed: Map<String, Value> = serde_json::from_str(&normalized).unwrap();
        assert_eq!(parsed.get("locations"), Some(&json!(["116.4,39.9"])));
    }
}
