//! Code extraction from model responses

use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
});

static OPEN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*)$").expect("open fence pattern is valid"));

/// Extract test source from a completion
///
/// Takes the first fenced code block. An unterminated fence yields everything
/// after it. Without any fence the trimmed response is used. Returns `None`
/// when nothing but whitespace remains.
#[must_use]
pub fn extract_code_block(response: &str) -> Option<String> {
    let body = FENCED_BLOCK
        .captures(response)
        .or_else(|| OPEN_FENCE.captures(response))
        .and_then(|c| c.get(1))
        .map_or(response, |m| m.as_str());

    let trimmed = body.trim_matches(|c: char| c == '\n' || c == '\r');
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(format!("{}\n", trimmed.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn takes_first_fenced_block() {
        let response = "Here you go:\n```cpp\n#include <gtest/gtest.h>\nTEST(A, B) {}\n```\nand\n```\nother\n```";
        assert_eq!(
            extract_code_block(response).unwrap(),
            "#include <gtest/gtest.h>\nTEST(A, B) {}\n"
        );
    }

    #[test]
    fn accepts_language_tags_with_symbols() {
        let response = "```c++\nint x;\n```";
        assert_eq!(extract_code_block(response).unwrap(), "int x;\n");
    }

    #[test]
    fn unterminated_fence_takes_rest() {
        let response = "```cpp\nTEST(A, B) {\n  EXPECT_TRUE(true);\n}\n";
        assert_eq!(
            extract_code_block(response).unwrap(),
            "TEST(A, B) {\n  EXPECT_TRUE(true);\n}\n"
        );
    }

    #[test]
    fn bare_response_is_trimmed() {
        assert_eq!(extract_code_block("\n\nTEST(A, B) {}\n\n").unwrap(), "TEST(A, B) {}\n");
    }

    #[test]
    fn empty_responses_yield_nothing() {
        assert_eq!(extract_code_block("   \n"), None);
        assert_eq!(extract_code_block("```cpp\n\n```"), None);
    }
}
