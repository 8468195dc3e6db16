//! Prompts for the reorder stage.
//!
//! Centralising the prompt here keeps it next to the markers the response
//! parser relies on: [`TITLE_MARKER`] and [`BODY_MARKER`] must match the
//! output format the prompt asks for, and the unit tests below pin that.

/// Marker preceding the generated slide title.
pub const TITLE_MARKER: &str = "제목:";

/// Marker preceding the reordered body text.
pub const BODY_MARKER: &str = "본문:";

/// Instruction prompt for reordering OCR text from one lecture slide.
///
/// `{text}` is replaced with the sanitized slide text.
pub const REORDER_PROMPT_TEMPLATE: &str = r#"
아래는 OCR로 추출한 강의 텍스트입니다. 문장 순서가 섞여 있고, 일부는 보충 설명이나 필기입니다.

{text}

당신의 작업은 다음과 같습니다:

1. 문장을 논리적인 흐름에 맞게 자연스럽게 재정렬하세요.
2. 각 문단은 하나의 개념 또는 주제를 담도록 구성하고, 줄바꿈이나 번호, 리스트 기호(- 등)를 사용해 구분하세요.
3. 불필요한 기호(예: '*')는 제거하고, 문맥에 맞게 문장을 정돈하세요.
4. 한글과 영어가 혼용되어 있다면, 가독성을 위해 **가능한 한 한글로 통일**하고 영어 용어는 괄호로 보완하세요.
5. 문장이 중복되거나 불완전할 경우, 자연스러운 흐름으로 정리해도 됩니다.
6. 재정렬된 텍스트의 내용을 대표할 수 있는 **슬라이드 제목**을 하나 생성하세요.

출력 형식:
제목: [여기에 생성한 제목 입력]
본문: [재정렬된 본문]
"#;

/// Build the reorder prompt for one slide's sanitized text.
pub fn reorder_prompt(sanitized_text: &str) -> String {
    REORDER_PROMPT_TEMPLATE.replace("{text}", sanitized_text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_text_once() {
        let p = reorder_prompt("  운영체제 Process scheduling  ");
        assert_eq!(p.matches("운영체제 Process scheduling").count(), 1);
        assert!(!p.contains("{text}"));
    }

    #[test]
    fn prompt_requests_both_markers() {
        assert!(REORDER_PROMPT_TEMPLATE.contains(TITLE_MARKER));
        assert!(REORDER_PROMPT_TEMPLATE.contains(BODY_MARKER));
        let title_at = REORDER_PROMPT_TEMPLATE.rfind(TITLE_MARKER).unwrap();
        let body_at = REORDER_PROMPT_TEMPLATE.rfind(BODY_MARKER).unwrap();
        assert!(title_at < body_at, "title must be requested before body");
    }
}
