use crate::driver::Driver;
use crate::engine::EngineResult;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::trajectory::{ActionOutput, ExtractionOutput};

const EXTRACTION_PROMPT: &str = r#"Below is the current page converted to markdown.

Page content:
{content}

Instruction: {instruction}

Answer the instruction using only the page content above. Reply with the
extracted answer, nothing else."#;

/// Instruction-driven page-content extraction.
///
/// The page is converted to markdown before prompting so the model reads
/// text, not markup; the result is recorded as a [`ExtractionOutput`].
pub struct ExtractionEngine<'a> {
    driver: &'a dyn Driver,
    model: &'a dyn LanguageModel,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(driver: &'a dyn Driver, model: &'a dyn LanguageModel) -> Self {
        Self { driver, model }
    }

    /// Markdown rendering of the current page
    pub fn page_markdown(&self) -> Result<String> {
        let html = self.driver.get_html()?;
        Ok(html2md::parse_html(&html))
    }

    pub fn execute_instruction(&self, instruction: &str) -> Result<EngineResult> {
        let content = self.page_markdown()?;
        let prompt = EXTRACTION_PROMPT
            .replace("{content}", &content)
            .replace("{instruction}", instruction);
        let answer = match self.model.complete(&prompt) {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("extraction failed: {e}");
                return Ok(EngineResult::failure());
            }
        };
        let output = ExtractionOutput {
            name: instruction.to_string(),
            text: answer.trim().to_string(),
        };
        Ok(EngineResult::success(vec![ActionOutput::WebExtraction(
            output,
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomSnapshot, ElementNode};
    use crate::driver::MockDriver;
    use crate::llm::StaticModel;
    use crate::trajectory::ActionOutput;

    fn article_page() -> DomSnapshot {
        let body = ElementNode::new("body").with_children(vec![
            ElementNode::new("h1").with_text("Release notes"),
            ElementNode::new("p").with_text("Version 2.1 ships faster retrieval."),
        ]);
        DomSnapshot::new(ElementNode::new("html").with_children(vec![body]))
    }

    #[test]
    fn test_extraction_prompts_with_markdown() {
        let driver = MockDriver::new(article_page());
        let model = StaticModel::new(vec!["Version 2.1"]);
        let engine = ExtractionEngine::new(&driver, &model);
        let result = engine
            .execute_instruction("What version is announced?")
            .unwrap();
        assert!(result.success);
        match &result.outputs[0] {
            ActionOutput::WebExtraction(out) => {
                assert_eq!(out.text, "Version 2.1");
                assert_eq!(out.name, "What version is announced?");
            }
            other => panic!("unexpected output: {other:?}"),
        }
        // The prompt carried page text, not raw markup
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Release notes"));
        assert!(!prompt.contains("<h1>"));
    }

    #[test]
    fn test_extraction_model_failure_is_soft() {
        let driver = MockDriver::new(article_page());
        let model = StaticModel::new(vec![]);
        let engine = ExtractionEngine::new(&driver, &model);
        let result = engine.execute_instruction("Anything").unwrap();
        assert!(!result.success);
    }
}
