//! Prompt templates for the deliberation flow

/// Templates for generating prompts at each stage
///
/// Every builder takes `tools_enabled`; tool guidance is only included when
/// a tool executor is available to the session.
pub struct PromptTemplate;

const TOOLS_NOTICE: &str = "You have access to tools for searching the web for current information \
(prices, news, products and the like) and for reading the current date and time in any timezone. \
Use them whenever you need up-to-date information that may not be in your training data.";

impl PromptTemplate {
    /// System message for a deliberation participant
    pub fn participant_system(tools_enabled: bool) -> String {
        let mut system = String::from(
            "You are a thoughtful AI assistant taking part in a multi-model deliberation. \
Be analytical, consider other perspectives and engage constructively in collaborative reasoning.",
        );
        if tools_enabled {
            system.push_str(" Use your web search and date/time tools when you need current data.");
        }
        system
    }

    /// System message for the synthesizer
    pub fn synthesizer_system(tools_enabled: bool) -> String {
        let mut system = String::from(
            "You are an AI assistant synthesizing a consensus from several AI perspectives. \
Be balanced and comprehensive, and focus on common ground.",
        );
        if tools_enabled {
            system.push_str(" Verify key facts with your web search and date/time tools when needed.");
        }
        system
    }

    /// Round 1: the question on its own
    pub fn initial_prompt(question: &str, tools_enabled: bool) -> String {
        let mut prompt = String::from(
            "You are taking part in a multi-model AI deliberation. Several AI models, \
including you, will analyse the same question and discuss it over several rounds.\n\n",
        );
        if tools_enabled {
            prompt.push_str(TOOLS_NOTICE);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            r#"Provide a thoughtful, well-reasoned analysis of the following question:

{}

Be clear and comprehensive, and explain your reasoning."#,
            question
        ));
        prompt
    }

    /// Round n > 1: the question plus the peers' previous answers.
    ///
    /// `peer_responses` holds `(display name, text)` pairs and must already
    /// exclude the recipient's own answer and empty answers.
    pub fn deliberation_prompt(
        question: &str,
        round_number: usize,
        peer_responses: &[(String, String)],
        tools_enabled: bool,
    ) -> String {
        let mut prompt = format!(
            "You are in Round {} of a multi-model AI deliberation.\n\n",
            round_number
        );
        if tools_enabled {
            prompt.push_str(TOOLS_NOTICE);
            prompt.push_str(" Use them to verify claims made by other models.\n\n");
        }
        prompt.push_str(&format!("ORIGINAL QUESTION:\n{}\n\n", question));

        prompt.push_str("PERSPECTIVES FROM OTHER AI MODELS:\n");
        if peer_responses.is_empty() {
            prompt.push_str("\n(No other model produced a response in the previous round.)\n");
        }
        for (name, content) in peer_responses {
            prompt.push_str(&format!("\n[{}]:\n{}\n", name, content));
        }

        prompt.push_str(
            r#"
YOUR TASK:
1. Consider the perspectives shared by the other models above
2. Identify points of agreement and disagreement
3. Reflect on whether they raised valid points you had not considered
4. Refine your analysis based on the discussion so far
5. Provide your updated perspective

Work towards a well-reasoned consensus while staying intellectually honest. If you disagree with another model, explain why clearly."#,
        );
        prompt
    }

    /// Final synthesis over the last round's `(display name, text)` answers
    pub fn synthesis_prompt(
        question: &str,
        final_responses: &[(String, String)],
        tools_enabled: bool,
    ) -> String {
        let mut prompt =
            String::from("Synthesize a consensus answer from the following multi-model deliberation.\n\n");
        if tools_enabled {
            prompt.push_str(TOOLS_NOTICE);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!("QUESTION:\n{}\n\n", question));
        prompt.push_str("FINAL PERSPECTIVES FROM ALL MODELS:\n");
        for (name, content) in final_responses {
            prompt.push_str(&format!("\n[{}]:\n{}\n", name, content));
        }
        prompt.push_str(
            r#"
YOUR TASK:
Write a comprehensive consensus answer that:
1. Integrates the common themes and agreements across all models
2. Acknowledges any remaining points of disagreement
3. Gives a balanced, well-reasoned response to the original question
4. Highlights the key insights that emerged from the deliberation

Format your response as a clear, cohesive answer."#,
        );
        prompt
    }

    /// Second phase of a tool-augmented turn: the original prompt plus the
    /// results of the requested tool calls as `(tool name, result)` pairs
    pub fn tool_follow_up_prompt(original_prompt: &str, results: &[(String, String)]) -> String {
        let mut prompt = format!("{}\n\nTOOL RESULTS:\n", original_prompt);
        for (name, result) in results {
            prompt.push_str(&format!("\n[{}]:\n{}\n", name, result));
        }
        prompt.push_str(
            "\nUsing the tool results above, give your complete final answer now. \
Do not request any further tool calls.",
        );
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_prompt_contains_question_only() {
        let prompt = PromptTemplate::initial_prompt("What is Rust?", false);
        assert!(prompt.contains("What is Rust?"));
        assert!(!prompt.contains("PERSPECTIVES"));
        assert!(!prompt.contains("tools"));
    }

    #[test]
    fn test_tools_mentioned_only_when_enabled() {
        assert!(PromptTemplate::initial_prompt("q", true).contains("web"));
        assert!(PromptTemplate::participant_system(true).contains("tools"));
        assert!(!PromptTemplate::participant_system(false).contains("tools"));
        assert!(!PromptTemplate::synthesizer_system(false).contains("tools"));
    }

    #[test]
    fn test_deliberation_prompt_lists_peers() {
        let peers = vec![
            ("Claude".to_string(), "Answer A".to_string()),
            ("Gemini".to_string(), "Answer B".to_string()),
        ];
        let prompt = PromptTemplate::deliberation_prompt("Why?", 2, &peers, false);
        assert!(prompt.contains("Round 2"));
        assert!(prompt.contains("[Claude]:\nAnswer A"));
        assert!(prompt.contains("[Gemini]:\nAnswer B"));
    }

    #[test]
    fn test_synthesis_prompt_includes_responses() {
        let responses = vec![("GPT".to_string(), "Final view".to_string())];
        let prompt = PromptTemplate::synthesis_prompt("Why?", &responses, false);
        assert!(prompt.contains("QUESTION:\nWhy?"));
        assert!(prompt.contains("[GPT]:\nFinal view"));
    }

    #[test]
    fn test_tool_follow_up_prompt() {
        let results = vec![("web_search".to_string(), "Quick Answer: 42".to_string())];
        let prompt = PromptTemplate::tool_follow_up_prompt("Original?", &results);
        assert!(prompt.starts_with("Original?"));
        assert!(prompt.contains("[web_search]:\nQuick Answer: 42"));
    }
}
