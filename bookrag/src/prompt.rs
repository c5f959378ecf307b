//! Fixed answer texts and the grounded-answer prompt.

/// Answer given when retrieval produced nothing usable. The system prompt asks
/// the model to use the same sentence.
pub const NO_INFO_MESSAGE: &str =
    "The knowledge base does not contain enough information to answer this question.";

/// First line of the answer returned when the language model is unavailable.
pub const FALLBACK_HEADER: &str =
    "AI response unavailable. Showing best matched content from the knowledge base:";

/// Answer given when the pipeline fails unexpectedly.
pub const DEGRADED_MESSAGE: &str = "I apologize, but I'm having trouble processing your request \
                                    right now. Please try again in a moment.";

/// Rules given to the language model before the context and question.
pub const SYSTEM_PROMPT: &str = "\
You are an expert AI assistant for a Retrieval-Augmented Generation (RAG) chatbot.

You will receive:
1) A user question
2) Retrieved context from a vector database (Qdrant)

YOUR RULES:
- Answer ONLY using the provided context.
- Do NOT use outside knowledge.
- Do NOT hallucinate or guess.
- If the context fully answers the question, give a clear, concise, well-structured answer.
- If the context partially answers the question, answer only the available part and clearly say what is missing.
- If the context does NOT contain the answer, say:
  \"The knowledge base does not contain enough information to answer this question.\"

FALLBACK BEHAVIOR (IMPORTANT):
- If the AI model cannot generate a response due to rate limits, quota issues, or system errors,
  return the most relevant retrieved context as the final answer.
- When falling back, format the response as:
  \"AI response unavailable. Showing best matched content from the knowledge base:\"
  followed by the retrieved context text.

STYLE:
- Use simple, clear English
- Be factual and technical
- Avoid unnecessary verbosity
- Do not mention internal system details, APIs, or models
";

/// User turn carrying the retrieved context and the question.
pub fn build_user_message(question: &str, context: &str) -> String {
    format!("CONTEXT:\n{context}\n\nQUESTION:\n{question}\n\nFINAL ANSWER:\n")
}

/// Single prompt for providers without a separate system role.
pub fn build_single_prompt(system: &str, user: &str) -> String {
    format!("{system}\n{user}")
}

/// Deterministic answer built from the retrieved context alone.
pub fn fallback_answer(context: &str) -> String {
    format!("{FALLBACK_HEADER}\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_the_no_info_sentence() {
        assert!(SYSTEM_PROMPT.contains(NO_INFO_MESSAGE));
        assert!(SYSTEM_PROMPT.contains(FALLBACK_HEADER));
    }

    #[test]
    fn degraded_message_reads_as_one_sentence_pair() {
        assert_eq!(
            DEGRADED_MESSAGE,
            "I apologize, but I'm having trouble processing your request right now. \
             Please try again in a moment."
        );
    }

    #[test]
    fn user_message_layout() {
        assert_eq!(
            build_user_message("What is a robot?", "1. Robots are machines."),
            "CONTEXT:\n1. Robots are machines.\n\nQUESTION:\nWhat is a robot?\n\nFINAL ANSWER:\n"
        );
    }

    #[test]
    fn single_prompt_separates_rules_from_context_with_blank_line() {
        let prompt = build_single_prompt(SYSTEM_PROMPT, &build_user_message("q", "c"));
        assert!(prompt.contains("or models\n\nCONTEXT:\nc"));
    }

    #[test]
    fn fallback_is_header_then_context() {
        assert_eq!(
            fallback_answer("1. Robots are machines."),
            "AI response unavailable. Showing best matched content from the knowledge base:\n\
             1. Robots are machines."
        );
    }
}
