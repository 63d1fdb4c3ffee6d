/// Literal prefix the model is told to use when it declines a request.
pub const REFUSAL_MARKER: &str = "Cannot execute command";

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that turns requests into shell commands. \
     Reply with the command only, without explanation or code fences.";

pub struct CommandPrompt;

impl CommandPrompt {
    /// Fill the instruction template. `machine` is the target label, e.g.
    /// `Windows(Powershell)`.
    pub fn render(machine: &str, user_input: &str) -> String {
        format!(
            "Convert the user's request into a valid {machine} command.\n\
             Note: If the command cannot be executed using WinRM or SSH, respond exactly with:\n\
             {REFUSAL_MARKER}: [brief reason here]\n\n\
             User request: {user_input}\n\n\
             Command:"
        )
    }
}
