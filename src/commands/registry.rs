use super::CommandResult;
use crate::core::app::ChatSession;

pub type CommandHandler = fn(&mut ChatSession, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "attach",
        usage: "/attach <path>",
        help: "Attach an image to the next message, replacing any pending one.",
        handler: super::handle_attach,
    },
    Command {
        name: "detach",
        usage: "/detach",
        help: "Remove the pending image.",
        handler: super::handle_detach,
    },
    Command {
        name: "transcript",
        usage: "/transcript",
        help: "Print the conversation so far.",
        handler: super::handle_transcript,
    },
    Command {
        name: "status",
        usage: "/status",
        help: "Show the session id, request state and pending attachment.",
        handler: super::handle_status,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the conversation.",
        handler: super::handle_quit,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lookup_is_case_insensitive() {
        assert_eq!(find_command("ATTACH").map(|c| c.name), Some("attach"));
        assert!(find_command("theme").is_none());
    }

    #[test]
    fn command_names_are_unique() {
        let mut names: Vec<_> = all_commands().iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all_commands().len());
    }
}
