#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
        arg_key: "mode",
    },
    CommandSpec {
        command: "ratio",
        action: "set_aspect_ratio",
        arg_key: "aspect_ratio",
    },
    CommandSpec {
        command: "select",
        action: "select_image",
        arg_key: "image",
    },
    CommandSpec {
        command: "prompt",
        action: "set_prompt",
        arg_key: "prompt",
    },
];

/// `/generate` and `/refine` switch mode without an argument.
pub(crate) const MODE_SHORTCUT_COMMANDS: &[&str] = &["generate", "refine"];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload_image",
        arg_key: "path",
    },
    CommandSpec {
        command: "save",
        action: "save_image",
        arg_key: "path",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "go",
        action: "submit",
        arg_key: "",
    },
    CommandSpec {
        command: "history",
        action: "show_history",
        arg_key: "",
    },
    CommandSpec {
        command: "status",
        action: "show_status",
        arg_key: "",
    },
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg_key: "",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg_key: "",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/generate",
    "/refine",
    "/mode",
    "/ratio",
    "/prompt",
    "/go",
    "/upload",
    "/select",
    "/history",
    "/status",
    "/save",
    "/help",
    "/quit",
];
