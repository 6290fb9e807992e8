//! Global constants for the ze editor

pub mod paths {
    /// Per-user config directory under $HOME
    pub const CONFIG_DIR: &str = ".ze";

    /// Shell command history file inside [`CONFIG_DIR`]
    pub const SHELL_HISTORY: &str = "shell_history";

    /// Search history file inside [`CONFIG_DIR`]
    pub const SEARCH_HISTORY: &str = "search_history";

    /// Bash alias file sourced by the shell wrapper when present
    pub const ALIASES: &str = "aliases";

    /// Log file written through the tracing appender
    pub const LOG_FILE: &str = "log";
}

pub mod ui {
    /// Display name for the scratch buffer
    pub const SCRATCH_NAME: &str = "*scratch*";

    /// Display name for the shell output buffer
    pub const SHELL_OUTPUT_NAME: &str = "*shell*";

    /// Minimum usable window width after a split or rescale
    pub const MIN_WINDOW_WIDTH: usize = 10;

    /// Minimum usable window height after a split or rescale
    pub const MIN_WINDOW_HEIGHT: usize = 3;

    /// Rows a page motion keeps as context
    pub const PAGE_OVERLAP: usize = 2;

    /// Lines scrolled per mouse wheel notch
    pub const SCROLL_STEP: usize = 3;
}

pub mod limits {
    /// Maximum undo stack depth; the oldest entry is discarded beyond this
    pub const UNDO_DEPTH: usize = 1000;

    /// Consecutive same-kind edits within this window coalesce into one entry
    pub const UNDO_COALESCE_TIMEOUT_MS: u64 = 1000;

    /// Entries kept in each on-disk history file
    pub const HISTORY_CAP: usize = 100;

    /// Per-stream subprocess output cap; the pipe is closed past this
    pub const SHELL_OUTPUT_CAP: usize = 10 * 1024 * 1024;

    /// Bytes written to subprocess stdin per poll tick
    pub const SHELL_STDIN_CHUNK: usize = 16 * 1024;

    /// Hard timeout for `compgen` completion subprocesses
    pub const COMPLETION_TIMEOUT_MS: u64 = 500;

    /// Backtracking budget per regex match attempt
    pub const REGEX_STEP_BUDGET: usize = 10_000;

    /// Overlap preserved between chunks when searching large buffers
    pub const SEARCH_CHUNK_OVERLAP: usize = 64 * 1024;

    /// Chunk size for chunked buffer search
    pub const SEARCH_CHUNK_SIZE: usize = 1024 * 1024;

    /// Compiled regexes kept in the search service cache
    pub const REGEX_CACHE_CAP: usize = 3;
}

pub mod input {
    /// Quiescence after a lone ESC byte before it resolves as the Escape key
    pub const ESC_TIMEOUT_MS: u64 = 100;

    /// Capacity of the raw key byte ring buffer
    pub const READER_BUF_SIZE: usize = 1024;
}

pub mod buffer {
    /// Pieces per block in the line-index prefix sums
    pub const LINE_INDEX_BLOCK: usize = 64;
}
